use crate::errors::{Result, SpiceError};
use git2::{BranchType, Oid, Repository};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Request to create or force-move a branch reference.
#[derive(Debug, Clone)]
pub struct CreateBranchRequest {
    /// Branch name to create.
    pub name: String,
    /// Commitish the branch should point at.
    pub head: String,
    /// Overwrite the branch if it already exists.
    pub force: bool,
}

/// Read-side view of the repository backed by libgit2.
///
/// Reference and history queries go through here; operations that mutate the
/// working tree live on [`crate::git::Worktree`].
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open the Git repository containing the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| SpiceError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| SpiceError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a reference (branch name, "HEAD", hash, ...) to a commit hash.
    pub fn peel_to_commit(&self, reference: &str) -> Result<String> {
        let obj = self
            .repo
            .revparse_single(reference)
            .map_err(|e| SpiceError::branch(format!("Could not resolve '{reference}': {e}")))?;

        let commit = obj.peel_to_commit().map_err(|e| {
            SpiceError::branch(format!("'{reference}' does not point at a commit: {e}"))
        })?;

        Ok(commit.id().to_string())
    }

    /// Check whether `ancestor` is an ancestor of `descendant`.
    /// A commit is considered its own ancestor.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let ancestor_oid = Oid::from_str(ancestor).map_err(SpiceError::Git)?;
        let descendant_oid = Oid::from_str(descendant).map_err(SpiceError::Git)?;

        if ancestor_oid == descendant_oid {
            return Ok(true);
        }

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(SpiceError::Git)
    }

    /// Merge base of two commitish references.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let a_oid = Oid::from_str(&self.peel_to_commit(a)?).map_err(SpiceError::Git)?;
        let b_oid = Oid::from_str(&self.peel_to_commit(b)?).map_err(SpiceError::Git)?;

        let base = self.repo.merge_base(a_oid, b_oid).map_err(SpiceError::Git)?;
        Ok(base.to_string())
    }

    /// Best-effort fork point of `branch` relative to `base`.
    ///
    /// Shells out because libgit2 has no equivalent of
    /// `git merge-base --fork-point`, which consults the reflog.
    pub fn fork_point(&self, base: &str, branch: &str) -> Result<String> {
        let output = Command::new("git")
            .args(["merge-base", "--fork-point", base, branch])
            .current_dir(&self.path)
            .output()
            .map_err(SpiceError::Io)?;

        if !output.status.success() {
            return Err(SpiceError::branch(format!(
                "No fork point found for '{branch}' relative to '{base}'"
            )));
        }

        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Err(SpiceError::branch(format!(
                "No fork point found for '{branch}' relative to '{base}'"
            )));
        }

        Ok(hash)
    }

    /// First line of a commit's message.
    pub fn commit_subject(&self, hash: &str) -> Result<String> {
        let oid = Oid::from_str(hash).map_err(SpiceError::Git)?;
        let commit = self.repo.find_commit(oid).map_err(SpiceError::Git)?;
        Ok(commit.summary().unwrap_or_default().to_string())
    }

    /// Check whether a local branch exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// List all local branch names.
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let branches = self
            .repo
            .branches(Some(BranchType::Local))
            .map_err(SpiceError::Git)?;

        for branch in branches {
            let (branch, _) = branch.map_err(SpiceError::Git)?;
            if let Some(name) = branch.name().map_err(SpiceError::Git)? {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Create a branch, or force-move it when `force` is set.
    pub fn create_branch(&self, req: CreateBranchRequest) -> Result<()> {
        let oid = Oid::from_str(&self.peel_to_commit(&req.head)?).map_err(SpiceError::Git)?;
        let commit = self.repo.find_commit(oid).map_err(SpiceError::Git)?;

        self.repo
            .branch(&req.name, &commit, req.force)
            .map_err(|e| {
                SpiceError::branch(format!("Could not create branch '{}': {e}", req.name))
            })?;

        debug!("Moved branch '{}' to {}", req.name, req.head);
        Ok(())
    }

    /// Delete a local branch reference.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        let mut branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|e| SpiceError::branch(format!("Could not find branch '{name}': {e}")))?;

        branch
            .delete()
            .map_err(|e| SpiceError::branch(format!("Could not delete branch '{name}': {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(repo_path: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(repo_path)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed");
    }

    fn create_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        git(&repo_path, &["init", "-b", "main"]);
        git(&repo_path, &["config", "user.name", "Test"]);
        git(&repo_path, &["config", "user.email", "test@test.com"]);

        std::fs::write(repo_path.join("README.md"), "# Test").unwrap();
        git(&repo_path, &["add", "."]);
        git(&repo_path, &["commit", "-m", "Initial commit"]);

        (temp_dir, repo_path)
    }

    fn create_commit(repo_path: &Path, message: &str, filename: &str) {
        std::fs::write(
            repo_path.join(filename),
            format!("Content for {filename}\n"),
        )
        .unwrap();
        git(repo_path, &["add", filename]);
        git(repo_path, &["commit", "-m", message]);
    }

    #[test]
    fn test_peel_to_commit() {
        let (_tmp, repo_path) = create_test_repo();
        let repo = GitRepository::open(&repo_path).unwrap();

        let head = repo.peel_to_commit("HEAD").unwrap();
        let main = repo.peel_to_commit("main").unwrap();
        assert_eq!(head, main);
        assert_eq!(head.len(), 40);

        assert!(repo.peel_to_commit("no-such-branch").is_err());
    }

    #[test]
    fn test_is_ancestor() {
        let (_tmp, repo_path) = create_test_repo();
        let repo = GitRepository::open(&repo_path).unwrap();

        let first = repo.peel_to_commit("HEAD").unwrap();
        create_commit(&repo_path, "Second commit", "second.txt");
        let second = repo.peel_to_commit("HEAD").unwrap();

        assert!(repo.is_ancestor(&first, &second).unwrap());
        assert!(!repo.is_ancestor(&second, &first).unwrap());
        // A commit is its own ancestor.
        assert!(repo.is_ancestor(&first, &first).unwrap());
    }

    #[test]
    fn test_commit_subject() {
        let (_tmp, repo_path) = create_test_repo();
        let repo = GitRepository::open(&repo_path).unwrap();

        create_commit(&repo_path, "Add the second file", "second.txt");
        let head = repo.peel_to_commit("HEAD").unwrap();

        assert_eq!(repo.commit_subject(&head).unwrap(), "Add the second file");
    }

    #[test]
    fn test_create_branch_force_moves() {
        let (_tmp, repo_path) = create_test_repo();
        let repo = GitRepository::open(&repo_path).unwrap();

        let first = repo.peel_to_commit("HEAD").unwrap();
        repo.create_branch(CreateBranchRequest {
            name: "feature".to_string(),
            head: first.clone(),
            force: false,
        })
        .unwrap();
        assert!(repo.branch_exists("feature"));

        create_commit(&repo_path, "Second commit", "second.txt");
        let second = repo.peel_to_commit("HEAD").unwrap();

        // Non-force create of an existing branch fails.
        assert!(repo
            .create_branch(CreateBranchRequest {
                name: "feature".to_string(),
                head: second.clone(),
                force: false,
            })
            .is_err());

        repo.create_branch(CreateBranchRequest {
            name: "feature".to_string(),
            head: second.clone(),
            force: true,
        })
        .unwrap();
        assert_eq!(repo.peel_to_commit("feature").unwrap(), second);
    }

    #[test]
    fn test_list_branches_sorted() {
        let (_tmp, repo_path) = create_test_repo();
        let repo = GitRepository::open(&repo_path).unwrap();

        git(&repo_path, &["branch", "zeta"]);
        git(&repo_path, &["branch", "alpha"]);

        let branches = repo.list_branches().unwrap();
        assert_eq!(branches, vec!["alpha", "main", "zeta"]);
    }

    #[test]
    fn test_merge_base() {
        let (_tmp, repo_path) = create_test_repo();
        let repo = GitRepository::open(&repo_path).unwrap();

        let fork = repo.peel_to_commit("HEAD").unwrap();
        git(&repo_path, &["checkout", "-b", "feature"]);
        create_commit(&repo_path, "Feature commit", "feature.txt");
        git(&repo_path, &["checkout", "main"]);
        create_commit(&repo_path, "Main commit", "main.txt");

        assert_eq!(repo.merge_base("main", "feature").unwrap(), fork);
    }
}
