use crate::errors::{Result, SpiceError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// How an in-flight rebase or merge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    /// Stopped on conflicting changes that the user must resolve.
    Conflict,
    /// Stopped on purpose, e.g. an `edit` or `break` rebase instruction.
    Deliberate,
}

/// State of an in-progress rebase, read from the git directory.
#[derive(Debug, Clone)]
pub struct RebaseState {
    /// Branch being rebased, when git recorded one.
    pub branch: Option<String>,
}

/// State of an in-progress merge, read from the git directory.
#[derive(Debug, Clone)]
pub struct MergeState {
    /// Branch being merged in, when it can be determined.
    pub branch: Option<String>,
}

/// A rebase operation stopped before completing.
#[derive(Debug, Clone)]
pub struct RebaseInterruptError {
    pub kind: InterruptKind,
    pub state: RebaseState,
}

impl fmt::Display for RebaseInterruptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rebase")?;
        if let Some(branch) = &self.state.branch {
            write!(f, " of {branch}")?;
        }
        write!(f, " interrupted")?;
        match self.kind {
            InterruptKind::Conflict => write!(f, " by a conflict"),
            InterruptKind::Deliberate => write!(f, " deliberately"),
        }
    }
}

impl std::error::Error for RebaseInterruptError {}

/// A merge operation stopped before completing.
#[derive(Debug, Clone)]
pub struct MergeInterruptError {
    pub kind: InterruptKind,
    pub state: MergeState,
}

impl fmt::Display for MergeInterruptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge")?;
        if let Some(branch) = &self.state.branch {
            write!(f, " of {branch}")?;
        }
        write!(f, " interrupted")?;
        match self.kind {
            InterruptKind::Conflict => write!(f, " by a conflict"),
            InterruptKind::Deliberate => write!(f, " deliberately"),
        }
    }
}

impl std::error::Error for MergeInterruptError {}

/// Request to rebase a branch.
#[derive(Debug, Clone, Default)]
pub struct RebaseRequest {
    /// Branch to rebase.
    pub branch: String,
    /// Commitish to rebase onto.
    pub onto: String,
    /// Commit to start rewriting from (exclusive).
    pub upstream: String,
    /// Stash and restore uncommitted changes around the rebase.
    pub autostash: bool,
    /// Reduce git's output.
    pub quiet: bool,
}

/// Request to merge a commit or branch into the current HEAD.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    /// Commitish to merge into HEAD.
    pub source: String,
    /// Commit message for the merge commit.
    pub message: Option<String>,
    /// Force a merge commit even when fast-forward is possible.
    pub no_ff: bool,
    /// Perform the merge but stop before committing.
    pub no_commit: bool,
    /// Reduce git's output.
    pub quiet: bool,
}

/// Request to create a commit on the current branch.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    /// Commit message; the editor opens when unset.
    pub message: Option<String>,
    /// Stage all tracked changes first.
    pub all: bool,
    /// Allow a commit with no changes.
    pub allow_empty: bool,
    /// Bypass pre-commit and commit-msg hooks.
    pub no_verify: bool,
}

/// Mutating side of the version-control adapter.
///
/// Rebase, merge, checkout and commit shell out to the `git` CLI: the
/// suspension semantics the engine depends on (conflict stops, `--continue`,
/// `--abort`, the state files under the git directory) belong to git itself.
pub struct Worktree {
    workdir: PathBuf,
    git_dir: PathBuf,
}

impl Worktree {
    /// Open the worktree containing the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let workdir = super::find_repository_root(path)?;
        let git_dir = super::resolve_git_dir(&workdir)?;
        Ok(Self { workdir, git_dir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        debug!("Running git {}", args.join(" "));
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(SpiceError::Io)
    }

    fn git_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
        debug!("Running git {}", args.join(" "));
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.output().map_err(SpiceError::Io)
    }

    /// Name of the currently checked out branch.
    pub fn current_branch(&self) -> Result<String> {
        let output = self.git(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if !output.status.success() {
            return Err(SpiceError::DetachedHead);
        }

        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            return Err(SpiceError::DetachedHead);
        }
        Ok(name)
    }

    /// Check out a branch, commit, or other reference.
    /// Checking out a bare commit hash detaches HEAD.
    pub fn checkout(&self, reference: &str) -> Result<()> {
        let output = self.git(&["checkout", "--quiet", reference])?;
        if !output.status.success() {
            return Err(SpiceError::branch(format!(
                "Could not checkout '{reference}': {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Run a rebase, classifying interruptions.
    pub fn rebase(&self, req: RebaseRequest) -> Result<()> {
        let mut args = vec!["rebase"];
        if req.autostash {
            args.push("--autostash");
        }
        if req.quiet {
            args.push("--quiet");
        }
        args.push("--onto");
        args.push(&req.onto);
        args.push(&req.upstream);
        args.push(&req.branch);

        let output = self.git(&args)?;
        if !output.status.success() {
            return Err(self.classify_rebase_failure(&output));
        }
        self.finish_rebase()
    }

    /// Continue an interrupted rebase after conflicts are resolved.
    /// With `edit` unset, commits are taken as-is without opening an editor.
    pub fn rebase_continue(&self, edit: bool) -> Result<()> {
        let output = if edit {
            self.git(&["rebase", "--continue"])?
        } else {
            self.git_with_env(&["rebase", "--continue"], &[("GIT_EDITOR", "true")])?
        };

        if !output.status.success() {
            return Err(self.classify_rebase_failure(&output));
        }
        self.finish_rebase()
    }

    /// Abort an in-progress rebase.
    pub fn rebase_abort(&self) -> Result<()> {
        let output = self.git(&["rebase", "--abort"])?;
        if !output.status.success() {
            return Err(SpiceError::branch(format!(
                "Could not abort rebase: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// State of the in-progress rebase, or [`SpiceError::NoOperation`].
    pub fn rebase_state(&self) -> Result<RebaseState> {
        // git records an in-progress rebase under rebase-merge (the default
        // backend) or rebase-apply (git am based), with the rebased ref in
        // head-name.
        for dir in ["rebase-merge", "rebase-apply"] {
            let head_name = self.git_dir.join(dir).join("head-name");
            if head_name.exists() {
                let branch = std::fs::read_to_string(&head_name)
                    .ok()
                    .map(|s| s.trim().trim_start_matches("refs/heads/").to_string())
                    .filter(|s| !s.is_empty() && s != "detached HEAD");
                return Ok(RebaseState { branch });
            }
            if self.git_dir.join(dir).exists() {
                return Ok(RebaseState { branch: None });
            }
        }

        Err(SpiceError::NoOperation)
    }

    fn classify_rebase_failure(&self, output: &Output) -> SpiceError {
        match self.rebase_state() {
            Ok(state) => SpiceError::RebaseInterrupt(RebaseInterruptError {
                kind: InterruptKind::Conflict,
                state,
            }),
            Err(_) => SpiceError::branch(format!(
                "Rebase failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
        }
    }

    fn finish_rebase(&self) -> Result<()> {
        // Rebase state surviving a zero exit means the rebase stopped on
        // purpose (edit/break instruction).
        if let Ok(state) = self.rebase_state() {
            return Err(SpiceError::RebaseInterrupt(RebaseInterruptError {
                kind: InterruptKind::Deliberate,
                state,
            }));
        }
        Ok(())
    }

    /// Run a merge into the current HEAD, classifying interruptions.
    pub fn merge(&self, req: MergeRequest) -> Result<()> {
        // Never include advice on how to resolve merge conflicts;
        // the rescue path prints its own guidance.
        let mut args = vec!["-c", "advice.mergeConflict=false", "merge"];
        if req.no_commit {
            args.push("--no-commit");
        }
        if req.no_ff {
            args.push("--no-ff");
        }
        if req.quiet {
            args.push("--quiet");
        }
        if let Some(message) = &req.message {
            args.push("-m");
            args.push(message);
        }
        args.push(&req.source);

        let output = self.git(&args)?;
        if !output.status.success() {
            return Err(self.classify_merge_failure(&output));
        }
        self.finish_merge()
    }

    /// Continue an interrupted merge by committing the resolved result.
    pub fn merge_continue(&self, edit: bool) -> Result<()> {
        let unmerged = self.list_unmerged_paths()?;
        if !unmerged.is_empty() {
            return Err(SpiceError::branch(format!(
                "unmerged files remain: {}",
                unmerged.join(", ")
            )));
        }

        let output = if edit {
            self.git(&["commit"])?
        } else {
            self.git(&["commit", "--no-edit"])?
        };

        if !output.status.success() {
            return Err(self.classify_merge_failure(&output));
        }
        self.finish_merge()
    }

    /// Abort an in-progress merge.
    pub fn merge_abort(&self) -> Result<()> {
        let output = self.git(&["merge", "--abort"])?;
        if !output.status.success() {
            return Err(SpiceError::branch(format!(
                "Could not abort merge: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// State of the in-progress merge, or [`SpiceError::NoOperation`].
    pub fn merge_state(&self) -> Result<MergeState> {
        let merge_head = self.git_dir.join("MERGE_HEAD");
        if !merge_head.exists() {
            return Err(SpiceError::NoOperation);
        }

        // MERGE_MSG usually opens with "Merge branch 'name'"; fall back to
        // the raw commit hash from MERGE_HEAD.
        let mut branch = None;
        if let Ok(msg) = std::fs::read_to_string(self.git_dir.join("MERGE_MSG")) {
            if let Some(first_line) = msg.lines().next() {
                if let Some(rest) = first_line.strip_prefix("Merge branch '") {
                    if let Some(end) = rest.find('\'') {
                        branch = Some(rest[..end].to_string());
                    }
                }
            }
        }
        if branch.is_none() {
            branch = std::fs::read_to_string(&merge_head)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }

        Ok(MergeState { branch })
    }

    fn classify_merge_failure(&self, output: &Output) -> SpiceError {
        match self.merge_state() {
            Ok(state) => SpiceError::MergeInterrupt(MergeInterruptError {
                kind: InterruptKind::Conflict,
                state,
            }),
            Err(_) => SpiceError::branch(format!(
                "Merge failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
        }
    }

    fn finish_merge(&self) -> Result<()> {
        // Merge state surviving a zero exit means a deliberate stop
        // (e.g. --no-commit).
        if let Ok(state) = self.merge_state() {
            return Err(SpiceError::MergeInterrupt(MergeInterruptError {
                kind: InterruptKind::Deliberate,
                state,
            }));
        }
        Ok(())
    }

    /// Paths with unresolved conflicts in the index.
    pub fn list_unmerged_paths(&self) -> Result<Vec<String>> {
        let output = self.git(&["diff", "--name-only", "--diff-filter=U"])?;
        if !output.status.success() {
            return Err(SpiceError::branch(format!(
                "Could not list unmerged paths: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Create a commit on the current branch.
    pub fn commit(&self, req: CommitRequest) -> Result<()> {
        let mut args = vec!["commit"];
        if req.all {
            args.push("--all");
        }
        if req.allow_empty {
            args.push("--allow-empty");
        }
        if req.no_verify {
            args.push("--no-verify");
        }
        if let Some(message) = &req.message {
            args.push("-m");
            args.push(message);
        }

        let output = self.git(&args)?;
        if !output.status.success() {
            return Err(SpiceError::branch(format!(
                "Commit failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
