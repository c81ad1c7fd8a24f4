pub mod repository;
pub mod worktree;

pub use repository::{CreateBranchRequest, GitRepository};
pub use worktree::{
    CommitRequest, InterruptKind, MergeInterruptError, MergeRequest, MergeState,
    RebaseInterruptError, RebaseRequest, RebaseState, Worktree,
};

use crate::errors::{Result, SpiceError};
use std::path::{Path, PathBuf};

/// Resolve the per-worktree git directory from a workdir path.
/// Handles both normal repos (.git is a directory) and worktrees (.git is a file
/// containing `gitdir: <path>`).
pub fn resolve_git_dir(workdir: &Path) -> Result<PathBuf> {
    let git_path = workdir.join(".git");
    if git_path.is_dir() {
        Ok(git_path)
    } else if git_path.is_file() {
        let content = std::fs::read_to_string(&git_path)
            .map_err(|e| SpiceError::config(format!("Failed to read .git file: {e}")))?;
        let gitdir = content
            .strip_prefix("gitdir: ")
            .map(|s| s.trim())
            .ok_or_else(|| SpiceError::config("Invalid .git file format"))?;
        let resolved = if Path::new(gitdir).is_absolute() {
            PathBuf::from(gitdir)
        } else {
            workdir.join(gitdir)
        };
        Ok(resolved)
    } else {
        Err(SpiceError::config(format!(
            "Not a git repository: {}",
            git_path.display()
        )))
    }
}

/// Find the root of the Git repository containing `start_path`.
pub fn find_repository_root(start_path: &Path) -> Result<PathBuf> {
    let repo = git2::Repository::discover(start_path).map_err(SpiceError::Git)?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| SpiceError::config("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}
