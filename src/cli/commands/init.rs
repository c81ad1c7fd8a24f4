use crate::config::{self, Settings};
use crate::errors::{Result, SpiceError};
use crate::git::{self, GitRepository, Worktree};
use crate::stack::Store;
use tracing::info;

pub fn run(trunk: Option<String>) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let root = git::find_repository_root(&cwd)?;
    let git_dir = git::resolve_git_dir(&root)?;

    let trunk = match trunk {
        Some(trunk) => {
            let repo = GitRepository::open(&root)?;
            if !repo.branch_exists(&trunk) {
                return Err(SpiceError::branch(format!(
                    "trunk branch '{trunk}' does not exist"
                )));
            }
            trunk
        }
        None => Worktree::open(&root)?.current_branch()?,
    };

    Store::init(&git_dir, &trunk)?;
    if !config::config_path(&git_dir).exists() {
        config::save_settings(&git_dir, &Settings::default())?;
    }

    info!("Initialized repository with trunk '{}'", trunk);
    Ok(())
}
