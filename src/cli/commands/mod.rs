pub mod abort;
pub mod branch;
pub mod commit;
pub mod completions;
pub mod continue_cmd;
pub mod init;
pub mod log_cmd;
pub mod repo;
pub mod stack_cmd;
pub mod upstack;

use crate::config::{self, Settings};
use crate::errors::Result;
use crate::git::{self, GitRepository, Worktree};
use crate::stack::{RestackMethod, Store};
use clap::ValueEnum;

/// Restack method CLI argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    /// Rewrite commits with git rebase (linear history)
    Rebase,
    /// Fold the base in with a merge commit (preserves commits)
    Merge,
}

impl From<MethodArg> for RestackMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Rebase => RestackMethod::Rebase,
            MethodArg::Merge => RestackMethod::Merge,
        }
    }
}

/// Everything a command needs to talk to the repository and state store.
pub(crate) struct Context {
    pub repo: GitRepository,
    pub wt: Worktree,
    pub store: Store,
    pub settings: Settings,
}

pub(crate) fn load_context() -> Result<Context> {
    let cwd = std::env::current_dir()?;
    let root = git::find_repository_root(&cwd)?;
    let git_dir = git::resolve_git_dir(&root)?;

    Ok(Context {
        repo: GitRepository::open(&root)?,
        wt: Worktree::open(&root)?,
        store: Store::open(&git_dir)?,
        settings: config::load_settings(&git_dir)?,
    })
}

/// Method to use for a restack operation: the CLI flag when given,
/// otherwise the configured `restack.method`.
pub(crate) fn resolve_method(arg: Option<MethodArg>, settings: &Settings) -> RestackMethod {
    arg.map(RestackMethod::from)
        .unwrap_or(settings.restack.method)
}

/// Tokens for re-running a scope restack from a continuation.
/// The method is always pinned so a config edit mid-operation cannot
/// change how the remainder is restacked.
pub(crate) fn continue_command(base: &[&str], method: RestackMethod) -> Vec<String> {
    let mut tokens: Vec<String> = base.iter().map(|token| token.to_string()).collect();
    tokens.push("--method".to_string());
    tokens.push(method.to_string());
    tokens
}
