use super::{continue_command, load_context, resolve_method, MethodArg};
use crate::errors::{Result, SpiceError};
use crate::git::CommitRequest;
use crate::stack::{RestackManager, RestackRequest, Scope};
use crate::utils::CancellationToken;
use clap::Subcommand;
use tracing::debug;

/// Commit actions
#[derive(Debug, Subcommand)]
pub enum CommitAction {
    /// Commit staged changes and restack the branches above
    Create {
        /// Use the given message instead of opening an editor
        #[arg(long, short)]
        message: Option<String>,

        /// Stage all tracked changes before committing
        #[arg(long, short)]
        all: bool,

        /// Create a commit even if it contains no changes
        #[arg(long)]
        allow_empty: bool,

        /// Bypass pre-commit and commit-msg hooks
        #[arg(long)]
        no_verify: bool,

        /// Method to use for restacking
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
}

pub fn run(action: CommitAction) -> Result<()> {
    match action {
        CommitAction::Create {
            message,
            all,
            allow_empty,
            no_verify,
            method,
        } => create(message, all, allow_empty, no_verify, method),
    }
}

fn create(
    message: Option<String>,
    all: bool,
    allow_empty: bool,
    no_verify: bool,
    method: Option<MethodArg>,
) -> Result<()> {
    let ctx = load_context()?;

    ctx.wt.commit(CommitRequest {
        message,
        all,
        allow_empty,
        no_verify,
    })?;

    if ctx.wt.rebase_state().is_ok() {
        debug!("A rebase is in progress, skipping restack");
        return Ok(());
    }

    let current_branch = match ctx.wt.current_branch() {
        Ok(branch) => branch,
        Err(SpiceError::DetachedHead) => {
            debug!("HEAD is detached, skipping restack");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if current_branch != ctx.store.trunk() && ctx.store.lookup_branch(&current_branch).is_err() {
        debug!("Current branch is not tracked, skipping restack");
        return Ok(());
    }

    let method = resolve_method(method, &ctx.settings);
    let manager = RestackManager::new(&ctx.store, &ctx.repo, &ctx.wt);
    manager.restack_scope(
        &RestackRequest {
            start: current_branch,
            scope: Scope::Upstack,
            skip_start: true,
            method,
            continue_command: continue_command(&["upstack", "restack"], method),
        },
        &CancellationToken::new(),
    )?;

    Ok(())
}
