use super::{continue_command, load_context, resolve_method, MethodArg};
use crate::errors::Result;
use crate::stack::{RestackManager, RestackRequest, Scope};
use crate::utils::CancellationToken;
use clap::Subcommand;

/// Upstack actions
#[derive(Debug, Subcommand)]
pub enum UpstackAction {
    /// Restack the branch and all branches above it on their bases
    Restack {
        /// Branch to start at (defaults to the current branch).
        /// Starting at the trunk restacks all tracked branches.
        #[arg(long)]
        branch: Option<String>,

        /// Restack only the branches above the starting branch
        #[arg(long)]
        skip_start: bool,

        /// Method to use for restacking
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
}

pub fn run(action: UpstackAction) -> Result<()> {
    match action {
        UpstackAction::Restack {
            branch,
            skip_start,
            method,
        } => restack(branch, skip_start, method),
    }
}

fn restack(branch: Option<String>, skip_start: bool, method: Option<MethodArg>) -> Result<()> {
    let ctx = load_context()?;

    let branch = match branch {
        Some(branch) => branch,
        None => ctx.wt.current_branch()?,
    };
    let method = resolve_method(method, &ctx.settings);

    let manager = RestackManager::new(&ctx.store, &ctx.repo, &ctx.wt);
    manager.restack_scope(
        &RestackRequest {
            start: branch,
            scope: Scope::Upstack,
            skip_start,
            method,
            continue_command: continue_command(&["upstack", "restack"], method),
        },
        &CancellationToken::new(),
    )?;

    Ok(())
}
