use super::{continue_command, load_context, resolve_method, MethodArg};
use crate::errors::Result;
use crate::stack::{RestackManager, RestackRequest, Scope};
use crate::utils::CancellationToken;
use clap::Subcommand;
use tracing::info;

/// Repository-wide actions
#[derive(Debug, Subcommand)]
pub enum RepoAction {
    /// Restack every tracked branch on its base, in dependency order
    Restack {
        /// Method to use for restacking
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
}

pub fn run(action: RepoAction) -> Result<()> {
    match action {
        RepoAction::Restack { method } => restack(method),
    }
}

fn restack(method: Option<MethodArg>) -> Result<()> {
    let ctx = load_context()?;

    let current_branch = ctx.wt.current_branch()?;
    let method = resolve_method(method, &ctx.settings);

    let manager = RestackManager::new(&ctx.store, &ctx.repo, &ctx.wt);
    let count = manager.restack_scope(
        &RestackRequest {
            start: ctx.store.trunk().to_string(),
            scope: Scope::All,
            skip_start: false,
            method,
            continue_command: continue_command(&["repo", "restack"], method),
        },
        &CancellationToken::new(),
    )?;

    if count == 0 {
        info!("Nothing to restack: no tracked branches available");
        return Ok(());
    }

    ctx.wt.checkout(&current_branch)?;
    info!("Restacked {} branches", count);
    Ok(())
}
