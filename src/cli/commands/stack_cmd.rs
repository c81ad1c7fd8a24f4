use super::{continue_command, load_context, resolve_method, MethodArg};
use crate::errors::Result;
use crate::stack::{RestackManager, RestackRequest, Scope};
use crate::utils::CancellationToken;
use clap::Subcommand;

/// Stack actions
#[derive(Debug, Subcommand)]
pub enum StackAction {
    /// Restack all branches in the stack on their bases
    Restack {
        /// Branch whose stack to restack (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,

        /// Method to use for restacking
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
}

pub fn run(action: StackAction) -> Result<()> {
    match action {
        StackAction::Restack { branch, method } => restack(branch, method),
    }
}

fn restack(branch: Option<String>, method: Option<MethodArg>) -> Result<()> {
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
            scope: Scope::Stack,
            skip_start: false,
            method,
            continue_command: continue_command(&["stack", "restack"], method),
        },
        &CancellationToken::new(),
    )?;

    Ok(())
}
