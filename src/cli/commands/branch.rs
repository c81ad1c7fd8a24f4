use super::{continue_command, load_context, resolve_method, MethodArg};
use crate::errors::{Result, SpiceError};
use crate::stack::{
    BranchOntoRequest, RescueRequest, RestackManager, RestackRequest, Scope, UpsertRequest,
};
use crate::utils::CancellationToken;
use clap::Subcommand;
use tracing::info;

/// Branch management actions
#[derive(Debug, Subcommand)]
pub enum BranchAction {
    /// Begin tracking a branch in the stack
    Track {
        /// Branch to track (defaults to the current branch)
        name: Option<String>,

        /// Base branch (defaults to the trunk)
        #[arg(long)]
        base: Option<String>,
    },

    /// Stop tracking a branch
    Untrack {
        /// Branch to untrack (defaults to the current branch)
        name: Option<String>,
    },

    /// Restack the branch onto its base
    Restack {
        /// Branch to restack (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,

        /// Method to use for restacking
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },

    /// Move the branch onto a new base
    Onto {
        /// Branch to move the branch onto
        #[arg(long)]
        onto: String,

        /// Branch to move (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,

        /// Method to use for restacking
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
}

pub fn run(action: BranchAction) -> Result<()> {
    match action {
        BranchAction::Track { name, base } => track(name, base),
        BranchAction::Untrack { name } => untrack(name),
        BranchAction::Restack { branch, method } => restack(branch, method),
        BranchAction::Onto {
            onto,
            branch,
            method,
        } => onto_cmd(onto, branch, method),
    }
}

fn track(name: Option<String>, base: Option<String>) -> Result<()> {
    let ctx = load_context()?;

    let name = match name {
        Some(name) => name,
        None => ctx.wt.current_branch()?,
    };
    if name == ctx.store.trunk() {
        return Err(SpiceError::branch(format!(
            "trunk branch '{name}' cannot be tracked"
        )));
    }
    if !ctx.repo.branch_exists(&name) {
        return Err(SpiceError::branch(format!("branch '{name}' does not exist")));
    }

    let base = base.unwrap_or_else(|| ctx.store.trunk().to_string());

    // Record the divergence point from the base, not the base's current
    // head: the branch may not contain newer base commits yet.
    let base_hash = ctx
        .repo
        .merge_base(&base, &name)
        .or_else(|_| ctx.repo.peel_to_commit(&base))
        .map_err(|_| SpiceError::BaseMissing(base.clone()))?;
    let head = ctx.repo.peel_to_commit(&name)?;

    let mut tx = ctx.store.begin_branch_tx()?;
    tx.upsert(UpsertRequest {
        name: name.clone(),
        base: Some(base.clone()),
        base_hash: Some(base_hash),
        head: Some(head),
        ..Default::default()
    })?;
    tx.commit(&format!("{name}: track with base {base}"))?;

    info!("{}: tracking with base {}", name, base);
    Ok(())
}

fn untrack(name: Option<String>) -> Result<()> {
    let ctx = load_context()?;

    let name = match name {
        Some(name) => name,
        None => ctx.wt.current_branch()?,
    };

    // Fail early with the friendlier error when the branch is unknown.
    ctx.store.lookup_branch(&name)?;

    let mut tx = ctx.store.begin_branch_tx()?;
    tx.delete(&name)?;
    tx.commit(&format!("{name}: untrack"))?;

    info!("{}: no longer tracked", name);
    Ok(())
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
            scope: Scope::Branch,
            skip_start: false,
            method,
            continue_command: continue_command(&["branch", "restack"], method),
        },
        &CancellationToken::new(),
    )?;

    Ok(())
}

fn onto_cmd(onto: String, branch: Option<String>, method: Option<MethodArg>) -> Result<()> {
    let ctx = load_context()?;

    let branch = match branch {
        Some(branch) => branch,
        None => ctx.wt.current_branch()?,
    };
    let method = resolve_method(method, &ctx.settings);

    let manager = RestackManager::new(&ctx.store, &ctx.repo, &ctx.wt);
    let request = BranchOntoRequest {
        branch: branch.clone(),
        onto: onto.clone(),
        merged_downstack: None,
        method,
    };

    if let Err(err) = manager.branch_onto(&request) {
        if err.is_interrupt() {
            let mut command = continue_command(&["branch", "onto"], method);
            command.push("--onto".to_string());
            command.push(onto.clone());
            command.push("--branch".to_string());
            command.push(branch.clone());

            return Err(manager.rescue(RescueRequest {
                err,
                command,
                branch: Some(branch),
                message: Some(format!("interrupted: branch onto {onto}")),
            }));
        }
        return Err(err);
    }

    info!("{}: moved onto {}", branch, onto);
    Ok(())
}
