use super::{load_context, Context};
use crate::cli::Cli;
use crate::errors::{Result, SpiceError};
use crate::git::CreateBranchRequest;
use crate::stack::Continuation;
use clap::Parser;
use tracing::{debug, error, warn};

pub fn run(edit: bool) -> Result<()> {
    let ctx = load_context()?;

    if ctx.wt.rebase_state().is_ok() {
        debug!("Rebase in progress, continuing rebase");
        if let Err(err) = ctx.wt.rebase_continue(edit) {
            if matches!(err, SpiceError::RebaseInterrupt(_)) {
                print_more_conflicts();
            }
            return Err(err);
        }
        return replay_continuations(&ctx);
    }

    if ctx.wt.merge_state().is_ok() {
        debug!("Merge in progress, continuing merge");
        if let Err(err) = ctx.wt.merge_continue(edit) {
            if matches!(err, SpiceError::MergeInterrupt(_)) {
                print_more_conflicts();
            }
            return Err(err);
        }

        // The merge method works on a detached HEAD; the branch ref still
        // points at the pre-merge tip until repaired.
        repair_restack_merge(&ctx);
        return replay_continuations(&ctx);
    }

    Err(SpiceError::NoOperation)
}

fn print_more_conflicts() {
    error!(
        "There are more conflicts to resolve.\n\
         Resolve them and run the following command again:\n  gs continue\n\
         To abort the remaining operations run:\n  gs abort"
    );
}

/// If HEAD is a restack merge commit, force-move the restacked branch to it.
/// The subject is the only reliable marker: the user may have completed the
/// merge manually instead of through `gs continue`.
fn repair_restack_merge(ctx: &Context) {
    let Ok(head_commit) = ctx.repo.peel_to_commit("HEAD") else {
        return;
    };
    let Ok(subject) = ctx.repo.commit_subject(&head_commit) else {
        return;
    };
    if !subject.starts_with("Restack ") || !subject.contains(" via merge") {
        return;
    }

    // Subject format: "Restack <branch> onto <base> via merge"
    let parts: Vec<&str> = subject.split(' ').collect();
    if parts.len() >= 4 && parts[0] == "Restack" && parts[2] == "onto" {
        let branch = parts[1];
        debug!(
            "Detected completed restack merge; moving '{}' to {}",
            branch, head_commit
        );
        if let Err(err) = ctx.repo.create_branch(CreateBranchRequest {
            name: branch.to_string(),
            head: head_commit,
            force: true,
        }) {
            warn!("Failed to update branch ref after restack merge: {err}");
        }
    }
}

/// Drain the continuation queue in order. When an entry fails, the entries
/// after it go back into the queue; the failing entry re-records its own
/// continuation on re-entry, so it is not pushed back here.
fn replay_continuations(ctx: &Context) -> Result<()> {
    let continuations = ctx.store.take_continuations("gs continue")?;

    for (idx, continuation) in continuations.iter().enumerate() {
        debug!(
            "Running continuation '{}' on branch '{}'",
            continuation.command.join(" "),
            continuation.branch
        );

        if let Err(err) = run_continuation(ctx, continuation) {
            ctx.store
                .append_continuations("continue", &continuations[idx + 1..])?;
            return Err(err);
        }
    }

    Ok(())
}

fn run_continuation(ctx: &Context, continuation: &Continuation) -> Result<()> {
    ctx.wt.checkout(&continuation.branch)?;

    let args = std::iter::once("gs".to_string()).chain(continuation.command.iter().cloned());
    let cli = Cli::try_parse_from(args).map_err(|err| {
        error!("Corrupt continuation: {:?}", continuation.command);
        SpiceError::config(format!("parse continuation: {err}"))
    })?;

    cli.command.execute()
}
