use super::load_context;
use crate::errors::{Result, SpiceError};
use tracing::debug;

pub fn run() -> Result<()> {
    let ctx = load_context()?;

    let mut was_operating = false;

    if ctx.wt.rebase_state().is_ok() {
        debug!("Detected rebase in progress, aborting rebase");
        was_operating = true;
        ctx.wt.rebase_abort()?;
    }

    if ctx.wt.merge_state().is_ok() {
        debug!("Detected merge in progress, aborting merge");
        was_operating = true;
        ctx.wt.merge_abort()?;
    }

    let continuations = ctx.store.take_continuations("gs abort")?;

    // Something must have happened from the user's perspective; aborting
    // nothing is an error, not a no-op.
    if continuations.is_empty() && !was_operating {
        return Err(SpiceError::NothingToAbort);
    }

    for continuation in &continuations {
        debug!(
            "Operation aborted; will not run '{}' on '{}'",
            continuation.command.join(" "),
            continuation.branch
        );
    }

    Ok(())
}
