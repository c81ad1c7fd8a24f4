use super::metadata::Continuation;
use super::restack::{RestackManager, RestackMethod};
use crate::errors::SpiceError;
use crate::git::worktree::{InterruptKind, RebaseInterruptError};
use tracing::{debug, error, info};

/// Request to convert an interruption into user guidance and a continuation.
#[derive(Debug)]
pub struct RescueRequest {
    /// The error that interrupted the operation.
    pub err: SpiceError,
    /// Command to re-run after the user resolves the interruption.
    /// Empty to record no continuation.
    pub command: Vec<String>,
    /// Branch the command should run on. Defaults to the interrupted branch
    /// reported by the adapter.
    pub branch: Option<String>,
    /// Audit message for the recorded continuation.
    pub message: Option<String>,
}

impl RestackManager<'_> {
    /// Rescue an interrupted operation: print guidance keyed off the
    /// interruption kind, restart the continuation queue, record the given
    /// command, and return the error marked as rescued.
    ///
    /// Rescuing an already-rescued error is a no-op apart from recording the
    /// command, so nested callers can rescue unconditionally without
    /// repeating the message or re-draining the queue. Errors that are not
    /// interruptions pass through unchanged.
    pub fn rescue(&self, req: RescueRequest) -> SpiceError {
        let (rescued, interrupted_branch) = match req.err {
            err @ SpiceError::Rescued { .. } => {
                let branch = match &err {
                    SpiceError::Rescued { branch, .. } => branch.clone(),
                    _ => unreachable!(),
                };
                (err, branch)
            }

            SpiceError::RestackInterrupt {
                method,
                branch,
                source,
            } => {
                // First rescue in a possible chain: a fresh interruption
                // restarts the plan, so whatever was queued is obsolete.
                if let Err(store_err) = self.store().take_continuations("restack rescue") {
                    return store_err;
                }
                print_restack_guidance(method, &source);

                let interrupted = Some(branch.clone());
                let rescued = SpiceError::Rescued {
                    branch: interrupted.clone(),
                    source: Box::new(SpiceError::RestackInterrupt {
                        method,
                        branch,
                        source,
                    }),
                };
                (rescued, interrupted)
            }

            SpiceError::RebaseInterrupt(e) => {
                if let Err(store_err) = self.store().take_continuations("rebase rescue") {
                    return store_err;
                }
                print_rebase_guidance(&e);

                let interrupted = e.state.branch.clone();
                let rescued = SpiceError::Rescued {
                    branch: interrupted.clone(),
                    source: Box::new(SpiceError::RebaseInterrupt(e)),
                };
                (rescued, interrupted)
            }

            SpiceError::MergeInterrupt(e) => {
                if let Err(store_err) = self.store().take_continuations("merge rescue") {
                    return store_err;
                }
                print_merge_guidance();

                let interrupted = e.state.branch.clone();
                let rescued = SpiceError::Rescued {
                    branch: interrupted.clone(),
                    source: Box::new(SpiceError::MergeInterrupt(e)),
                };
                (rescued, interrupted)
            }

            other => return other,
        };

        if req.command.is_empty() {
            return rescued;
        }

        let branch = req.branch.or(interrupted_branch).unwrap_or_default();
        let message = req
            .message
            .unwrap_or_else(|| format!("interrupted: branch {branch}"));

        let continuation = Continuation {
            command: req.command,
            branch,
        };
        debug!(
            "Pushing continuation '{}' for branch '{}'",
            continuation.command.join(" "),
            continuation.branch
        );
        if let Err(store_err) = self
            .store()
            .append_continuations(&message, &[continuation])
        {
            return store_err;
        }

        rescued
    }
}

fn print_restack_guidance(method: RestackMethod, source: &SpiceError) {
    match method {
        RestackMethod::Rebase => match source {
            SpiceError::RebaseInterrupt(e) => print_rebase_guidance(e),
            _ => print_generic_guidance(),
        },
        RestackMethod::Merge => print_merge_guidance(),
    }
}

fn print_rebase_guidance(err: &RebaseInterruptError) {
    match err.kind {
        InterruptKind::Conflict => {
            error!(
                "There was a conflict while rebasing.\n\
                 Resolve the conflict and run:\n  gs continue\n\
                 Or abort the operation with:\n  gs abort"
            );
        }
        InterruptKind::Deliberate => {
            info!(
                "The rebase was interrupted by an 'edit' or 'break' instruction.\n\
                 When you're ready to continue, run:\n  gs continue\n\
                 Or abort the operation with:\n  gs abort"
            );
        }
    }
}

fn print_merge_guidance() {
    error!(
        "There was a conflict while merging.\n\
         Resolve the conflict and run:\n  gs continue\n\
         Or abort the operation with:\n  gs abort"
    );
}

fn print_generic_guidance() {
    error!(
        "There was a conflict during restacking.\n\
         Resolve the conflict and run:\n  gs continue\n\
         Or abort the operation with:\n  gs abort"
    );
}
