use crate::errors::{Result, SpiceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag threaded through long-running operations.
///
/// Git subprocesses share the process group and die with the CLI on SIGINT;
/// the token covers the gaps between adapter calls so a cancelled composite
/// operation stops instead of starting the next branch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if the token has been triggered.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SpiceError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        let clone = token.clone();
        clone.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(SpiceError::Cancelled)));
    }
}
