use crate::git::worktree::{MergeInterruptError, RebaseInterruptError};
use crate::stack::restack::RestackMethod;

/// Spice Error Types
#[derive(Debug, thiserror::Error)]
pub enum SpiceError {
    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Branch management errors
    #[error("Branch error: {0}")]
    Branch(String),

    /// The branch has no record in the state store
    #[error("branch '{0}' is not tracked")]
    NotTracked(String),

    /// The recorded base of a branch cannot be resolved
    #[error("base branch '{0}' does not exist")]
    BaseMissing(String),

    /// The branch is already on top of its base
    #[error("branch is already restacked")]
    AlreadyRestacked,

    /// A rebase stopped before completing
    #[error(transparent)]
    RebaseInterrupt(RebaseInterruptError),

    /// A merge stopped before completing
    #[error(transparent)]
    MergeInterrupt(MergeInterruptError),

    /// A restack stopped before completing, regardless of method
    #[error("{method} of {branch} interrupted: {source}")]
    RestackInterrupt {
        method: RestackMethod,
        branch: String,
        source: Box<SpiceError>,
    },

    /// An interruption that has already been reported to the user.
    /// Outer callers must propagate this unchanged.
    #[error("{source}")]
    Rescued {
        branch: Option<String>,
        source: Box<SpiceError>,
    },

    /// The state store snapshot moved underneath a transaction
    #[error("state store was modified concurrently")]
    StateConflict,

    /// `abort` with nothing in progress and an empty queue
    #[error("no operation to abort")]
    NothingToAbort,

    /// `continue` with no rebase or merge in progress
    #[error("no rebase or merge in progress")]
    NoOperation,

    /// HEAD does not point at a branch
    #[error("HEAD is detached")]
    DetachedHead,

    /// The operation was cancelled by the user
    #[error("operation cancelled")]
    Cancelled,
}

impl SpiceError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SpiceError::Config(msg.into())
    }

    pub fn branch<S: Into<String>>(msg: S) -> Self {
        SpiceError::Branch(msg.into())
    }

    /// Whether this error is an interruption that the rescue path
    /// converts into user guidance and a continuation.
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            SpiceError::RebaseInterrupt(_)
                | SpiceError::MergeInterrupt(_)
                | SpiceError::RestackInterrupt { .. }
                | SpiceError::Rescued { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SpiceError>;
