//! Dispatch error model.
//!
//! Business outcomes (not found, already running, catalog missing, dispatch
//! failed) are values on [`RunOutcome`](crate::dispatcher::RunOutcome), not
//! errors. `DispatchError` covers the faults that abort a run outright; the
//! boundary logs them and converts to a generic `{ok:false, error}` shape.

use flowlink_types::checkpoint::InvalidStreamKey;

/// Faults that abort a run before or during orchestration.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed persisted checkpoint row; the whole state load is aborted.
    /// Partial state is worse than none.
    #[error("corrupt checkpoint state: {0}")]
    InvalidStreamKey(#[from] InvalidStreamKey),

    /// Storage failure.
    #[error("state error: {0}")]
    State(#[from] flowlink_state::StateError),

    /// A blocking storage task panicked.
    #[error("storage task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, DispatchError>;
