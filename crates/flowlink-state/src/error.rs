//! Storage error types.

/// Errors produced by [`StateBackend`](crate::StateBackend) and
/// [`ConfigStore`](crate::ConfigStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored JSON column failed to decode.
    #[error("corrupt stored value in {table}: {source}")]
    Corrupt {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state backend lock poisoned")]
    LockPoisoned,
}

impl StateError {
    pub(crate) fn corrupt(table: &'static str, source: serde_json::Error) -> Self {
        Self::Corrupt { table, source }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
