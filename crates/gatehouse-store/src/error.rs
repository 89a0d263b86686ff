//! Error types for the store layer.

/// Errors returned by a [`Repository`](crate::Repository).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record matched the lookup. `what` names the lookup for logs,
    /// e.g. `account name "alice"`.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A record with the same key already exists.
    #[error("{0} already exists")]
    Conflict(String),

    /// A stored record could not be turned into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The fixture file could not be read.
    #[error("failed to read fixtures: {0}")]
    Io(#[from] std::io::Error),

    /// The fixture file is not valid JSON for [`Fixtures`](crate::Fixtures).
    #[error("invalid fixtures: {0}")]
    Fixtures(#[from] serde_json::Error),

    /// The database rejected or failed a query.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Returns `true` if the error only means "no such record".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
