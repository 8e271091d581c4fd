//! Error types for scanalert

use thiserror::Error;

/// Result type alias for host-session operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Result type alias for scan and registration operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised by the observed session while running the caller's own queries.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Errors produced while registering or running a sequential-scan check.
///
/// Only [`ScanError::Registration`] is ever returned to a caller. Everything
/// else happens after the original query already finished and is handed to the
/// configured error sink instead.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// The session handle needed to run the explain query is gone.
    #[error("failed to access DB object: {0}")]
    ConnectionAccess(String),

    /// The explain query itself failed.
    #[error("failed to run the EXPLAIN query: {0}")]
    ExplainExecution(String),

    /// A single plan row could not be decoded as text.
    #[error("failed to scan explain results: {0}")]
    RowScan(String),

    /// The hook could not be attached to the session.
    #[error("failed to register hook '{key}': {reason}")]
    Registration { key: String, reason: String },

    /// No explain prefix or scan marker is known for the session's dialect.
    #[error("sequential scan detection is not supported for dialect '{0}'")]
    UnsupportedDialect(String),
}

impl ScanError {
    /// Create a registration error for a hook key.
    pub fn registration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Registration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a registration error
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Registration { .. })
    }
}

impl From<OrmError> for ScanError {
    fn from(err: OrmError) -> Self {
        Self::ExplainExecution(err.to_string())
    }
}
