//! Pool error types.

use std::time::Duration;

use sqlpool_driver::DriverError;
use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    MalformedDsn(#[source] DriverError),

    /// No driver is registered for the DSN scheme.
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// A driver failed to open a connection.
    #[error("failed to create connection: {0}")]
    Connect(#[source] DriverError),

    /// Not a single initial connection could be opened.
    #[error("failed to fill the pool with initial connections ({attempted} attempted): {source}")]
    NoInitialConnections {
        /// Number of connections attempted.
        attempted: usize,
        /// The last connect error.
        #[source]
        source: DriverError,
    },

    /// Every connection is leased and the pool is at capacity.
    #[error("connection pool exhausted ({max} connections in use)")]
    PoolExhausted {
        /// Maximum allowed connections.
        max: usize,
    },

    /// A bounded wait for a connection expired.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// The reaper thread could not be started.
    #[error("failed to start reaper thread: {0}")]
    ReaperSpawn(#[source] std::io::Error),

    /// The pool was shut down while leases were still outstanding.
    #[error("pool shut down with {leased} outstanding lease(s)")]
    InvariantViolation {
        /// Leases still held by callers.
        leased: usize,
    },
}

impl PoolError {
    /// Check if this error is transient and the caller may retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. } | Self::AcquisitionTimeout(_) | Self::Connect(_)
        )
    }

    pub(crate) fn malformed_dsn(err: DriverError) -> Self {
        Self::MalformedDsn(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(PoolError::PoolExhausted { max: 4 }.is_transient());
        assert!(PoolError::AcquisitionTimeout(Duration::from_millis(5)).is_transient());
        assert!(PoolError::Connect(DriverError::Connect("refused".into())).is_transient());
        assert!(!PoolError::UnsupportedBackend("oracle".into()).is_transient());
        assert!(!PoolError::InvariantViolation { leased: 1 }.is_transient());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PoolError::PoolExhausted { max: 3 }.to_string(),
            "connection pool exhausted (3 connections in use)"
        );
        assert_eq!(
            PoolError::UnsupportedBackend("db2".into()).to_string(),
            "unsupported backend: db2"
        );
    }
}
