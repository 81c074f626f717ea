//! Driver error types.

use thiserror::Error;

/// Errors raised by a backend driver or while parsing a DSN.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// The connection string could not be parsed.
    #[error("malformed DSN: {field}: {reason}")]
    MalformedDsn {
        /// The DSN field that was missing or invalid.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A physical connection could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Executing or preparing a statement failed.
    #[error("statement failed: {0}")]
    Statement(String),

    /// A prepared-statement parameter index was out of range.
    #[error("parameter index {index} out of range (statement has {count})")]
    ParameterIndex {
        /// The 1-based index that was requested.
        index: usize,
        /// Number of placeholders in the statement.
        count: usize,
    },

    /// A result column index was out of range.
    #[error("column index {index} out of range (result has {count})")]
    ColumnIndex {
        /// The 1-based index that was requested.
        index: usize,
        /// Number of columns in the result.
        count: usize,
    },

    /// A result column name did not match any column.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A value could not be read as the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type.
        expected: &'static str,
        /// Type actually stored.
        found: &'static str,
    },

    /// The cursor has no current row.
    #[error("no current row")]
    NoRow,

    /// The driver handle has been closed.
    #[error("connection is closed")]
    Closed,
}

impl DriverError {
    /// Create a `MalformedDsn` error.
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedDsn {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error came from opening a connection.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    /// Check if this error was caused by a statement or its parameters.
    #[must_use]
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Self::Statement(_)
                | Self::ParameterIndex { .. }
                | Self::ColumnIndex { .. }
                | Self::UnknownColumn(_)
                | Self::TypeMismatch { .. }
                | Self::NoRow
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_names_field() {
        let err = DriverError::malformed("port", "missing");
        assert_eq!(err.to_string(), "malformed DSN: port: missing");
    }

    #[test]
    fn test_error_classification() {
        assert!(DriverError::Connect("refused".into()).is_connect());
        assert!(!DriverError::Connect("refused".into()).is_statement());
        assert!(DriverError::Statement("syntax".into()).is_statement());
        assert!(DriverError::ParameterIndex { index: 3, count: 2 }.is_statement());
        assert!(!DriverError::Closed.is_statement());
    }
}
