//! Prepared statements with positional `?` placeholders.

use chrono::{DateTime, Utc};

use crate::error::DriverError;
use crate::value::Value;

/// A pre-compiled statement with positional `?` placeholders.
///
/// Parameters are bound by 1-based index. A statement borrows its driver
/// and cannot outlive the lease it was prepared on.
pub trait PreparedStatement {
    /// Number of placeholders in the statement.
    fn param_count(&self) -> usize;

    /// Bind `value` to the placeholder at `index`.
    fn bind(&mut self, index: usize, value: Value) -> Result<(), DriverError>;

    /// Execute with the currently bound parameters, returning rows affected.
    fn execute(&mut self) -> Result<u64, DriverError>;

    /// Rows inserted, updated or deleted by the last [`execute`](Self::execute).
    fn rows_changed(&self) -> i64;

    /// Bind a string.
    fn set_string(&mut self, index: usize, value: &str) -> Result<(), DriverError> {
        self.bind(index, Value::Text(value.to_string()))
    }

    /// Bind a 32-bit integer.
    fn set_i32(&mut self, index: usize, value: i32) -> Result<(), DriverError> {
        self.bind(index, Value::from(value))
    }

    /// Bind a 64-bit integer.
    fn set_i64(&mut self, index: usize, value: i64) -> Result<(), DriverError> {
        self.bind(index, Value::Integer(value))
    }

    /// Bind a double.
    fn set_double(&mut self, index: usize, value: f64) -> Result<(), DriverError> {
        self.bind(index, Value::Double(value))
    }

    /// Bind a blob.
    fn set_blob(&mut self, index: usize, value: &[u8]) -> Result<(), DriverError> {
        self.bind(index, Value::Blob(value.to_vec()))
    }

    /// Bind a UTC timestamp.
    fn set_timestamp(&mut self, index: usize, value: DateTime<Utc>) -> Result<(), DriverError> {
        self.bind(index, Value::Timestamp(value))
    }

    /// Bind SQL NULL.
    fn set_null(&mut self, index: usize) -> Result<(), DriverError> {
        self.bind(index, Value::Null)
    }
}

/// Check a 1-based parameter index against a placeholder count.
pub fn check_param_index(index: usize, count: usize) -> Result<usize, DriverError> {
    if index == 0 || index > count {
        return Err(DriverError::ParameterIndex { index, count });
    }
    Ok(index - 1)
}

/// Count `?` placeholders outside of quoted literals and comments.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                // Doubled quotes inside a literal are consumed as two
                // back-to-back literals, which leaves the count unchanged.
                for d in chars.by_ref() {
                    if d == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for d in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for d in chars.by_ref() {
                    if prev == '*' && d == '/' {
                        break;
                    }
                    prev = d;
                }
            }
            '?' => count += 1,
            _ => {}
        }
    }
    count
}
