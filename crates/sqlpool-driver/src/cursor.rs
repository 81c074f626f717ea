//! Query result cursors.

use chrono::{DateTime, Utc};

use crate::error::DriverError;
use crate::value::Value;

/// A forward-only cursor over the rows produced by a query.
///
/// A cursor borrows the driver it came from, so it is only usable until the
/// next call on that driver or until the driver returns to its pool.
/// Column indexes are 1-based.
pub trait ResultCursor {
    /// Number of columns in the result.
    fn column_count(&self) -> usize;

    /// Name of the column at `column`, if it exists.
    fn column_name(&self, column: usize) -> Option<&str>;

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    fn next_row(&mut self) -> Result<bool, DriverError>;

    /// Value of `column` in the current row.
    fn value(&self, column: usize) -> Result<Value, DriverError>;

    /// Find the 1-based index of a column by name (ASCII case-insensitive).
    fn column_index(&self, name: &str) -> Option<usize> {
        (1..=self.column_count()).find(|&i| {
            self.column_name(i)
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }

    /// Value of the named column in the current row.
    fn value_by_name(&self, name: &str) -> Result<Value, DriverError> {
        let column = self
            .column_index(name)
            .ok_or_else(|| DriverError::UnknownColumn(name.to_string()))?;
        self.value(column)
    }

    /// Read a column as text. NULL reads as `None`.
    fn get_string(&self, column: usize) -> Result<Option<String>, DriverError> {
        let value = self.value(column)?;
        if value.is_null() {
            return Ok(None);
        }
        value.to_text().map(Some).ok_or_else(|| value.mismatch("text"))
    }

    /// Read a column as an i32. NULL reads as `None`.
    fn get_i32(&self, column: usize) -> Result<Option<i32>, DriverError> {
        match self.get_i64(column)? {
            None => Ok(None),
            Some(v) => i32::try_from(v).map(Some).map_err(|_| DriverError::TypeMismatch {
                expected: "int32",
                found: "int64",
            }),
        }
    }

    /// Read a column as an i64. NULL reads as `None`.
    fn get_i64(&self, column: usize) -> Result<Option<i64>, DriverError> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(v)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| DriverError::TypeMismatch {
                    expected: "integer",
                    found: "text",
                }),
            other => Err(other.mismatch("integer")),
        }
    }

    /// Read a column as an f64. NULL reads as `None`.
    fn get_f64(&self, column: usize) -> Result<Option<f64>, DriverError> {
        let value = self.value(column)?;
        if value.is_null() {
            return Ok(None);
        }
        value.as_f64().map(Some).ok_or_else(|| value.mismatch("double"))
    }

    /// Read a column as raw bytes. NULL reads as `None`.
    fn get_blob(&self, column: usize) -> Result<Option<Vec<u8>>, DriverError> {
        let value = self.value(column)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_bytes()
            .map(|b| Some(b.to_vec()))
            .ok_or_else(|| value.mismatch("blob"))
    }

    /// Read a column as a UTC timestamp. NULL reads as `None`.
    fn get_timestamp(&self, column: usize) -> Result<Option<DateTime<Utc>>, DriverError> {
        let value = self.value(column)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_timestamp()
            .map(Some)
            .ok_or_else(|| value.mismatch("timestamp"))
    }
}

/// A cursor over rows that have already been fetched into memory.
///
/// Backends whose native cursors cannot outlive a single call fetch the
/// whole result and hand back one of these.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    // 0 = before the first row
    position: usize,
}

impl BufferedCursor {
    /// Create a cursor from column names and fetched rows.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: 0,
        }
    }

    /// Total number of rows held.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl ResultCursor for BufferedCursor {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, column: usize) -> Option<&str> {
        column
            .checked_sub(1)
            .and_then(|i| self.columns.get(i))
            .map(String::as_str)
    }

    fn next_row(&mut self) -> Result<bool, DriverError> {
        if self.position < self.rows.len() {
            self.position += 1;
            Ok(true)
        } else {
            self.position = self.rows.len() + 1;
            Ok(false)
        }
    }

    fn value(&self, column: usize) -> Result<Value, DriverError> {
        let row = self
            .position
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .ok_or(DriverError::NoRow)?;
        column
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .cloned()
            .ok_or(DriverError::ColumnIndex {
                index: column,
                count: self.columns.len(),
            })
    }
}
