//! DSN parameters applied as SQLite pragmas.
//!
//! Every parameter becomes `PRAGMA key = value`, except `heap_limit`, which
//! is given in KiB and maps onto `PRAGMA soft_heap_limit` in bytes. Names
//! and values are interpolated into SQL, so both must be plain tokens.

use sqlpool_driver::{DriverError, Dsn};

/// Parameter translated to `soft_heap_limit`.
pub const HEAP_LIMIT_PARAM: &str = "heap_limit";

/// Build the pragma statements for `dsn`, sorted by parameter name.
pub fn pragma_statements(dsn: &Dsn) -> Result<Vec<String>, DriverError> {
    let mut params: Vec<(&str, &str)> = dsn.params().collect();
    params.sort_unstable();

    params
        .into_iter()
        .map(|(key, value)| {
            if key == HEAP_LIMIT_PARAM {
                let kib: i64 = value.parse().map_err(|_| {
                    DriverError::malformed("params", format!("heap_limit `{value}` is not a number"))
                })?;
                let bytes = kib.checked_mul(1024).ok_or_else(|| {
                    DriverError::malformed("params", format!("heap_limit `{value}` is too large"))
                })?;
                return Ok(format!("PRAGMA soft_heap_limit = {bytes}"));
            }

            if !is_identifier(key) {
                return Err(DriverError::malformed(
                    "params",
                    format!("`{key}` is not a valid pragma name"),
                ));
            }
            if !is_token(value) {
                return Err(DriverError::malformed(
                    "params",
                    format!("`{value}` is not a valid value for pragma `{key}`"),
                ));
            }
            Ok(format!("PRAGMA {key} = {value}"))
        })
        .collect()
}

fn is_identifier(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
