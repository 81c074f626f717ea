//! Prepared statements over rusqlite.

use sqlpool_driver::statement::check_param_index;
use sqlpool_driver::{DriverError, PreparedStatement, Value};

use crate::convert::to_sql;
use crate::driver::record_error;

/// A statement prepared on a [`SqliteDriver`](crate::SqliteDriver).
///
/// Bindings persist across executions until overwritten.
pub struct SqliteStatement<'conn> {
    stmt: rusqlite::Statement<'conn>,
    last_error: &'conn mut Option<String>,
    rows_changed: i64,
}

impl<'conn> SqliteStatement<'conn> {
    pub(crate) fn new(
        stmt: rusqlite::Statement<'conn>,
        last_error: &'conn mut Option<String>,
    ) -> Self {
        Self {
            stmt,
            last_error,
            rows_changed: 0,
        }
    }
}

impl PreparedStatement for SqliteStatement<'_> {
    fn param_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<(), DriverError> {
        check_param_index(index, self.stmt.parameter_count())?;
        self.stmt
            .raw_bind_parameter(index, to_sql(value))
            .map_err(|e| record_error(self.last_error, e))
    }

    fn execute(&mut self) -> Result<u64, DriverError> {
        match self.stmt.raw_execute() {
            Ok(changed) => {
                self.rows_changed = i64::try_from(changed).unwrap_or(i64::MAX);
                Ok(changed as u64)
            }
            Err(e) => Err(record_error(self.last_error, e)),
        }
    }

    fn rows_changed(&self) -> i64 {
        self.rows_changed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};
    use sqlpool_driver::{Connect, Driver, DriverOptions, Dsn};

    use crate::SqliteDriver;

    fn memory() -> SqliteDriver {
        let dsn = Dsn::parse("sqlite://:memory:").unwrap();
        let mut driver = SqliteDriver::open(&dsn, &DriverOptions::new()).unwrap();
        driver
            .execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, data BLOB, seen INTEGER)")
            .unwrap();
        driver
    }

    #[test]
    fn test_bind_and_reexecute() {
        let mut driver = memory();
        {
            let mut stmt = driver
                .prepare("INSERT INTO items (name, price) VALUES (?, ?)")
                .unwrap();
            assert_eq!(stmt.param_count(), 2);

            stmt.set_string(1, "apple").unwrap();
            stmt.set_double(2, 0.5).unwrap();
            assert_eq!(stmt.execute().unwrap(), 1);

            stmt.set_string(1, "pear").unwrap();
            assert_eq!(stmt.execute().unwrap(), 1);
            assert_eq!(stmt.rows_changed(), 1);
        }
        assert_eq!(driver.last_insert_id(), 2);

        let mut cursor = driver
            .query("SELECT name, price FROM items ORDER BY id")
            .unwrap();
        assert!(cursor.next_row().unwrap());
        assert_eq!(cursor.get_string(1).unwrap().as_deref(), Some("apple"));
        assert!(cursor.next_row().unwrap());
        assert_eq!(cursor.get_string(1).unwrap().as_deref(), Some("pear"));
        assert_eq!(cursor.get_f64(2).unwrap(), Some(0.5));
        assert!(!cursor.next_row().unwrap());
    }

    #[test]
    fn test_typed_setters_round_trip() {
        let mut driver = memory();
        let seen = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap();
        {
            let mut stmt = driver
                .prepare("INSERT INTO items (id, name, data, seen) VALUES (?, ?, ?, ?)")
                .unwrap();
            stmt.set_i64(1, 42).unwrap();
            stmt.set_null(2).unwrap();
            stmt.set_blob(3, &[0xde, 0xad]).unwrap();
            stmt.set_timestamp(4, seen).unwrap();
            stmt.execute().unwrap();
        }

        let mut cursor = driver
            .query("SELECT id, name, data, seen FROM items")
            .unwrap();
        assert!(cursor.next_row().unwrap());
        assert_eq!(cursor.get_i32(1).unwrap(), Some(42));
        assert_eq!(cursor.get_string(2).unwrap(), None);
        assert_eq!(cursor.get_blob(3).unwrap(), Some(vec![0xde, 0xad]));
        assert_eq!(cursor.get_timestamp(4).unwrap(), Some(seen));
    }

    #[test]
    fn test_parameter_index_out_of_range() {
        let mut driver = memory();
        let mut stmt = driver.prepare("SELECT ? + 1").unwrap();
        assert!(matches!(
            stmt.set_i32(0, 1),
            Err(sqlpool_driver::DriverError::ParameterIndex { index: 0, count: 1 })
        ));
        assert!(stmt.set_i32(2, 1).is_err());
    }

    #[test]
    fn test_constraint_violation_recorded() {
        let mut driver = memory();
        driver.execute("INSERT INTO items (id) VALUES (1)").unwrap();
        {
            let mut stmt = driver.prepare("INSERT INTO items (id) VALUES (?)").unwrap();
            stmt.set_i64(1, 1).unwrap();
            assert!(stmt.execute().unwrap_err().is_statement());
        }
        assert!(driver.last_error().unwrap().contains("UNIQUE"));
    }

    #[test]
    fn test_prepare_error() {
        let mut driver = memory();
        assert!(driver.prepare("SELEC nonsense").is_err());
        assert!(driver.last_error().is_some());
    }
}
