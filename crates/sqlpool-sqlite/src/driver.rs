//! SQLite connection implementing the sqlpool driver contract.

use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use sqlpool_driver::{
    BufferedCursor, Connect, Driver, DriverError, DriverOptions, Dsn, PreparedStatement,
    ResultCursor, TransactionDepth,
};

use crate::convert::from_sql;
use crate::pragma::pragma_statements;
use crate::statement::SqliteStatement;

/// One SQLite connection.
///
/// The DSN location is handed to SQLite as the database path, so
/// `sqlite://:memory:` opens a private in-memory database per connection.
/// The execute timeout doubles as SQLite's busy timeout.
#[derive(Debug)]
pub struct SqliteDriver {
    conn: Option<Connection>,
    path: String,
    transaction: TransactionDepth,
    timeout: Duration,
    rows_changed: i64,
    last_error: Option<String>,
}

impl SqliteDriver {
    /// Database path this connection was opened with.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn connection(&self) -> Result<&Connection, DriverError> {
        self.conn.as_ref().ok_or(DriverError::Closed)
    }

    fn record(&mut self, err: rusqlite::Error) -> DriverError {
        record_error(&mut self.last_error, err)
    }

    fn run(&mut self, sql: &str) -> bool {
        let result = match self.connection() {
            Ok(conn) => conn.execute_batch(sql),
            Err(_) => return false,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                let err = self.record(e);
                tracing::debug!(path = %self.path, sql, error = %err, "transaction statement failed");
                false
            }
        }
    }
}

pub(crate) fn record_error(slot: &mut Option<String>, err: rusqlite::Error) -> DriverError {
    let message = err.to_string();
    *slot = Some(message.clone());
    DriverError::Statement(message)
}

fn fetch_all(conn: &Connection, sql: &str) -> rusqlite::Result<BufferedCursor> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();

    let mut rows = stmt.query([])?;
    let mut fetched = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_sql(row.get_ref(i)?));
        }
        fetched.push(values);
    }
    Ok(BufferedCursor::new(columns, fetched))
}

fn apply_pragma(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    // Some pragmas echo their new value as a row.
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    while rows.next()?.is_some() {}
    Ok(())
}

impl Connect for SqliteDriver {
    fn open(dsn: &Dsn, options: &DriverOptions) -> Result<Self, DriverError> {
        let path = dsn.database().to_string();
        let pragmas = pragma_statements(dsn)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&path, flags)
            .map_err(|e| DriverError::Connect(format!("{path}: {e}")))?;

        conn.busy_timeout(options.execute_timeout)
            .map_err(|e| DriverError::Connect(format!("{path}: {e}")))?;
        for pragma in &pragmas {
            apply_pragma(&conn, pragma)
                .map_err(|e| DriverError::Connect(format!("{path}: unable to set `{pragma}`: {e}")))?;
        }

        tracing::debug!(path = %path, pragmas = pragmas.len(), "opened sqlite connection");

        Ok(Self {
            conn: Some(conn),
            path,
            transaction: TransactionDepth::new(),
            timeout: options.execute_timeout,
            rows_changed: 0,
            last_error: None,
        })
    }
}

impl Driver for SqliteDriver {
    fn ping(&mut self) -> bool {
        match self.connection() {
            Ok(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            Err(_) => false,
        }
    }

    fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Err((_, e)) = conn.close() {
            tracing::warn!(path = %self.path, error = %e, "sqlite connection did not close cleanly");
        }
        self.transaction.reset();
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn begin_transaction(&mut self) -> bool {
        if self.conn.is_none() {
            return false;
        }
        if self.transaction.needs_begin() && !self.run("BEGIN TRANSACTION") {
            return false;
        }
        self.transaction.enter();
        true
    }

    fn commit(&mut self) -> bool {
        if !self.transaction.is_active() {
            return false;
        }
        if !self.run("COMMIT TRANSACTION") {
            return false;
        }
        self.transaction.reset()
    }

    fn rollback(&mut self) -> bool {
        if !self.transaction.is_active() {
            return false;
        }
        let rolled_back = self.run("ROLLBACK TRANSACTION");
        // SQLite leaves no transaction behind after a failed ROLLBACK either.
        self.transaction.reset();
        rolled_back
    }

    fn transaction_depth(&self) -> u32 {
        self.transaction.depth()
    }

    fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        let conn = self.connection()?;
        match conn.execute_batch(sql) {
            Ok(()) => {
                let changed = conn.changes();
                self.rows_changed = i64::try_from(changed).unwrap_or(i64::MAX);
                Ok(changed)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    fn query(&mut self, sql: &str) -> Result<Box<dyn ResultCursor + '_>, DriverError> {
        let conn = self.connection()?;
        match fetch_all(conn, sql) {
            Ok(cursor) => Ok(Box::new(cursor)),
            Err(e) => Err(self.record(e)),
        }
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>, DriverError> {
        let Self {
            conn, last_error, ..
        } = self;
        let conn = conn.as_ref().ok_or(DriverError::Closed)?;
        match conn.prepare(sql) {
            Ok(stmt) => Ok(Box::new(SqliteStatement::new(stmt, last_error))),
            Err(e) => Err(record_error(last_error, e)),
        }
    }

    fn last_insert_id(&self) -> i64 {
        self.conn
            .as_ref()
            .map_or(0, Connection::last_insert_rowid)
    }

    fn rows_changed(&self) -> i64 {
        self.rows_changed
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn query_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_query_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        if let Some(conn) = &self.conn {
            if let Err(e) = conn.busy_timeout(timeout) {
                tracing::warn!(path = %self.path, error = %e, "failed to update busy timeout");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn memory() -> SqliteDriver {
        let dsn = Dsn::parse("sqlite://:memory:").unwrap();
        SqliteDriver::open(&dsn, &DriverOptions::new()).unwrap()
    }

    #[test]
    fn test_ping_and_close() {
        let mut driver = memory();
        assert!(driver.ping());
        driver.close();
        driver.close();
        assert!(driver.is_closed());
        assert!(!driver.ping());
        assert!(matches!(driver.execute("SELECT 1"), Err(DriverError::Closed)));
    }

    #[test]
    fn test_execute_reports_changes() {
        let mut driver = memory();
        driver
            .execute("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2), (3);")
            .unwrap();
        assert_eq!(driver.rows_changed(), 3);
        assert_eq!(driver.last_insert_id(), 3);

        assert_eq!(driver.execute("DELETE FROM t WHERE x > 1").unwrap(), 2);
    }

    #[test]
    fn test_statement_error_is_recorded() {
        let mut driver = memory();
        let err = driver.execute("SELECT * FROM missing").unwrap_err();
        assert!(err.is_statement());
        assert!(driver.last_error().unwrap().contains("missing"));
    }

    #[test]
    fn test_nested_transaction_depth() {
        let mut driver = memory();
        driver.execute("CREATE TABLE t (x INTEGER)").unwrap();

        assert!(driver.begin_transaction());
        assert!(driver.begin_transaction());
        assert_eq!(driver.transaction_depth(), 2);
        driver.execute("INSERT INTO t VALUES (1)").unwrap();
        assert!(driver.rollback());
        assert_eq!(driver.transaction_depth(), 0);
        assert!(!driver.rollback());
        assert!(!driver.commit());

        let mut cursor = driver.query("SELECT COUNT(*) FROM t").unwrap();
        assert!(cursor.next_row().unwrap());
        assert_eq!(cursor.get_i64(1).unwrap(), Some(0));
    }

    #[test]
    fn test_busy_timeout_follows_options() {
        let dsn = Dsn::parse("sqlite://:memory:").unwrap();
        let options = DriverOptions::new().execute_timeout(Duration::from_millis(250));
        let mut driver = SqliteDriver::open(&dsn, &options).unwrap();
        assert_eq!(driver.query_timeout(), Duration::from_millis(250));

        driver.set_query_timeout(Duration::from_secs(1));
        assert_eq!(driver.query_timeout(), Duration::from_secs(1));
    }
}
