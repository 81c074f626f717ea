//! In-memory backend for exercising the pool without a database.
//!
//! A [`MockBackend`] is a shared handle: every [`MockDriver`] it opens
//! reports back to it, so a test can count opens and closes, inject connect
//! failures, flip every connection unhealthy, and inspect the SQL each
//! connection received.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sqlpool_driver::statement::{check_param_index, count_placeholders};
use sqlpool_driver::{
    BufferedCursor, Driver, DriverError, DriverOptions, Dsn, PreparedStatement, ResultCursor,
    TransactionDepth, Value,
};

/// Scheme the mock backend is conventionally registered under.
pub const MOCK_SCHEME: &str = "mock";

/// A DSN that resolves to the mock backend.
pub const MOCK_DSN: &str = "mock://localhost:7/test";

/// Canned response for a statement.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Result rows.
    Rows {
        /// Column names.
        columns: Vec<String>,
        /// Row values.
        rows: Vec<Vec<Value>>,
    },
    /// Rows affected by a statement.
    Affected(u64),
    /// Statement error.
    Error(String),
}

impl MockResponse {
    /// Create a single-column, single-row integer response.
    #[must_use]
    pub fn scalar_int(value: i64) -> Self {
        Self::rows(vec!["value"], vec![vec![Value::Integer(value)]])
    }

    /// Create a single-column, single-row text response.
    #[must_use]
    pub fn scalar_string(value: impl Into<String>) -> Self {
        Self::rows(vec!["value"], vec![vec![Value::Text(value.into())]])
    }

    /// Create a result-set response.
    #[must_use]
    pub fn rows(columns: Vec<&str>, rows: Vec<Vec<Value>>) -> Self {
        Self::Rows {
            columns: columns.into_iter().map(str::to_string).collect(),
            rows,
        }
    }

    /// Create a rows-affected response.
    #[must_use]
    pub fn affected(count: u64) -> Self {
        Self::Affected(count)
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

#[derive(Debug, Default)]
struct BackendState {
    next_driver_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    pings: AtomicUsize,
    failing_opens: AtomicUsize,
    refuse_all: AtomicBool,
    unhealthy: AtomicBool,
    open_delay_ms: AtomicU64,
    ping_delay_ms: AtomicU64,
    responses: Mutex<HashMap<String, MockResponse>>,
    executed: Mutex<Vec<(u64, String)>>,
}

/// Shared handle to the mock backend.
///
/// Cloning the handle shares the same counters and settings.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<BackendState>,
}

impl MockBackend {
    /// Create a backend that accepts every connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a backend with canned responses.
    #[must_use]
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    /// Constructor closure suitable for registering with a driver registry.
    pub fn constructor(
        &self,
    ) -> impl Fn(&Dsn, &DriverOptions) -> Result<Box<dyn Driver>, DriverError> + Send + Sync + 'static
    {
        let backend = self.clone();
        move |dsn: &Dsn, options: &DriverOptions| -> Result<Box<dyn Driver>, DriverError> {
            let driver: Box<dyn Driver> = Box::new(backend.open(dsn, options)?);
            Ok(driver)
        }
    }

    /// Open a connection directly.
    pub fn open(&self, dsn: &Dsn, options: &DriverOptions) -> Result<MockDriver, DriverError> {
        let delay = self.state.open_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        if self.state.refuse_all.load(Ordering::Relaxed) || self.take_failing_open() {
            tracing::debug!(dsn = %dsn, "mock backend refused connection");
            return Err(DriverError::Connect(format!(
                "mock backend refused connection to {}",
                dsn.database()
            )));
        }

        let id = self.state.next_driver_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.state.opened.fetch_add(1, Ordering::Relaxed);
        let live = self.state.live.fetch_add(1, Ordering::Relaxed) + 1;
        self.state.peak_live.fetch_max(live, Ordering::Relaxed);

        Ok(MockDriver {
            id,
            backend: Arc::clone(&self.state),
            closed: false,
            transaction: TransactionDepth::new(),
            timeout: options.execute_timeout,
            rows_changed: 0,
            last_error: None,
        })
    }

    fn take_failing_open(&self) -> bool {
        self.state
            .failing_opens
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.failing_opens.store(count, Ordering::Relaxed);
    }

    /// Make every open fail until turned off again.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse_all.store(refuse, Ordering::Relaxed);
    }

    /// Make every ping, on existing and future connections, fail or succeed.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state.unhealthy.store(unhealthy, Ordering::Relaxed);
    }

    /// Sleep for `delay` inside every open.
    pub fn set_open_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.open_delay_ms.store(millis, Ordering::Relaxed);
    }

    /// Sleep for `delay` inside every ping.
    pub fn set_ping_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.ping_delay_ms.store(millis, Ordering::Relaxed);
    }

    /// Register a canned response for `sql`.
    pub fn set_response(&self, sql: impl Into<String>, response: MockResponse) {
        self.state.responses.lock().insert(sql.into(), response);
    }

    /// Connections opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::Relaxed)
    }

    /// Connections closed so far.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::Relaxed)
    }

    /// Connections currently open.
    #[must_use]
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::Relaxed)
    }

    /// Highest number of simultaneously open connections seen.
    #[must_use]
    pub fn peak_live(&self) -> usize {
        self.state.peak_live.load(Ordering::Relaxed)
    }

    /// Pings received across all connections.
    #[must_use]
    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::Relaxed)
    }

    /// Every statement received, in order, with the id of the driver that
    /// ran it.
    #[must_use]
    pub fn executed(&self) -> Vec<(u64, String)> {
        self.state.executed.lock().clone()
    }

    /// Statements received by one driver.
    #[must_use]
    pub fn executed_by(&self, driver_id: u64) -> Vec<String> {
        self.state
            .executed
            .lock()
            .iter()
            .filter(|(id, _)| *id == driver_id)
            .map(|(_, sql)| sql.clone())
            .collect()
    }
}

/// Builder for [`MockBackend`].
#[derive(Debug, Default)]
pub struct MockBackendBuilder {
    responses: HashMap<String, MockResponse>,
    open_delay: Option<Duration>,
}

impl MockBackendBuilder {
    /// Add a canned response for `sql`.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into(), response);
        self
    }

    /// Sleep for `delay` inside every open.
    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Build the backend.
    #[must_use]
    pub fn build(self) -> MockBackend {
        let backend = MockBackend::new();
        *backend.state.responses.lock() = self.responses;
        if let Some(delay) = self.open_delay {
            backend.set_open_delay(delay);
        }
        backend
    }
}

/// One connection to the mock backend.
#[derive(Debug)]
pub struct MockDriver {
    id: u64,
    backend: Arc<BackendState>,
    closed: bool,
    transaction: TransactionDepth,
    timeout: Duration,
    rows_changed: i64,
    last_error: Option<String>,
}

impl MockDriver {
    /// Backend-assigned identifier of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn record(&self, sql: &str) {
        self.backend.executed.lock().push((self.id, sql.to_string()));
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn respond(&mut self, sql: &str) -> Result<MockResponse, DriverError> {
        self.ensure_open()?;
        self.record(sql);
        let response = self.backend.responses.lock().get(sql).cloned();
        match response {
            Some(MockResponse::Error(message)) => {
                self.last_error = Some(message.clone());
                Err(DriverError::Statement(message))
            }
            Some(response) => {
                self.last_error = None;
                Ok(response)
            }
            None => {
                self.last_error = None;
                Ok(MockResponse::Affected(0))
            }
        }
    }
}

impl Driver for MockDriver {
    fn ping(&mut self) -> bool {
        self.backend.pings.fetch_add(1, Ordering::Relaxed);
        let delay = self.backend.ping_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        !self.closed && !self.backend.unhealthy.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.backend.closed.fetch_add(1, Ordering::Relaxed);
            self.backend.live.fetch_sub(1, Ordering::Relaxed);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn begin_transaction(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.transaction.needs_begin() {
            self.record("BEGIN");
        }
        self.transaction.enter();
        true
    }

    fn commit(&mut self) -> bool {
        if !self.transaction.reset() {
            return false;
        }
        self.record("COMMIT");
        true
    }

    fn rollback(&mut self) -> bool {
        if !self.transaction.reset() {
            return false;
        }
        self.record("ROLLBACK");
        true
    }

    fn transaction_depth(&self) -> u32 {
        self.transaction.depth()
    }

    fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        let affected = match self.respond(sql)? {
            MockResponse::Affected(n) => n,
            MockResponse::Rows { rows, .. } => rows.len() as u64,
            MockResponse::Error(_) => 0,
        };
        self.rows_changed = i64::try_from(affected).unwrap_or(i64::MAX);
        Ok(affected)
    }

    fn query(&mut self, sql: &str) -> Result<Box<dyn ResultCursor + '_>, DriverError> {
        let cursor = match self.respond(sql)? {
            MockResponse::Rows { columns, rows } => BufferedCursor::new(columns, rows),
            MockResponse::Affected(_) | MockResponse::Error(_) => BufferedCursor::new(
                vec!["connection_id".to_string()],
                vec![vec![Value::Integer(i64::try_from(self.id).unwrap_or(i64::MAX))]],
            ),
        };
        Ok(Box::new(cursor))
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>, DriverError> {
        self.ensure_open()?;
        let count = count_placeholders(sql);
        Ok(Box::new(MockStatement {
            sql: sql.to_string(),
            params: vec![None; count],
            driver: self,
            rows_changed: 0,
        }))
    }

    fn last_insert_id(&self) -> i64 {
        0
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
    }
}

impl Drop for MockDriver {
    fn drop(&mut self) {
        self.close();
    }
}

/// Prepared statement on a [`MockDriver`].
///
/// Executing records the SQL with its bound values rendered in place of the
/// placeholders, in order.
#[derive(Debug)]
pub struct MockStatement<'a> {
    sql: String,
    params: Vec<Option<Value>>,
    driver: &'a mut MockDriver,
    rows_changed: i64,
}

impl PreparedStatement for MockStatement<'_> {
    fn param_count(&self) -> usize {
        self.params.len()
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<(), DriverError> {
        let slot = check_param_index(index, self.params.len())?;
        self.params[slot] = Some(value);
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, DriverError> {
        let rendered: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                p.as_ref()
                    .and_then(Value::to_text)
                    .unwrap_or_else(|| "NULL".to_string())
            })
            .collect();
        let sql = format!("{} [{}]", self.sql, rendered.join(", "));
        let affected = self.driver.execute(&sql)?;
        self.rows_changed = self.driver.rows_changed;
        Ok(affected)
    }

    fn rows_changed(&self) -> i64 {
        self.rows_changed
    }
}
