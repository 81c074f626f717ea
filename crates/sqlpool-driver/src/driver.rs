//! The capability contract every backend implements.

use std::time::Duration;

use crate::cursor::ResultCursor;
use crate::dsn::Dsn;
use crate::error::DriverError;
use crate::statement::PreparedStatement;

/// Default per-call timeout handed to drivers.
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Options a pool passes to a driver when opening it.
///
/// This struct is marked `#[non_exhaustive]`; build it with
/// [`DriverOptions::new()`] and the setter methods.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DriverOptions {
    /// Per-call timeout for statements (busy timeout, command timeout).
    pub execute_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
        }
    }
}

impl DriverOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }
}

/// One open connection to a backend.
///
/// Implementations are moved between threads by the pool but are only ever
/// used by one thread at a time, so `Send` is required and `Sync` is not.
pub trait Driver: Send {
    /// True iff the connection is still usable. Never errors: a failed probe
    /// is reported as `false` and the pool evicts the handle.
    fn ping(&mut self) -> bool;

    /// Release native resources. Safe to call more than once.
    fn close(&mut self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Start a transaction, or nest one level deeper if one is open.
    fn begin_transaction(&mut self) -> bool;

    /// Commit the open transaction. Returns `false` if none is open.
    fn commit(&mut self) -> bool;

    /// Roll back the open transaction. Returns `false` if none is open.
    fn rollback(&mut self) -> bool;

    /// Current transaction nesting depth.
    fn transaction_depth(&self) -> u32;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool {
        self.transaction_depth() > 0
    }

    /// Execute one or more statements that return no rows.
    fn execute(&mut self, sql: &str) -> Result<u64, DriverError>;

    /// Run a single query. The cursor is valid until the next call on this
    /// handle.
    fn query(&mut self, sql: &str) -> Result<Box<dyn ResultCursor + '_>, DriverError>;

    /// Prepare a statement with positional `?` placeholders.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>, DriverError>;

    /// Row id of the most recent insert.
    fn last_insert_id(&self) -> i64;

    /// Rows changed by the most recent [`execute`](Self::execute).
    fn rows_changed(&self) -> i64;

    /// Message of the most recent error on this handle, if any.
    fn last_error(&self) -> Option<&str>;

    /// Current per-call timeout.
    fn query_timeout(&self) -> Duration;

    /// Change the per-call timeout.
    fn set_query_timeout(&mut self, timeout: Duration);
}

/// Opening side of the contract: how a registry constructs a backend.
pub trait Connect: Driver + Sized + 'static {
    /// Open a new physical connection described by `dsn`.
    fn open(dsn: &Dsn, options: &DriverOptions) -> Result<Self, DriverError>;
}
