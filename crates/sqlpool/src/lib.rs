//! # sqlpool
//!
//! A backend-agnostic connection pool for synchronous, multi-threaded
//! programs.
//!
//! The pool never knows which database it talks to: the DSN scheme selects
//! a constructor from a [`DriverRegistry`], and everything after that goes
//! through the [`Driver`] trait object.
//!
//! ## Features
//!
//! - Non-blocking [`Pool::acquire`] that fails fast at capacity, plus an
//!   opt-in bounded wait with [`Pool::acquire_timeout`]
//! - LIFO reuse of idle connections
//! - Scoped [`Lease`] handles that return their connection on drop
//! - Background reaper that evicts idle-expired and unresponsive connections
//!   without ever blocking acquirers on a probe
//! - Rollback of transactions left open when a lease is returned
//! - Status and metrics snapshots
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use sqlpool::Pool;
//!
//! let pool = Pool::builder()
//!     .dsn("sqlite:///var/lib/app/data.db?journal_mode=wal")
//!     .init_count(2)
//!     .max_count(8)
//!     .idle_timeout(Duration::from_secs(300))
//!     .build()?;
//!
//! let mut conn = pool.acquire()?;
//! let mut rows = conn.query("SELECT name FROM users")?;
//! while rows.next_row()? {
//!     if let Some(name) = rows.get_string(1)? {
//!         println!("{name}");
//!     }
//! }
//! drop(rows);
//! drop(conn); // connection returned to the pool
//!
//! pool.shutdown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lease;
pub mod lifecycle;
pub mod pool;
mod reaper;
pub mod registry;

pub use config::{
    DEFAULT_EXECUTE_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_INIT_COUNT, DEFAULT_MAX_COUNT,
    DEFAULT_SWEEP_INTERVAL, PoolConfig,
};
pub use error::PoolError;
pub use lease::Lease;
pub use lifecycle::{ConnectionMetadata, ConnectionState};
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus};
pub use reaper::SweepOutcome;
pub use registry::{DriverConstructor, DriverRegistry};

pub use sqlpool_driver as driver;
pub use sqlpool_driver::{
    Connect, Driver, DriverError, DriverOptions, Dsn, PreparedStatement, ResultCursor, Value,
};
