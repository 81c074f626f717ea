//! # sqlpool-sqlite
//!
//! SQLite backend for sqlpool, built on `rusqlite` with the bundled engine.
//!
//! ## DSN
//!
//! ```text
//! sqlite:///absolute/path.db?synchronous=normal&heap_limit=8000
//! sqlite://relative.db
//! sqlite://:memory:
//! ```
//!
//! Every query parameter is applied as `PRAGMA key = value` when the
//! connection opens. `heap_limit` is the exception: it is read as KiB and
//! applied as `PRAGMA soft_heap_limit` in bytes.
//!
//! ## Example
//!
//! ```rust
//! use sqlpool_driver::{Connect, Driver, DriverOptions, Dsn};
//! use sqlpool_sqlite::SqliteDriver;
//!
//! let dsn = Dsn::parse("sqlite://:memory:").unwrap();
//! let mut conn = SqliteDriver::open(&dsn, &DriverOptions::new()).unwrap();
//! conn.execute("CREATE TABLE t (x INTEGER)").unwrap();
//! assert!(conn.ping());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod convert;
pub mod driver;
pub mod pragma;
pub mod statement;

pub use driver::SqliteDriver;
pub use statement::SqliteStatement;

/// Scheme this backend registers under.
pub const SCHEME: &str = "sqlite";
