//! # sqlpool-driver
//!
//! The contract between the sqlpool connection pool and database backends.
//!
//! A backend implements [`Driver`] (the operations a leased connection
//! offers) and [`Connect`] (how to open one from a [`Dsn`]). The pool never
//! looks past these traits, which keeps it testable with an in-memory fake.
//!
//! ## Contents
//!
//! - [`Driver`] / [`Connect`]: the capability contract
//! - [`Dsn`]: connection descriptor parsing
//! - [`Value`], [`ResultCursor`], [`BufferedCursor`], [`PreparedStatement`]
//! - [`TransactionDepth`]: shared begin/commit/rollback bookkeeping
//!
//! ## Example
//!
//! ```rust
//! use sqlpool_driver::Dsn;
//!
//! let dsn = Dsn::parse("mysql://localhost:3306/test?user=root").unwrap();
//! assert_eq!(dsn.scheme(), "mysql");
//! assert_eq!(dsn.port(), Some(3306));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cursor;
pub mod driver;
pub mod dsn;
pub mod error;
pub mod statement;
pub mod transaction;
pub mod value;

pub use cursor::{BufferedCursor, ResultCursor};
pub use driver::{Connect, DEFAULT_EXECUTE_TIMEOUT, Driver, DriverOptions};
pub use dsn::Dsn;
pub use error::DriverError;
pub use statement::PreparedStatement;
pub use transaction::TransactionDepth;
pub use value::Value;
