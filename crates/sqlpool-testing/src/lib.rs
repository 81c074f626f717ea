//! # sqlpool-testing
//!
//! Test infrastructure for the sqlpool workspace.
//!
//! ## Features
//!
//! - [`MockBackend`]: an in-memory backend with open/close counters,
//!   connect-failure and ping-failure injection, canned responses, and a log
//!   of every statement received
//! - [`TestFixture`]: table setup and teardown SQL
//!
//! ## Example
//!
//! ```rust
//! use sqlpool_driver::{Driver, DriverOptions, Dsn};
//! use sqlpool_testing::{MOCK_DSN, MockBackend, MockResponse};
//!
//! let backend = MockBackend::builder()
//!     .with_response("SELECT 1", MockResponse::scalar_int(1))
//!     .build();
//!
//! let open = backend.constructor();
//! let mut driver = open(&Dsn::parse(MOCK_DSN).unwrap(), &DriverOptions::new()).unwrap();
//! assert!(driver.ping());
//! assert_eq!(backend.opened(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_backend;

pub use fixtures::TestFixture;
pub use mock_backend::{
    MOCK_DSN, MOCK_SCHEME, MockBackend, MockBackendBuilder, MockDriver, MockResponse,
    MockStatement,
};
