//! DSN parsing edge cases and properties.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use sqlpool_driver::{DriverError, Dsn};

// ============================================================================
// Reference Strings
// ============================================================================

#[test]
fn test_reference_sqlite_dsn() {
    let dsn = Dsn::parse("sqlite:///tmp/x.db?synchronous=normal&heap_limit=8000").unwrap();
    assert_eq!(dsn.scheme(), "sqlite");
    assert_eq!(dsn.database(), "/tmp/x.db");

    let mut params: Vec<_> = dsn.params().collect();
    params.sort_unstable();
    assert_eq!(params, vec![("heap_limit", "8000"), ("synchronous", "normal")]);
}

#[test]
fn test_reference_mysql_dsn() {
    let dsn = Dsn::parse("mysql://localhost:3306/test?user=root&password=swordfish").unwrap();
    assert_eq!(dsn.scheme(), "mysql");
    assert_eq!(dsn.host(), Some("localhost"));
    assert_eq!(dsn.port(), Some(3306));
    assert_eq!(dsn.database(), "test");
    assert_eq!(dsn.param("user"), Some("root"));
    assert_eq!(dsn.param("password"), Some("swordfish"));
}

// ============================================================================
// Edge Cases
// ============================================================================

#[test]
fn test_no_query_string() {
    let dsn = Dsn::parse("postgresql://db.internal:5432/orders").unwrap();
    assert_eq!(dsn.param_count(), 0);
    assert_eq!(dsn.database(), "orders");
}

#[test]
fn test_ipv6_host() {
    let dsn = Dsn::parse("postgresql://[::1]:5432/orders").unwrap();
    assert_eq!(dsn.host(), Some("[::1]"));
    assert_eq!(dsn.port(), Some(5432));
}

#[test]
fn test_value_may_contain_equals() {
    let dsn = Dsn::parse("mysql://h:1/d?opts=a=b").unwrap();
    assert_eq!(dsn.param("opts"), Some("a=b"));
}

#[test]
fn test_trailing_whitespace_is_ignored() {
    let dsn = Dsn::parse("sqlite:///tmp/x.db\n").unwrap();
    assert_eq!(dsn.database(), "/tmp/x.db");
}

#[test]
fn test_invalid_scheme_character() {
    let err = Dsn::parse("my sql://h:1/d").unwrap_err();
    assert!(matches!(err, DriverError::MalformedDsn { field: "scheme", .. }));
}

#[test]
fn test_errors_render_field_name() {
    let err = Dsn::parse("mysql://localhost/test").unwrap_err();
    assert!(err.to_string().contains("port"));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_parse_never_panics(input in "\\PC*") {
        let _ = Dsn::parse(&input);
    }

    #[test]
    fn prop_scheme_is_lowercased(scheme in "[a-zA-Z][a-zA-Z0-9]{0,10}") {
        let dsn = Dsn::parse(&format!("{scheme}://host:1/db")).unwrap();
        prop_assert_eq!(dsn.scheme(), scheme.to_ascii_lowercase());
    }

    #[test]
    fn prop_last_parameter_wins(
        key in "[a-z_]{1,8}",
        first in "[a-zA-Z0-9]{1,8}",
        second in "[a-zA-Z0-9]{1,8}",
    ) {
        let dsn = Dsn::parse(&format!("mysql://h:1/d?{key}={first}&{key}={second}")).unwrap();
        prop_assert_eq!(dsn.param(&key), Some(second.as_str()));
        prop_assert_eq!(dsn.param_count(), 1);
    }

    #[test]
    fn prop_network_display_reparses(
        host in "[a-z][a-z0-9.-]{0,15}",
        port in 1u16..,
        db in "[a-zA-Z0-9_]{1,12}",
        user in "[a-z]{1,8}",
    ) {
        let dsn = Dsn::parse(&format!("mysql://{host}:{port}/{db}?user={user}")).unwrap();
        let reparsed = Dsn::parse(&dsn.to_string()).unwrap();
        prop_assert_eq!(reparsed, dsn);
    }
}
