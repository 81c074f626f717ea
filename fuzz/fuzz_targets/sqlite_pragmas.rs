#![no_main]

use libfuzzer_sys::fuzz_target;
use sqlpool_driver::Dsn;
use sqlpool_sqlite::pragma::pragma_statements;

fuzz_target!(|data: &[u8]| {
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(dsn) = Dsn::parse(&format!("sqlite://:memory:?{query}")) else {
        return;
    };

    if let Ok(statements) = pragma_statements(&dsn) {
        for sql in statements {
            // Accepted parameters never smuggle extra statements.
            assert!(!sql.contains(';'));
            assert!(sql.starts_with("PRAGMA "));
        }
    }
});
