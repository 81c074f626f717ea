#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlpool_driver::Dsn;

#[derive(Debug, Arbitrary)]
struct Parts<'a> {
    scheme: &'a str,
    host: &'a str,
    port: u16,
    database: &'a str,
    params: Vec<(&'a str, &'a str)>,
}

fuzz_target!(|parts: Parts<'_>| {
    let mut input = format!(
        "{}://{}:{}/{}",
        parts.scheme, parts.host, parts.port, parts.database
    );
    for (i, (key, value)) in parts.params.iter().enumerate() {
        input.push(if i == 0 { '?' } else { '&' });
        input.push_str(key);
        input.push('=');
        input.push_str(value);
    }

    if let Ok(dsn) = Dsn::parse(&input) {
        assert_eq!(dsn.scheme(), dsn.scheme().to_ascii_lowercase());
        assert!(!dsn.scheme().is_empty());
    }
});
