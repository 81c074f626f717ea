#![no_main]

use libfuzzer_sys::fuzz_target;
use sqlpool_driver::Dsn;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(dsn) = Dsn::parse(s) {
            // Re-parsing rendered output must not panic.
            let rendered = dsn.to_string();
            if !rendered.contains("***") {
                let _ = Dsn::parse(&rendered);
            }
        }
    }
});
