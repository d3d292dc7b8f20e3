//! Fuzz target for connection URI parsing.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_uri_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_core::{ConnectionUri, Driver, DriverError};
use tessera_postgres::PgDriver;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing never panics, only returns errors.
        let _ = ConnectionUri::scheme_of(input);
        if let Err(err) = ConnectionUri::parse(input) {
            assert!(matches!(err, DriverError::InvalidUri { .. }));
        }
        let _ = PgDriver::new().get_connect_options(input);
    }
});
