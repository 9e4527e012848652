#![no_main]
//! Fuzz test for DDL constraint recovery
//!
//! Stored table definitions are scanned with regexes to recover constraint
//! names. Whatever the text, the scan must degrade to "no constraint" rather
//! than panic.

use libsql_dbc::ddl::{has_autoincrement, resolve_constraints};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(ddl) = std::str::from_utf8(data) {
        let _ = resolve_constraints(ddl);
        let _ = has_autoincrement(ddl);
    }
});
