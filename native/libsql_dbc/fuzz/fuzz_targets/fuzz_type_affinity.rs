#![no_main]
//! Fuzz test for declared-type handling
//!
//! Declared types are free text in SQLite. Classification, dimension parsing
//! and CAST label parsing must accept all of it.

use libsql_dbc::affinity::{
    base_type_name, cast_type, classify, parse_dimension, precision_and_scale,
};
use libsql_dbc::utils::is_insert_statement;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = classify(Some(text));
        let _ = parse_dimension(text);
        let _ = precision_and_scale(text);
        let _ = base_type_name(text);
        let _ = cast_type(text);
        let _ = is_insert_statement(text);
    }
});
