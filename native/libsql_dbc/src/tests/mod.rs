//! Unit and integration tests for libsql_dbc
//!
//! This module organizes all tests into logical submodules that correspond to
//! the main library modules.

mod ddl_tests;
mod metadata_tests;
mod transaction_tests;
