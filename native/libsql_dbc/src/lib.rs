//! `libsql_dbc`: a synchronous relational client over embedded LibSQL databases
//!
//! This is the root module of the crate. It declares and organizes the
//! submodules that turn LibSQL's step-based statement API into connections,
//! prepared statements, forward-only cursors, transaction and savepoint
//! control, and catalog metadata.
//!
//! # Usage contract
//!
//! A [`Connection`] owns one native session. Every [`Statement`],
//! [`PreparedStatement`], [`ResultSet`] and [`DatabaseMetaData`] created from
//! it shares that session. Calls are blocking and run on the calling thread;
//! callers must serialize their use of one connection. Only batch execution is
//! serialized internally. Busy and locked conditions come back as retryable
//! errors ([`Error::is_retryable`]); no retry happens inside the crate.
//!
//! ```no_run
//! use libsql_dbc::{Connection, ConnectionConfig};
//!
//! # fn main() -> libsql_dbc::Result<()> {
//! let conn = Connection::open("app.db", ConnectionConfig::default())?;
//! let mut stmt = conn.create_statement()?;
//! stmt.execute_update("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let mut insert = conn.prepare_statement("INSERT INTO users (name) VALUES (?)")?;
//! insert.set_string(1, Some("Alice"))?;
//! insert.execute_update()?;
//!
//! let mut rs = stmt.execute_query("SELECT id, name FROM users")?;
//! while rs.next()? {
//!     println!("{} {:?}", rs.get_long(1)?, rs.get_string_by_name("name")?);
//! }
//! # Ok(())
//! # }
//! ```
pub mod affinity;
pub mod batch;
pub mod config;
pub mod connection;
pub mod constants;
pub mod cursor;
pub mod ddl;
pub mod decode;
pub mod error;
pub mod generated_keys;
pub mod metadata;
pub mod models;
pub mod native;
pub mod savepoint;
pub mod statement;
pub mod transaction;
pub mod utils;

// Re-export the public surface
pub use config::{ConnectionConfig, TransactionMode};
pub use connection::Connection;
pub use cursor::{CursorState, ResultSet, ResultSetMetaData};
pub use error::{Error, Result};
pub use libsql::Value;
pub use metadata::DatabaseMetaData;
pub use models::{ColumnMeta, ForeignKeyRule, Nullability, SqlType};
pub use savepoint::Savepoint;
pub use statement::{PreparedStatement, Statement};

#[cfg(test)]
mod tests;
