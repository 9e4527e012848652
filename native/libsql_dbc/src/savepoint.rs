/// Savepoint management for nested transactions
///
/// Savepoints are addressed by name, exactly like the engine's savepoint
/// stack: rolling back to a savepoint keeps that savepoint usable and cancels
/// every savepoint set after it. Every savepoint gets an ordinal id from a
/// per-connection counter that only grows.
use crate::connection::ConnectionInner;
use crate::constants::SAVEPOINT_NAME_PREFIX;
use crate::decode::validate_savepoint_name;
use crate::error::{Error, Result};
use crate::transaction;
use std::sync::atomic::Ordering;
use tracing::debug;

/// A savepoint created on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    id: u64,
    name: Option<String>,
}

impl Savepoint {
    /// Ordinal id, unique and increasing for the lifetime of the connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name given by the caller, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name the savepoint is known by to the engine.
    pub fn sql_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{SAVEPOINT_NAME_PREFIX}{}", self.id),
        }
    }
}

/// Create a savepoint. Auto-commit is switched off first when it is on.
pub(crate) fn set_savepoint(conn: &ConnectionInner, name: Option<&str>) -> Result<Savepoint> {
    conn.check_open()?;
    if let Some(name) = name {
        validate_savepoint_name(name)?;
    }

    if conn.is_auto_commit() {
        transaction::set_auto_commit(conn, false)?;
    }

    let id = conn.savepoint_seq.fetch_add(1, Ordering::SeqCst) + 1;
    let savepoint = Savepoint {
        id,
        name: name.map(str::to_string),
    };

    let sql_name = savepoint.sql_name();
    conn.native.execute(&format!("SAVEPOINT {sql_name}"))?;
    debug!(conn_id = %conn.native.id(), savepoint = %sql_name, id, "savepoint created");
    Ok(savepoint)
}

/// Release a savepoint, folding its changes into the enclosing transaction.
pub(crate) fn release_savepoint(conn: &ConnectionInner, savepoint: &Savepoint) -> Result<()> {
    conn.check_open()?;
    if conn.is_auto_commit() {
        return Err(Error::usage("database in auto-commit mode"));
    }

    let sql_name = savepoint.sql_name();
    conn.native
        .execute(&format!("RELEASE SAVEPOINT {sql_name}"))?;
    debug!(conn_id = %conn.native.id(), savepoint = %sql_name, "savepoint released");
    Ok(())
}

/// Undo everything done since the savepoint was set. The savepoint stays
/// active and can be rolled back to or released again.
pub(crate) fn rollback_to_savepoint(conn: &ConnectionInner, savepoint: &Savepoint) -> Result<()> {
    conn.check_open()?;
    if conn.is_auto_commit() {
        return Err(Error::usage("database in auto-commit mode"));
    }

    let sql_name = savepoint.sql_name();
    conn.native
        .execute(&format!("ROLLBACK TO SAVEPOINT {sql_name}"))?;
    debug!(conn_id = %conn.native.id(), savepoint = %sql_name, "rolled back to savepoint");
    Ok(())
}
