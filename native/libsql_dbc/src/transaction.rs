/// Auto-commit and transaction control
///
/// A connection starts in auto-commit mode. Switching it off begins a
/// transaction in the configured mode; from then on `commit` and `rollback`
/// end the current transaction and immediately begin the next one, so the
/// connection never drifts back to implicit auto-commit behind the caller.
use crate::connection::ConnectionInner;
use crate::error::{Error, Result};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

/// Begin a transaction in the connection's configured mode.
pub(crate) fn begin(conn: &ConnectionInner) -> Result<()> {
    let sql = conn.transaction_mode()?.begin_sql();
    conn.native.execute(sql).map_err(|e| {
        warn!(conn_id = %conn.native.id(), error = %e, "begin failed");
        e
    })?;
    debug!(conn_id = %conn.native.id(), sql, "transaction begun");
    Ok(())
}

pub(crate) fn set_auto_commit(conn: &ConnectionInner, auto_commit: bool) -> Result<()> {
    conn.check_open()?;
    if conn.is_auto_commit() == auto_commit {
        return Ok(());
    }

    if auto_commit {
        // Leaving manual mode commits whatever is pending
        if !conn.native.is_autocommit()? {
            conn.native.execute("COMMIT")?;
        }
    } else {
        begin(conn)?;
    }

    conn.auto_commit.store(auto_commit, Ordering::SeqCst);
    debug!(conn_id = %conn.native.id(), auto_commit, "auto-commit changed");
    Ok(())
}

pub(crate) fn commit(conn: &ConnectionInner) -> Result<()> {
    conn.check_open()?;
    if conn.is_auto_commit() {
        return Err(Error::usage("database in auto-commit mode"));
    }
    if !conn.native.is_autocommit()? {
        conn.native.execute("COMMIT")?;
    }
    debug!(conn_id = %conn.native.id(), "committed");
    begin(conn)
}

pub(crate) fn rollback(conn: &ConnectionInner) -> Result<()> {
    conn.check_open()?;
    if conn.is_auto_commit() {
        return Err(Error::usage("database in auto-commit mode"));
    }
    if !conn.native.is_autocommit()? {
        conn.native.execute("ROLLBACK")?;
    }
    debug!(conn_id = %conn.native.id(), "rolled back");
    begin(conn)
}

/// Re-open a transaction when manual-commit mode is on but the engine is back
/// in auto-commit (e.g. the caller ran COMMIT as plain SQL).
pub(crate) fn enforce_transaction_mode(conn: &ConnectionInner) -> Result<()> {
    if !conn.is_auto_commit() && conn.native.is_autocommit()? {
        begin(conn)?;
    }
    Ok(())
}
