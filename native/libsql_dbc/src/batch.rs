/// Batch execution
///
/// Two kinds of batch are supported:
/// - SQL batches: independent statements, each compiled, run and finalized
///   on its own
/// - parameter batches: one compiled statement run once per stored
///   parameter set
///
/// A batch stops at the first failing entry and reports the update counts of
/// the entries before it. Entries already applied are not rolled back; that
/// is left to the caller's transaction handling. Batches on one connection are
/// serialized with each other.
use crate::connection::ConnectionInner;
use crate::error::{Error, Result};
use crate::native::{NativeConnection, NativeStatement};
use crate::utils::{safe_lock, safe_lock_arc};
use libsql::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

fn batch_failure(index: usize, update_counts: Vec<i64>, source: Error) -> Error {
    warn!(index, applied = update_counts.len(), error = %source, "batch entry failed");
    Error::BatchUpdate {
        index,
        update_counts,
        source: Box::new(source),
    }
}

/// Run independent SQL statements in order, one update count per entry.
pub(crate) fn execute_sql_batch(conn: &ConnectionInner, entries: &[String]) -> Result<Vec<i64>> {
    let _serial = safe_lock(&conn.batch_lock, "execute_sql_batch batch_lock")?;
    debug!(conn_id = %conn.native.id(), entries = entries.len(), "executing SQL batch");

    let mut update_counts = Vec::with_capacity(entries.len());
    for (index, sql) in entries.iter().enumerate() {
        match execute_entry(&conn.native, sql) {
            Ok(count) => update_counts.push(count),
            Err(e) => return Err(batch_failure(index, update_counts, e)),
        }
    }

    Ok(update_counts)
}

/// Compile, run and finalize a single batch entry.
fn execute_entry(native: &NativeConnection, sql: &str) -> Result<i64> {
    let handle = native.prepare(sql)?;

    let result = native.statement(&handle).and_then(|shared| {
        let mut stmt = safe_lock_arc(&shared, "execute_entry stmt")?;
        if stmt.column_count() > 0 {
            return Err(Error::usage("batch entry returns results"));
        }
        stmt.execute_update().map(|count| count as i64)
    });

    native.finalize(&handle)?;
    result
}

/// Run one compiled statement once per parameter set.
pub(crate) fn execute_parameter_batch(
    conn: &ConnectionInner,
    stmt: &Arc<Mutex<NativeStatement>>,
    parameter_sets: &[Vec<Value>],
) -> Result<Vec<i64>> {
    let _serial = safe_lock(&conn.batch_lock, "execute_parameter_batch batch_lock")?;
    let mut stmt = safe_lock_arc(stmt, "execute_parameter_batch stmt")?;
    debug!(
        conn_id = %conn.native.id(),
        sets = parameter_sets.len(),
        sql = stmt.sql(),
        "executing parameter batch"
    );

    if stmt.column_count() > 0 && !parameter_sets.is_empty() {
        return Err(batch_failure(
            0,
            Vec::new(),
            Error::usage("query returns results"),
        ));
    }

    let mut update_counts = Vec::with_capacity(parameter_sets.len());
    for (index, params) in parameter_sets.iter().enumerate() {
        let outcome = stmt
            .bind_all(params)
            .and_then(|()| stmt.execute_update());
        match outcome {
            Ok(count) => update_counts.push(count as i64),
            Err(e) => {
                stmt.clear_bindings();
                return Err(batch_failure(index, update_counts, e));
            }
        }
    }

    stmt.clear_bindings();
    Ok(update_counts)
}
