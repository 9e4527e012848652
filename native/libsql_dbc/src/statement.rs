/// Statement execution for libsql_dbc.
///
/// This module provides the two statement kinds of the client surface:
/// - [`Statement`] runs ad-hoc SQL text, compiling a fresh handle per call
/// - [`PreparedStatement`] compiles once and runs repeatedly with new bindings
///
/// Each statement owns at most one handle at a time. Whether an execution
/// produces rows is decided by the compiled statement's output column count,
/// never by looking at the SQL text. Re-executing or closing a statement
/// closes the cursor of its previous execution.
use crate::batch;
use crate::connection::ConnectionInner;
use crate::constants::GENERATED_KEYS_COLUMN;
use crate::cursor::{ResultSet, ResultSetMetaData};
use crate::error::{Error, Result};
use crate::generated_keys::GeneratedKeysLease;
use crate::native::{NativeStatement, StmtHandle};
use crate::transaction;
use crate::utils::{is_insert_statement, safe_lock_arc};
use libsql::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Handle ownership and execution bookkeeping shared by both statement kinds.
struct StatementCore {
    conn: Arc<ConnectionInner>,
    handle: Option<StmtHandle>,
    max_rows: u64,
    fetch_size: u32,
    update_count: i64,
    pending: Option<ResultSet>,
    last_was_insert: bool,
    keys_lease: Option<GeneratedKeysLease>,
    closed: bool,
}

impl StatementCore {
    fn new(conn: Arc<ConnectionInner>) -> Result<Self> {
        let fetch_size = conn.config()?.default_fetch_size;
        Ok(StatementCore {
            conn,
            handle: None,
            max_rows: 0,
            fetch_size,
            update_count: -1,
            pending: None,
            last_was_insert: false,
            keys_lease: None,
            closed: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::usage("statement is closed"));
        }
        self.conn.check_open()
    }

    fn stmt(&self) -> Result<Arc<Mutex<NativeStatement>>> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::usage("no statement has been executed"))?;
        self.conn.native.statement(handle)
    }

    fn column_count(&self) -> Result<usize> {
        let stmt = self.stmt()?;
        let count = safe_lock_arc(&stmt, "column_count stmt")?.column_count();
        Ok(count)
    }

    fn close_pending(&mut self) {
        if let Some(mut rs) = self.pending.take() {
            rs.close();
        }
    }

    /// Swap in a freshly compiled handle for `sql`, finalizing the old one.
    fn replace_sql(&mut self, sql: &str) -> Result<()> {
        self.close_pending();
        if let Some(old) = self.handle.take() {
            self.conn.native.finalize(&old)?;
        }
        self.last_was_insert = false;
        self.update_count = -1;
        self.handle = Some(self.conn.native.prepare(sql)?);
        Ok(())
    }

    /// Start a row-producing execution; the first row is stepped here.
    fn run_query(&mut self) -> Result<ResultSet> {
        self.close_pending();
        transaction::enforce_transaction_mode(&self.conn)?;

        let shared = self.stmt()?;
        let (generation, first, columns) = {
            let mut stmt = safe_lock_arc(&shared, "run_query stmt")?;
            let generation = stmt.begin_execution()?;
            let first = stmt.step()?;
            (generation, first, stmt.columns().to_vec())
        };

        self.update_count = -1;
        self.last_was_insert = false;
        Ok(ResultSet::live(
            shared,
            generation,
            first,
            columns,
            self.max_rows,
            self.fetch_size,
        ))
    }

    /// Run a statement that produces no rows.
    fn run_update(&mut self) -> Result<i64> {
        self.close_pending();
        transaction::enforce_transaction_mode(&self.conn)?;

        let shared = self.stmt()?;
        let (changed, sql_is_insert) = {
            let mut stmt = safe_lock_arc(&shared, "run_update stmt")?;
            let changed = stmt.execute_update()?;
            (changed, is_insert_statement(stmt.sql()))
        };

        self.update_count = changed as i64;
        self.last_was_insert = sql_is_insert;
        Ok(self.update_count)
    }

    /// Run whatever the handle holds. True when it produced a result set.
    fn run(&mut self) -> Result<bool> {
        if self.column_count()? > 0 {
            let rs = self.run_query()?;
            self.pending = Some(rs);
            Ok(true)
        } else {
            self.run_update()?;
            Ok(false)
        }
    }

    fn generated_keys(&mut self) -> Result<ResultSet> {
        self.check_open()?;
        if !self.conn.config()?.get_generated_keys {
            return Err(Error::usage("generated key retrieval is disabled"));
        }

        let lease = match self.keys_lease.take() {
            Some(lease) => lease,
            None => self.conn.generated_keys.acquire(),
        };

        let rows = if self.last_was_insert {
            vec![vec![lease.fetch()?]]
        } else {
            Vec::new()
        };
        let rs = ResultSet::from_rows(&[GENERATED_KEYS_COLUMN], rows).with_lease(lease.share());
        self.keys_lease = Some(lease);
        Ok(rs)
    }

    fn set_max_rows(&mut self, max_rows: u64) -> Result<()> {
        self.check_open()?;
        if max_rows != 0 && u64::from(self.fetch_size) > max_rows {
            self.fetch_size = 0;
        }
        self.max_rows = max_rows;
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.check_open()?;
        if self.max_rows != 0 && u64::from(rows) > self.max_rows {
            return Err(Error::usage(format!(
                "fetch size {rows} exceeds the row limit {}",
                self.max_rows
            )));
        }
        self.fetch_size = rows;
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        self.check_open()?;
        self.conn.native.interrupt()
    }

    /// The connection's busy timeout doubles as the query timeout.
    fn query_timeout(&self) -> Result<Duration> {
        self.check_open()?;
        Ok(self.conn.config()?.busy_timeout)
    }

    fn set_query_timeout(&self, timeout: Duration) -> Result<()> {
        self.check_open()?;
        self.conn.set_busy_timeout(timeout)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.close_pending();
        if let Some(mut lease) = self.keys_lease.take() {
            lease.release();
        }
        if let Some(handle) = self.handle.take() {
            self.conn.native.finalize(&handle)?;
        }
        Ok(())
    }
}

impl Drop for StatementCore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Ad-hoc SQL execution with an optional queue of SQL batch entries.
pub struct Statement {
    core: StatementCore,
    batch: Vec<String>,
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("handle", &self.core.handle)
            .field("batch_len", &self.batch.len())
            .field("closed", &self.core.closed)
            .finish_non_exhaustive()
    }
}

impl Statement {
    pub(crate) fn new(conn: Arc<ConnectionInner>) -> Result<Self> {
        Ok(Statement {
            core: StatementCore::new(conn)?,
            batch: Vec::new(),
        })
    }

    /// Run `sql`. Returns true when it produced a result set, which is then
    /// available from [`Statement::result_set`]; otherwise the update count is.
    pub fn execute(&mut self, sql: &str) -> Result<bool> {
        self.core.check_open()?;
        self.core.replace_sql(sql)?;
        self.core.run()
    }

    /// Run a row-producing statement and return its cursor.
    pub fn execute_query(&mut self, sql: &str) -> Result<ResultSet> {
        self.core.check_open()?;
        self.core.replace_sql(sql)?;
        if self.core.column_count()? == 0 {
            return Err(Error::usage("Query does not return results"));
        }
        self.core.run_query()
    }

    /// Run a statement that produces no rows and return the changed-row count.
    pub fn execute_update(&mut self, sql: &str) -> Result<i64> {
        self.core.check_open()?;
        self.core.replace_sql(sql)?;
        if self.core.column_count()? > 0 {
            return Err(Error::usage("Query returns results"));
        }
        self.core.run_update()
    }

    /// Queue `sql` for the next [`Statement::execute_batch`].
    pub fn add_batch(&mut self, sql: &str) -> Result<()> {
        self.core.check_open()?;
        self.batch.push(sql.to_string());
        Ok(())
    }

    pub fn clear_batch(&mut self) {
        self.batch.clear();
    }

    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Run the queued SQL entries. The queue is empty afterwards whether or not
    /// every entry succeeded.
    pub fn execute_batch(&mut self) -> Result<Vec<i64>> {
        let entries = std::mem::take(&mut self.batch);
        self.core.check_open()?;
        self.core.close_pending();
        transaction::enforce_transaction_mode(&self.core.conn)?;

        let counts = batch::execute_sql_batch(&self.core.conn, &entries)?;
        self.core.last_was_insert = entries.last().is_some_and(|sql| is_insert_statement(sql));
        self.core.update_count = -1;
        Ok(counts)
    }

    /// Take the cursor produced by the last `execute`, if it produced one.
    pub fn result_set(&mut self) -> Option<ResultSet> {
        self.core.pending.take()
    }

    /// Changed-row count of the last execution; -1 when it produced rows.
    pub fn update_count(&self) -> i64 {
        self.core.update_count
    }

    /// Keys generated by the last INSERT/REPLACE; empty after anything else.
    pub fn generated_keys(&mut self) -> Result<ResultSet> {
        self.core.generated_keys()
    }

    pub fn max_rows(&self) -> u64 {
        self.core.max_rows
    }

    pub fn set_max_rows(&mut self, max_rows: u64) -> Result<()> {
        self.core.set_max_rows(max_rows)
    }

    pub fn fetch_size(&self) -> u32 {
        self.core.fetch_size
    }

    pub fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.core.set_fetch_size(rows)
    }

    /// Interrupt the connection this statement runs on.
    pub fn cancel(&self) -> Result<()> {
        self.core.cancel()
    }

    pub fn query_timeout(&self) -> Result<Duration> {
        self.core.query_timeout()
    }

    /// Wait up to `timeout` on a locked database. This is connection-wide:
    /// every statement of the connection shares the setting.
    pub fn set_query_timeout(&self, timeout: Duration) -> Result<()> {
        self.core.set_query_timeout(timeout)
    }

    pub fn close(&mut self) -> Result<()> {
        self.batch.clear();
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed
    }
}

/// A statement compiled once and executed with changing parameter bindings.
pub struct PreparedStatement {
    core: StatementCore,
    sql: String,
    batch: Vec<Vec<Value>>,
}

impl std::fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql)
            .field("handle", &self.core.handle)
            .field("batch_len", &self.batch.len())
            .field("closed", &self.core.closed)
            .finish_non_exhaustive()
    }
}

impl PreparedStatement {
    pub(crate) fn new(conn: Arc<ConnectionInner>, sql: &str) -> Result<Self> {
        let mut core = StatementCore::new(conn)?;
        core.replace_sql(sql)?;
        debug!(sql, "prepared statement created");
        Ok(PreparedStatement {
            core,
            sql: sql.to_string(),
            batch: Vec::new(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_count(&self) -> Result<usize> {
        self.core.check_open()?;
        let stmt = self.core.stmt()?;
        let count = safe_lock_arc(&stmt, "parameter_count stmt")?.parameter_count();
        Ok(count)
    }

    /// Bind `value` to the 1-based parameter `index`.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        self.core.check_open()?;
        let stmt = self.core.stmt()?;
        let mut stmt = safe_lock_arc(&stmt, "set_value stmt")?;
        stmt.bind(index, value)
    }

    pub fn set_null(&mut self, index: usize) -> Result<()> {
        self.set_value(index, Value::Null)
    }

    pub fn set_bool(&mut self, index: usize, value: bool) -> Result<()> {
        self.set_value(index, Value::Integer(i64::from(value)))
    }

    pub fn set_int(&mut self, index: usize, value: i32) -> Result<()> {
        self.set_value(index, Value::Integer(i64::from(value)))
    }

    pub fn set_long(&mut self, index: usize, value: i64) -> Result<()> {
        self.set_value(index, Value::Integer(value))
    }

    pub fn set_double(&mut self, index: usize, value: f64) -> Result<()> {
        self.set_value(index, Value::Real(value))
    }

    /// Bind text; `None` binds NULL.
    pub fn set_string(&mut self, index: usize, value: Option<&str>) -> Result<()> {
        self.set_value(index, value.map_or(Value::Null, |v| Value::Text(v.to_string())))
    }

    /// Bind bytes; `None` binds NULL.
    pub fn set_bytes(&mut self, index: usize, value: Option<&[u8]>) -> Result<()> {
        self.set_value(index, value.map_or(Value::Null, |v| Value::Blob(v.to_vec())))
    }

    /// Reset every binding to NULL.
    pub fn clear_parameters(&mut self) -> Result<()> {
        self.core.check_open()?;
        let stmt = self.core.stmt()?;
        safe_lock_arc(&stmt, "clear_parameters stmt")?.clear_bindings();
        Ok(())
    }

    /// Run with the current bindings. True when a result set was produced.
    pub fn execute(&mut self) -> Result<bool> {
        self.core.check_open()?;
        self.core.run()
    }

    pub fn execute_query(&mut self) -> Result<ResultSet> {
        self.core.check_open()?;
        if self.core.column_count()? == 0 {
            return Err(Error::usage("Query does not return results"));
        }
        self.core.run_query()
    }

    pub fn execute_update(&mut self) -> Result<i64> {
        self.core.check_open()?;
        if self.core.column_count()? > 0 {
            return Err(Error::usage("Query returns results"));
        }
        self.core.run_update()
    }

    /// Queue a copy of the current bindings for the next batch execution.
    pub fn add_batch(&mut self) -> Result<()> {
        self.core.check_open()?;
        let stmt = self.core.stmt()?;
        let params = safe_lock_arc(&stmt, "add_batch stmt")?.params().to_vec();
        self.batch.push(params);
        Ok(())
    }

    pub fn clear_batch(&mut self) {
        self.batch.clear();
    }

    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Run the statement once per queued parameter set. The queue is empty
    /// afterwards whether or not every set succeeded.
    pub fn execute_batch(&mut self) -> Result<Vec<i64>> {
        let parameter_sets = std::mem::take(&mut self.batch);
        self.core.check_open()?;
        self.core.close_pending();
        transaction::enforce_transaction_mode(&self.core.conn)?;

        let stmt = self.core.stmt()?;
        let counts = batch::execute_parameter_batch(&self.core.conn, &stmt, &parameter_sets)?;
        self.core.last_was_insert = is_insert_statement(&self.sql);
        self.core.update_count = -1;
        Ok(counts)
    }

    /// Column metadata known before execution (declared types only).
    pub fn metadata(&self) -> Result<ResultSetMetaData> {
        self.core.check_open()?;
        let stmt = self.core.stmt()?;
        let columns = safe_lock_arc(&stmt, "metadata stmt")?.columns().to_vec();
        Ok(ResultSetMetaData::new(&columns, None))
    }

    pub fn result_set(&mut self) -> Option<ResultSet> {
        self.core.pending.take()
    }

    pub fn update_count(&self) -> i64 {
        self.core.update_count
    }

    pub fn generated_keys(&mut self) -> Result<ResultSet> {
        self.core.generated_keys()
    }

    pub fn max_rows(&self) -> u64 {
        self.core.max_rows
    }

    pub fn set_max_rows(&mut self, max_rows: u64) -> Result<()> {
        self.core.set_max_rows(max_rows)
    }

    pub fn fetch_size(&self) -> u32 {
        self.core.fetch_size
    }

    pub fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.core.set_fetch_size(rows)
    }

    pub fn cancel(&self) -> Result<()> {
        self.core.cancel()
    }

    pub fn query_timeout(&self) -> Result<Duration> {
        self.core.query_timeout()
    }

    /// Connection-wide, like [`Statement::set_query_timeout`].
    pub fn set_query_timeout(&self, timeout: Duration) -> Result<()> {
        self.core.set_query_timeout(timeout)
    }

    pub fn close(&mut self) -> Result<()> {
        self.batch.clear();
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed
    }
}
