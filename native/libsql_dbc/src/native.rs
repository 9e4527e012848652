/// Handle-based execution layer over a LibSQL connection.
///
/// This module exposes the engine the way the rest of the crate consumes it:
/// - `prepare` compiles SQL text into a statement handle owned by the connection
/// - `bind`, `step`, `reset` and `clear_bindings` drive one handle row by row
/// - `finalize` destroys a handle; later use of it is a usage error
/// - column accessors read the row the handle is currently positioned on
/// - introspection helpers run catalog queries and drain them immediately
///
/// Every handle lives in the per-connection arena held by [`NativeConnection`].
/// Statements and cursors only keep a [`StmtHandle`] plus a shared reference to
/// the handle's state, so the connection decides when native state goes away.
///
/// Access to one connection must be serialized by the caller: nothing here
/// prevents two threads from stepping handles of the same connection at once.
use crate::constants::TOKIO_RUNTIME;
use crate::ddl;
use crate::decode;
use crate::error::{Error, Result};
use crate::models::{ColumnDecl, ColumnOrigin, Nullability, ValueType};
use crate::utils::{self, safe_lock, safe_lock_arc};
use bytes::Bytes;
use libsql::{Builder, Cipher, EncryptionConfig, Row, Rows, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Opaque reference to a prepared statement owned by a [`NativeConnection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StmtHandle(String);

impl StmtHandle {
    /// Arena key of the handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A row is available through the column accessors
    Row,
    /// The statement ran to completion
    Done,
}

const ORIGIN_COLUMNS_SQL: &str =
    r#"SELECT name, "notnull", pk FROM pragma_table_xinfo(?1, ?2)"#;

/// Column flags of a table some result column reads from.
struct OriginTable {
    autoincrement: bool,
    /// Lowercased column name to (`NOT NULL`, part of the primary key)
    columns: HashMap<String, (bool, bool)>,
}

/// One open engine session plus the arena of statement handles compiled on it.
pub struct NativeConnection {
    id: String,
    /// Kept alive for as long as the connection is open
    _db: libsql::Database,
    client: Arc<Mutex<libsql::Connection>>,
    statements: Mutex<HashMap<String, Arc<Mutex<NativeStatement>>>>,
}

impl std::fmt::Debug for NativeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl NativeConnection {
    /// Open a local database file (or `:memory:`).
    pub fn open_local(path: &str, encryption_key: Option<&str>) -> Result<Self> {
        let (db, conn) = TOKIO_RUNTIME.block_on(async {
            let mut builder = Builder::new_local(path);

            if let Some(key) = encryption_key {
                let config = EncryptionConfig {
                    cipher: Cipher::Aes256Cbc,
                    encryption_key: Bytes::from(key.to_string()),
                };
                builder = builder.encryption_config(config);
            }

            let db = builder.build().await?;
            let conn = db.connect()?;
            Ok::<_, Error>((db, conn))
        })?;

        let id = Uuid::new_v4().to_string();
        debug!(conn_id = %id, path, "opened native connection");

        Ok(NativeConnection {
            id,
            _db: db,
            client: Arc::new(Mutex::new(conn)),
            statements: Mutex::new(HashMap::new()),
        })
    }

    /// Unique id of this session, used in log events.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Compile `sql` and register the handle in the arena.
    ///
    /// Nothing is registered when compilation fails.
    #[allow(clippy::await_holding_lock)]
    pub fn prepare(&self, sql: &str) -> Result<StmtHandle> {
        let stmt = TOKIO_RUNTIME.block_on(async {
            let conn_guard = safe_lock_arc(&self.client, "prepare conn")?;
            conn_guard.prepare(sql).await.map_err(Error::from)
        });

        let stmt = match stmt {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "prepare failed");
                return Err(e);
            }
        };

        let mut native = NativeStatement::new(sql, stmt);
        self.describe_origins(&mut native.columns)?;
        let handle = StmtHandle(Uuid::new_v4().to_string());
        safe_lock(&self.statements, "prepare statements")?
            .insert(handle.0.clone(), Arc::new(Mutex::new(native)));

        debug!(conn_id = %self.id, stmt_id = %handle.0, sql, "prepared statement");
        Ok(handle)
    }

    /// Copy `NOT NULL` and `AUTOINCREMENT` from the source table of every
    /// column that reads a table column directly. Each table is looked up once.
    fn describe_origins(&self, columns: &mut [ColumnDecl]) -> Result<()> {
        let mut tables: HashMap<(String, String), OriginTable> = HashMap::new();

        for column in columns.iter_mut() {
            let Some(origin) = column.origin.as_ref() else {
                continue;
            };
            let key = (origin.schema.clone(), origin.table.clone());
            let table = match tables.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let (schema, name) = entry.key();
                    let table = self.origin_table(schema, name)?;
                    entry.insert(table)
                }
            };

            if let Some(&(not_null, pk)) = table.columns.get(&origin.column.to_lowercase()) {
                column.nullability = if not_null {
                    Nullability::NoNulls
                } else {
                    Nullability::Nullable
                };
                column.auto_increment = pk && table.autoincrement;
            }
        }
        Ok(())
    }

    fn origin_table(&self, schema: &str, table: &str) -> Result<OriginTable> {
        let definition_sql = format!(
            "SELECT sql FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
            utils::quote_identifier(schema)
        );
        let autoincrement = self
            .query_all(&definition_sql, vec![Value::Text(table.to_string())])?
            .first()
            .and_then(|row| row.first())
            .and_then(decode::to_string)
            .is_some_and(|sql| ddl::has_autoincrement(&sql));

        let columns = self
            .query_all(
                ORIGIN_COLUMNS_SQL,
                vec![Value::Text(table.to_string()), Value::Text(schema.to_string())],
            )?
            .iter()
            .filter_map(|row| {
                let name = decode::to_string(row.first()?)?;
                let not_null = row.get(1).is_some_and(|v| decode::to_i64(v) != 0);
                let pk = row.get(2).is_some_and(|v| decode::to_i64(v) > 0);
                Some((name.to_lowercase(), (not_null, pk)))
            })
            .collect();

        Ok(OriginTable {
            autoincrement,
            columns,
        })
    }

    /// Shared state behind a live handle.
    pub fn statement(&self, handle: &StmtHandle) -> Result<Arc<Mutex<NativeStatement>>> {
        safe_lock(&self.statements, "statement lookup")?
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| Error::usage("statement is finalized"))
    }

    /// Destroy a handle. Returns false when it was already gone.
    pub fn finalize(&self, handle: &StmtHandle) -> Result<bool> {
        let removed = safe_lock(&self.statements, "finalize statements")?.remove(&handle.0);

        match removed {
            Some(stmt) => {
                safe_lock_arc(&stmt, "finalize stmt")?.mark_finalized();
                debug!(conn_id = %self.id, stmt_id = %handle.0, "finalized statement");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Destroy every handle in the arena; used when the connection closes.
    pub fn finalize_all(&self) -> Result<usize> {
        let drained: Vec<_> = safe_lock(&self.statements, "finalize_all statements")?
            .drain()
            .collect();

        for (_, stmt) in &drained {
            safe_lock_arc(stmt, "finalize_all stmt")?.mark_finalized();
        }

        debug!(conn_id = %self.id, count = drained.len(), "finalized all statements");
        Ok(drained.len())
    }

    /// Number of handles currently alive in the arena.
    pub fn open_handle_count(&self) -> Result<usize> {
        Ok(safe_lock(&self.statements, "open_handle_count")?.len())
    }

    /// Run SQL that produces no rows and return the changed-row count.
    #[allow(clippy::await_holding_lock)]
    pub fn execute(&self, sql: &str) -> Result<u64> {
        TOKIO_RUNTIME.block_on(async {
            let conn_guard = safe_lock_arc(&self.client, "execute conn")?;
            conn_guard
                .execute(sql, Vec::<Value>::new())
                .await
                .map_err(Error::from)
        })
    }

    /// Run an introspection query and return all of its rows.
    #[allow(clippy::await_holding_lock)]
    pub fn query_all(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Vec<Value>>> {
        TOKIO_RUNTIME.block_on(async {
            let conn_guard = safe_lock_arc(&self.client, "query_all conn")?;
            utils::query_all(&conn_guard, sql, params).await
        })
    }

    /// Rowid of the most recent successful INSERT on this session.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        Ok(safe_lock_arc(&self.client, "last_insert_rowid conn")?.last_insert_rowid())
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> Result<u64> {
        Ok(safe_lock_arc(&self.client, "changes conn")?.changes())
    }

    /// Rows changed since the session was opened.
    pub fn total_changes(&self) -> Result<u64> {
        Ok(safe_lock_arc(&self.client, "total_changes conn")?.total_changes())
    }

    /// Whether the engine itself is outside an explicit transaction.
    pub fn is_autocommit(&self) -> Result<bool> {
        Ok(safe_lock_arc(&self.client, "is_autocommit conn")?.is_autocommit())
    }

    /// How long the engine retries on a locked database before reporting BUSY.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        safe_lock_arc(&self.client, "set_busy_timeout conn")?
            .busy_timeout(timeout)
            .map_err(Error::from)
    }

    /// Ask the engine to abort the running operation at its next opportunity.
    pub fn interrupt(&self) -> Result<()> {
        safe_lock_arc(&self.client, "interrupt conn")?
            .interrupt()
            .map_err(Error::from)
    }
}

/// State of one compiled statement: bindings, live row cursor and current row.
pub struct NativeStatement {
    sql: String,
    inner: libsql::Statement,
    columns: Vec<ColumnDecl>,
    params: Vec<Value>,
    rows: Option<Rows>,
    current: Option<Row>,
    done: bool,
    generation: u64,
    finalized: bool,
}

impl NativeStatement {
    fn new(sql: &str, inner: libsql::Statement) -> Self {
        let columns = inner
            .columns()
            .iter()
            .map(|c| {
                let mut decl = ColumnDecl::new(c.name(), c.decl_type().map(str::to_string));
                if let (Some(table), Some(column)) = (c.table_name(), c.origin_name()) {
                    decl.origin = Some(ColumnOrigin {
                        schema: c.database_name().unwrap_or("main").to_string(),
                        table: table.to_string(),
                        column: column.to_string(),
                    });
                }
                decl
            })
            .collect();
        let params = vec![Value::Null; inner.parameter_count()];

        NativeStatement {
            sql: sql.to_string(),
            inner,
            columns,
            params,
            rows: None,
            current: None,
            done: false,
            generation: 0,
            finalized: false,
        }
    }

    /// SQL text the handle was compiled from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Output column count of the compiled statement; zero means "no rows".
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Output column declarations, origins resolved at prepare time.
    pub fn columns(&self) -> &[ColumnDecl] {
        &self.columns
    }

    /// Number of `?` parameters the statement takes.
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Execution counter; bumped every time the statement starts over.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once the handle has left the arena.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn check_live(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::usage("statement is finalized"));
        }
        Ok(())
    }

    /// Bind `value` to the 1-based parameter `index`.
    pub fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        self.check_live()?;
        if index == 0 || index > self.params.len() {
            return Err(Error::usage(format!(
                "parameter index {index} out of range (statement has {} parameters)",
                self.params.len()
            )));
        }
        self.params[index - 1] = value;
        Ok(())
    }

    /// Replace every binding at once.
    pub fn bind_all(&mut self, values: &[Value]) -> Result<()> {
        self.check_live()?;
        if values.len() != self.params.len() {
            return Err(Error::usage(format!(
                "expected {} parameters, got {}",
                self.params.len(),
                values.len()
            )));
        }
        self.params = values.to_vec();
        Ok(())
    }

    /// Current bindings, one per parameter.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Rebind every parameter to NULL.
    pub fn clear_bindings(&mut self) {
        self.params.iter_mut().for_each(|p| *p = Value::Null);
    }

    /// Return the handle to its initial state. Bindings are kept.
    pub fn reset(&mut self) {
        self.rows = None;
        self.current = None;
        self.done = false;
        self.inner.reset();
    }

    /// Reset and start a new execution; returns the new generation.
    pub fn begin_execution(&mut self) -> Result<u64> {
        self.check_live()?;
        self.reset();
        self.generation += 1;
        Ok(self.generation)
    }

    /// Advance the handle by one row.
    ///
    /// Busy, locked and every other engine failure come back as errors; the
    /// handle is reset so it can be executed again.
    pub fn step(&mut self) -> Result<StepResult> {
        self.check_live()?;
        if self.done {
            return Ok(StepResult::Done);
        }

        if self.rows.is_none() {
            let params = self.params.clone();
            match TOKIO_RUNTIME.block_on(self.inner.query(params)) {
                Ok(rows) => self.rows = Some(rows),
                Err(e) => {
                    self.reset();
                    return Err(e.into());
                }
            }
        }

        let next = match self.rows.as_mut() {
            Some(rows) => TOKIO_RUNTIME.block_on(rows.next()),
            None => Ok(None),
        };

        match next {
            Ok(Some(row)) => {
                trace!(sql = %self.sql, "step: row");
                self.current = Some(row);
                Ok(StepResult::Row)
            }
            Ok(None) => {
                trace!(sql = %self.sql, "step: done");
                self.current = None;
                self.done = true;
                Ok(StepResult::Done)
            }
            Err(e) => {
                let err = Error::from(e);
                warn!(sql = %self.sql, error = %err, "step failed");
                self.reset();
                Err(err)
            }
        }
    }

    /// Run a statement that produces no rows with the current bindings.
    pub fn execute_update(&mut self) -> Result<u64> {
        self.begin_execution()?;
        let params = self.params.clone();
        let result = TOKIO_RUNTIME.block_on(self.inner.execute(params));
        self.inner.reset();
        match result {
            Ok(changed) => Ok(changed as u64),
            Err(e) => {
                let err = Error::from(e);
                warn!(sql = %self.sql, error = %err, "execute failed");
                Err(err)
            }
        }
    }

    /// True while a row is available to the column accessors.
    pub fn has_row(&self) -> bool {
        self.current.is_some()
    }

    /// Value of the 0-based column `index` in the current row.
    pub fn column_value(&self, index: usize) -> Result<Value> {
        self.check_live()?;
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| Error::usage("no current row"))?;
        if index >= self.columns.len() {
            return Err(Error::usage(format!(
                "column index {index} out of bounds (statement has {} columns)",
                self.columns.len()
            )));
        }
        Ok(row.get_value(index as i32)?)
    }

    /// Storage class of the 0-based column `index` in the current row.
    pub fn column_value_type(&self, index: usize) -> Result<ValueType> {
        self.column_value(index).map(|v| ValueType::of(&v))
    }

    /// Label of the 0-based column `index`.
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }

    /// Declared type of the 0-based column `index`; `None` for expressions.
    pub fn column_decl_type(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|c| c.decl_type.as_deref())
    }

    /// All values of the current row.
    pub fn row_values(&self) -> Result<Vec<Value>> {
        (0..self.columns.len())
            .map(|i| self.column_value(i))
            .collect()
    }

    fn mark_finalized(&mut self) {
        self.reset();
        self.finalized = true;
    }
}
