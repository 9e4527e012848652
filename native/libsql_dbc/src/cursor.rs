/// Forward-only result cursors.
///
/// A [`ResultSet`] reads rows either from a live statement handle or from rows
/// materialised up front (catalog queries, generated keys). In both cases the
/// first row is already available when the cursor is created, so the first
/// `next()` only marks the cursor positioned; every later `next()` advances the
/// source by one row.
///
/// The cursor closes itself as soon as the source runs dry or the row limit is
/// reached, resetting the statement handle right away so it stops holding the
/// engine's read lock. A failed step closes the cursor too: the error is
/// returned once and rows already read are never produced again. Busy and
/// locked failures are retried by executing the query again. Columns are
/// addressed by 1-based ordinal or by case-insensitive label.
use crate::affinity;
use crate::decode;
use crate::error::{Error, Result};
use crate::generated_keys::GeneratedKeysLease;
use crate::models::{ColumnDecl, ColumnMeta, Nullability, SqlType, ValueType};
use crate::native::{NativeStatement, StepResult};
use crate::utils::safe_lock_arc;
use libsql::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Position of a cursor in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, `next()` not called yet
    Unstarted,
    /// On row `n` (1-based)
    Positioned(u64),
    /// Ran past the last row (or the row limit) and released its source
    Exhausted,
    /// Closed explicitly, or invalidated by its statement
    Closed,
}

struct LiveRows {
    stmt: Arc<Mutex<NativeStatement>>,
    generation: u64,
}

enum RowSource {
    Live(LiveRows),
    Materialized {
        pending: VecDeque<Vec<Value>>,
        current: Option<Vec<Value>>,
    },
    Released,
}

pub struct ResultSet {
    columns: Vec<ColumnDecl>,
    source: RowSource,
    state: CursorState,
    empty: bool,
    max_rows: u64,
    fetch_size: u32,
    was_null: bool,
    steps: u64,
    name_cache: HashMap<String, usize>,
    lease: Option<GeneratedKeysLease>,
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("max_rows", &self.max_rows)
            .finish_non_exhaustive()
    }
}

impl ResultSet {
    /// Cursor over a statement that has already been stepped once.
    ///
    /// `first` is the outcome of that step.
    pub(crate) fn live(
        stmt: Arc<Mutex<NativeStatement>>,
        generation: u64,
        first: StepResult,
        columns: Vec<ColumnDecl>,
        max_rows: u64,
        fetch_size: u32,
    ) -> Self {
        let mut rs = ResultSet {
            columns,
            source: RowSource::Live(LiveRows { stmt, generation }),
            state: CursorState::Unstarted,
            empty: first == StepResult::Done,
            max_rows,
            fetch_size,
            was_null: false,
            steps: 0,
            name_cache: HashMap::new(),
            lease: None,
        };
        if rs.empty {
            // Nothing to read: let go of the handle straight away
            rs.release_source();
        }
        rs
    }

    /// Cursor over rows computed in advance.
    pub fn materialized(columns: Vec<ColumnDecl>, rows: Vec<Vec<Value>>) -> Self {
        let mut pending: VecDeque<Vec<Value>> = rows.into();
        let current = pending.pop_front();
        ResultSet {
            columns,
            empty: current.is_none(),
            source: RowSource::Materialized { pending, current },
            state: CursorState::Unstarted,
            max_rows: 0,
            fetch_size: 0,
            was_null: false,
            steps: 0,
            name_cache: HashMap::new(),
            lease: None,
        }
    }

    /// Materialised cursor with untyped columns named `names`.
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let columns = names.iter().map(|n| ColumnDecl::untyped(*n)).collect();
        ResultSet::materialized(columns, rows)
    }

    pub(crate) fn with_lease(mut self, lease: GeneratedKeysLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, CursorState::Exhausted | CursorState::Closed)
    }

    /// Current 1-based row number; 0 when not on a row.
    pub fn row(&self) -> u64 {
        match self.state {
            CursorState::Positioned(n) => n,
            _ => 0,
        }
    }

    /// Engine steps issued by this cursor (the first row is not counted).
    pub fn steps_issued(&self) -> u64 {
        self.steps
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn max_rows(&self) -> u64 {
        self.max_rows
    }

    /// Limit the rows this cursor yields; 0 means no limit.
    pub fn set_max_rows(&mut self, max_rows: u64) {
        self.max_rows = max_rows;
    }

    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    /// Set the fetch-size hint. It may not exceed a non-zero row limit.
    pub fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        if self.max_rows != 0 && u64::from(rows) > self.max_rows {
            return Err(Error::usage(format!(
                "fetch size {rows} exceeds the row limit {}",
                self.max_rows
            )));
        }
        self.fetch_size = rows;
        Ok(())
    }

    /// Advance to the next row. Returns false once the rows are used up, at
    /// which point the cursor is already closed.
    pub fn next(&mut self) -> Result<bool> {
        match self.state {
            CursorState::Exhausted | CursorState::Closed => Ok(false),
            CursorState::Unstarted => {
                if self.empty {
                    self.exhaust();
                    return Ok(false);
                }
                self.state = CursorState::Positioned(1);
                Ok(true)
            }
            CursorState::Positioned(n) => {
                if self.max_rows != 0 && n >= self.max_rows {
                    debug!(max_rows = self.max_rows, "row limit reached");
                    self.exhaust();
                    return Ok(false);
                }
                let advanced = match self.advance_source() {
                    Ok(advanced) => advanced,
                    Err(e) => {
                        // The handle restarts from the top after a failed step
                        warn!(row = n, error = %e, "cursor step failed, closing");
                        self.close();
                        return Err(e);
                    }
                };
                if advanced {
                    self.state = CursorState::Positioned(n + 1);
                    Ok(true)
                } else {
                    // An invalidated cursor stays closed
                    if self.state != CursorState::Closed {
                        self.exhaust();
                    }
                    Ok(false)
                }
            }
        }
    }

    fn advance_source(&mut self) -> Result<bool> {
        match &mut self.source {
            RowSource::Live(live) => {
                let mut stmt = safe_lock_arc(&live.stmt, "cursor next")?;
                if stmt.is_finalized() || stmt.generation() != live.generation {
                    drop(stmt);
                    self.invalidate();
                    return Ok(false);
                }
                self.steps += 1;
                let step = stmt.step()?;
                trace!(?step, "cursor step");
                Ok(step == StepResult::Row)
            }
            RowSource::Materialized { pending, current } => {
                *current = pending.pop_front();
                Ok(current.is_some())
            }
            RowSource::Released => Ok(false),
        }
    }

    /// Close the cursor and release its rows.
    pub fn close(&mut self) {
        if self.state != CursorState::Closed {
            self.state = CursorState::Closed;
            self.release_source();
        }
    }

    fn exhaust(&mut self) {
        self.state = CursorState::Exhausted;
        self.release_source();
    }

    fn invalidate(&mut self) {
        self.state = CursorState::Closed;
        self.source = RowSource::Released;
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
    }

    fn release_source(&mut self) {
        let source = std::mem::replace(&mut self.source, RowSource::Released);
        if let RowSource::Live(live) = source {
            if let Ok(mut stmt) = safe_lock_arc(&live.stmt, "cursor release") {
                if !stmt.is_finalized() && stmt.generation() == live.generation {
                    stmt.reset();
                }
            }
        }
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
    }

    fn check_column(&self, column: usize) -> Result<usize> {
        if column == 0 || column > self.columns.len() {
            return Err(Error::usage(format!(
                "column {column} out of bounds [1,{}]",
                self.columns.len()
            )));
        }
        Ok(column - 1)
    }

    /// Raw value of the 1-based `column` in the current row.
    pub fn get_value(&mut self, column: usize) -> Result<Value> {
        let index = self.check_column(column)?;
        match self.state {
            CursorState::Positioned(_) => {}
            CursorState::Unstarted => {
                return Err(Error::usage("ResultSet not positioned: call next() first"));
            }
            CursorState::Exhausted | CursorState::Closed => {
                return Err(Error::usage("ResultSet is closed"));
            }
        }

        let value = match &self.source {
            RowSource::Live(live) => {
                let stmt = safe_lock_arc(&live.stmt, "cursor get_value")?;
                if stmt.is_finalized() || stmt.generation() != live.generation {
                    return Err(Error::usage("ResultSet is closed"));
                }
                stmt.column_value(index)?
            }
            RowSource::Materialized { current, .. } => current
                .as_ref()
                .and_then(|row| row.get(index).cloned())
                .unwrap_or(Value::Null),
            RowSource::Released => return Err(Error::usage("ResultSet is closed")),
        };

        self.was_null = matches!(value, Value::Null);
        Ok(value)
    }

    /// Whether the last value read was NULL.
    pub fn was_null(&self) -> bool {
        self.was_null
    }

    pub fn get_string(&mut self, column: usize) -> Result<Option<String>> {
        self.get_value(column).map(|v| decode::to_string(&v))
    }

    pub fn get_int(&mut self, column: usize) -> Result<i32> {
        self.get_value(column).map(|v| decode::to_i32(&v))
    }

    pub fn get_long(&mut self, column: usize) -> Result<i64> {
        self.get_value(column).map(|v| decode::to_i64(&v))
    }

    pub fn get_double(&mut self, column: usize) -> Result<f64> {
        self.get_value(column).map(|v| decode::to_f64(&v))
    }

    pub fn get_bool(&mut self, column: usize) -> Result<bool> {
        self.get_value(column).map(|v| decode::to_bool(&v))
    }

    pub fn get_bytes(&mut self, column: usize) -> Result<Option<Vec<u8>>> {
        self.get_value(column).map(|v| decode::to_bytes(&v))
    }

    /// 1-based ordinal of the column labelled `label`, ignoring case.
    ///
    /// Lookups are cached for the lifetime of the cursor.
    pub fn find_column(&mut self, label: &str) -> Result<usize> {
        let key = label.to_lowercase();
        if let Some(&column) = self.name_cache.get(&key) {
            return Ok(column);
        }

        let column = self
            .columns
            .iter()
            .position(|c| c.name.to_lowercase() == key)
            .map(|i| i + 1)
            .ok_or_else(|| Error::usage(format!("no such column: '{label}'")))?;

        self.name_cache.insert(key, column);
        Ok(column)
    }

    pub fn get_value_by_name(&mut self, label: &str) -> Result<Value> {
        let column = self.find_column(label)?;
        self.get_value(column)
    }

    pub fn get_string_by_name(&mut self, label: &str) -> Result<Option<String>> {
        let column = self.find_column(label)?;
        self.get_string(column)
    }

    pub fn get_int_by_name(&mut self, label: &str) -> Result<i32> {
        let column = self.find_column(label)?;
        self.get_int(column)
    }

    pub fn get_long_by_name(&mut self, label: &str) -> Result<i64> {
        let column = self.find_column(label)?;
        self.get_long(column)
    }

    pub fn get_double_by_name(&mut self, label: &str) -> Result<f64> {
        let column = self.find_column(label)?;
        self.get_double(column)
    }

    pub fn get_bool_by_name(&mut self, label: &str) -> Result<bool> {
        let column = self.find_column(label)?;
        self.get_bool(column)
    }

    pub fn get_bytes_by_name(&mut self, label: &str) -> Result<Option<Vec<u8>>> {
        let column = self.find_column(label)?;
        self.get_bytes(column)
    }

    /// Column metadata, typed against the row the cursor currently holds.
    pub fn metadata(&self) -> Result<ResultSetMetaData> {
        let row = match &self.source {
            RowSource::Live(live) => {
                let stmt = safe_lock_arc(&live.stmt, "cursor metadata")?;
                if !stmt.is_finalized() && stmt.generation() == live.generation && stmt.has_row()
                {
                    Some(stmt.row_values()?)
                } else {
                    None
                }
            }
            RowSource::Materialized { current, .. } => current.clone(),
            RowSource::Released => None,
        };
        Ok(ResultSetMetaData::new(&self.columns, row.as_deref()))
    }

    /// Drain the remaining rows into memory; the cursor ends up exhausted.
    pub fn collect_rows(&mut self) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        while self.next()? {
            let row = (1..=self.columns.len())
                .map(|c| self.get_value(c))
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        self.release_source();
    }
}

/// Column descriptions of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSetMetaData {
    columns: Vec<ColumnMeta>,
}

impl ResultSetMetaData {
    /// Resolve column metadata from declarations and, when available, a sample row.
    pub fn new(columns: &[ColumnDecl], row: Option<&[Value]>) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = row.and_then(|r| r.get(i));
                resolve_column(column, value)
            })
            .collect();
        ResultSetMetaData { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Metadata of the 1-based `column`.
    pub fn column(&self, column: usize) -> Result<&ColumnMeta> {
        column
            .checked_sub(1)
            .and_then(|i| self.columns.get(i))
            .ok_or_else(|| {
                Error::usage(format!(
                    "column {column} out of bounds [1,{}]",
                    self.columns.len()
                ))
            })
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_name(&self, column: usize) -> Result<&str> {
        Ok(&self.column(column)?.name)
    }

    pub fn column_label(&self, column: usize) -> Result<&str> {
        self.column_name(column)
    }

    pub fn column_decl_type(&self, column: usize) -> Result<Option<&str>> {
        Ok(self.column(column)?.decl_type.as_deref())
    }

    /// Type code of the column.
    pub fn column_type(&self, column: usize) -> Result<i32> {
        Ok(self.column(column)?.sql_type.code())
    }

    pub fn sql_type(&self, column: usize) -> Result<SqlType> {
        Ok(self.column(column)?.sql_type)
    }

    pub fn column_type_name(&self, column: usize) -> Result<&str> {
        Ok(&self.column(column)?.type_name)
    }

    pub fn precision(&self, column: usize) -> Result<u32> {
        Ok(self.column(column)?.precision)
    }

    pub fn scale(&self, column: usize) -> Result<u32> {
        Ok(self.column(column)?.scale)
    }

    pub fn is_nullable(&self, column: usize) -> Result<Nullability> {
        Ok(self.column(column)?.nullability)
    }

    pub fn is_auto_increment(&self, column: usize) -> Result<bool> {
        Ok(self.column(column)?.auto_increment)
    }

    pub fn is_signed(&self, column: usize) -> Result<bool> {
        let name = self.column_type_name(column)?;
        Ok(matches!(name, "NUMERIC" | "INTEGER" | "REAL"))
    }
}

fn resolve_column(column: &ColumnDecl, value: Option<&Value>) -> ColumnMeta {
    let decl_type = column
        .decl_type
        .clone()
        .or_else(|| affinity::cast_type(&column.name));
    let value_type = value.map_or(ValueType::Null, ValueType::of);
    let type_name = affinity::type_name(decl_type.as_deref(), value_type);
    let int_value = match value {
        Some(Value::Integer(i)) => Some(*i),
        _ => None,
    };
    let sql_type = affinity::resolve_sql_type(&type_name, value_type, int_value);
    let (precision, scale) = decl_type
        .as_deref()
        .map_or((0, 0), affinity::precision_and_scale);

    ColumnMeta {
        name: column.name.clone(),
        decl_type,
        sql_type,
        type_name,
        precision,
        scale,
        nullability: column.nullability,
        auto_increment: column.auto_increment,
    }
}
