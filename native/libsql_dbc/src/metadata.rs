/// Catalog metadata for libsql_dbc
///
/// The engine only offers a handful of introspection pragmas. This module
/// combines them with the stored table definitions (see [`crate::ddl`]) and the
/// affinity rules (see [`crate::affinity`]) to answer the standard catalog
/// queries: tables, columns, primary keys, imported/exported keys, indexes and
/// type info.
///
/// Every call returns a fully materialised [`ResultSet`] with a fixed column
/// layout. Introspection queries are drained and dropped before the next one
/// runs, so no statement handle outlives the call, error or not.
use crate::affinity::{self, TypeCategory};
use crate::connection::ConnectionInner;
use crate::constants::*;
use crate::cursor::ResultSet;
use crate::ddl;
use crate::decode;
use crate::error::{Error, Result, SQLITE_ERROR};
use crate::models::{ForeignKeyInfo, ForeignKeyRule, PrimaryKeyInfo};
use crate::utils::text_or_null;
use libsql::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const TABLES_SQL: &str = r"SELECT NULL, NULL, NAME, TYPE, NULL, NULL, NULL, NULL, NULL, NULL
FROM (
    SELECT 'sqlite_schema' AS NAME, 'SYSTEM TABLE' AS TYPE
    UNION ALL
    SELECT name AS NAME, UPPER(type) AS TYPE FROM sqlite_schema
    WHERE name NOT LIKE 'sqlite\_%' ESCAPE '\' AND UPPER(type) IN ('TABLE', 'VIEW')
    UNION ALL
    SELECT name AS NAME, 'GLOBAL TEMPORARY' AS TYPE FROM sqlite_temp_master
    UNION ALL
    SELECT name AS NAME, 'SYSTEM TABLE' AS TYPE FROM sqlite_schema
    WHERE name LIKE 'sqlite\_%' ESCAPE '\'
)
WHERE NAME LIKE ?1 ESCAPE '\'";

const TABLE_DEFINITION_SQL: &str =
    "SELECT sql FROM sqlite_schema WHERE lower(name) = lower(?1) AND type IN ('table', 'view')";

const USER_TABLES_SQL: &str = r"SELECT name FROM sqlite_schema
WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\' ORDER BY name";

const TABLE_XINFO_SQL: &str = r#"SELECT cid, name, type, "notnull", dflt_value, pk, hidden
FROM pragma_table_xinfo(?1)
WHERE upper(name) LIKE upper(?2) ESCAPE '\'"#;

const PRIMARY_KEY_COLUMNS_SQL: &str =
    "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk";

const FOREIGN_KEY_LIST_SQL: &str = r#"SELECT id, seq, "table", "from", "to", on_update, on_delete
FROM pragma_foreign_key_list(?1)"#;

const INDEX_LIST_SQL: &str = r#"SELECT name, "unique" FROM pragma_index_list(?1)"#;

const INDEX_INFO_SQL: &str = "SELECT seqno, name FROM pragma_index_info(?1) ORDER BY seqno";

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn cell(row: &[Value], index: usize) -> Option<String> {
    row.get(index).and_then(decode::to_string)
}

fn cell_i64(row: &[Value], index: usize) -> i64 {
    row.get(index).map_or(0, decode::to_i64)
}

/// Catalog queries against one connection.
pub struct DatabaseMetaData {
    conn: Arc<ConnectionInner>,
}

impl std::fmt::Debug for DatabaseMetaData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseMetaData")
            .field("conn_id", &self.conn.native.id())
            .finish_non_exhaustive()
    }
}

impl DatabaseMetaData {
    pub(crate) fn new(conn: Arc<ConnectionInner>) -> Self {
        DatabaseMetaData { conn }
    }

    fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Vec<Value>>> {
        self.conn.check_open()?;
        self.conn.native.query_all(sql, params)
    }

    pub fn database_product_name(&self) -> &'static str {
        "SQLite"
    }

    /// Version of the engine, as reported by `sqlite_version()`.
    pub fn database_product_version(&self) -> Result<String> {
        let rows = self.query("SELECT sqlite_version()", Vec::new())?;
        rows.first()
            .and_then(|row| cell(row, 0))
            .ok_or_else(|| Error::engine(SQLITE_ERROR, "sqlite_version() returned no row"))
    }

    pub fn driver_name(&self) -> &'static str {
        env!("CARGO_PKG_NAME")
    }

    pub fn driver_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Escape character understood by every name pattern argument.
    pub fn search_string_escape(&self) -> &'static str {
        "\\"
    }

    /// Tables and views whose name matches the `LIKE` pattern (`None` matches
    /// everything), optionally restricted to some table types.
    pub fn get_tables(&self, pattern: Option<&str>, types: Option<&[&str]>) -> Result<ResultSet> {
        let pattern = pattern.filter(|p| !p.is_empty()).unwrap_or("%");
        let mut sql = TABLES_SQL.to_string();
        let mut params = vec![text(pattern)];

        if let Some(types) = types.filter(|t| !t.is_empty()) {
            let placeholders: Vec<String> = (0..types.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            sql.push_str(&format!(" AND TYPE IN ({})", placeholders.join(", ")));
            params.extend(types.iter().map(|t| text(&t.to_uppercase())));
        }
        sql.push_str(" ORDER BY TYPE, NAME");

        let rows = self.query(&sql, params)?;
        debug!(pattern, tables = rows.len(), "get_tables");
        Ok(ResultSet::from_rows(&TABLES_COLUMNS, rows))
    }

    pub fn get_table_types(&self) -> Result<ResultSet> {
        self.conn.check_open()?;
        let rows = TABLE_TYPES.iter().map(|t| vec![text(t)]).collect();
        Ok(ResultSet::from_rows(&TABLE_TYPES_COLUMNS, rows))
    }

    /// The engine has no schemas; always empty.
    pub fn get_schemas(&self) -> Result<ResultSet> {
        self.conn.check_open()?;
        Ok(ResultSet::from_rows(&SCHEMAS_COLUMNS, Vec::new()))
    }

    /// The engine has no catalogs; always empty.
    pub fn get_catalogs(&self) -> Result<ResultSet> {
        self.conn.check_open()?;
        Ok(ResultSet::from_rows(&CATALOGS_COLUMNS, Vec::new()))
    }

    /// Names of the tables matching `pattern`, in `get_tables` order.
    fn table_names(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let mut tables = self.get_tables(pattern, None)?;
        let mut names = Vec::new();
        while tables.next()? {
            if let Some(name) = tables.get_string(3)? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Stored `CREATE` text of a table or view.
    fn table_definition(&self, table: &str) -> Result<String> {
        if table.trim().is_empty() {
            return Err(Error::InvalidTableName(table.to_string()));
        }
        let rows = self.query(TABLE_DEFINITION_SQL, vec![text(table)])?;
        match rows.first() {
            Some(row) => Ok(cell(row, 0).unwrap_or_default()),
            None => Err(Error::TableNotFound(table.to_string())),
        }
    }

    /// Columns of the tables matching `table_pattern` whose names match
    /// `column_pattern`, ordered by table then ordinal position.
    pub fn get_columns(
        &self,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<ResultSet> {
        let column_pattern = column_pattern.unwrap_or("%");
        let mut rows: Vec<(String, i64, Vec<Value>)> = Vec::new();

        for table in self.table_names(table_pattern)? {
            let autoincrement = match self.table_definition(&table) {
                Ok(definition) => ddl::has_autoincrement(&definition),
                Err(Error::TableNotFound(_)) => false,
                Err(e) => return Err(e),
            };

            let columns = self.query(TABLE_XINFO_SQL, vec![text(&table), text(column_pattern)])?;
            for column in columns {
                let ordinal = cell_i64(&column, 0) + 1;
                let row = column_row(&table, ordinal, &column, autoincrement);
                rows.push((table.clone(), ordinal, row));
            }
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        debug!(?table_pattern, column_pattern, columns = rows.len(), "get_columns");
        Ok(ResultSet::from_rows(
            &COLUMNS_COLUMNS,
            rows.into_iter().map(|(_, _, row)| row).collect(),
        ))
    }

    /// Primary key of `table`: from a `PRIMARY KEY (...)` table constraint when
    /// there is one, otherwise from the per-column key flags.
    pub fn find_primary_key(&self, table: &str) -> Result<PrimaryKeyInfo> {
        if table.trim().is_empty() {
            return Err(Error::InvalidTableName(table.to_string()));
        }
        let lower = table.to_lowercase();
        if lower == "sqlite_schema" || lower == "sqlite_master" {
            return Ok(PrimaryKeyInfo::default());
        }

        let definition = self.table_definition(table)?;
        if let Some(pk) = ddl::primary_key_clause(&definition) {
            return Ok(pk);
        }

        let columns = self
            .query(PRIMARY_KEY_COLUMNS_SQL, vec![text(table)])?
            .iter()
            .filter_map(|row| cell(row, 0))
            .collect();
        Ok(PrimaryKeyInfo {
            name: None,
            columns,
        })
    }

    /// One row per primary-key column, ordered by column name. `KEY_SEQ`
    /// follows declaration order.
    pub fn get_primary_keys(&self, table: &str) -> Result<ResultSet> {
        let pk = self.find_primary_key(table)?;

        let mut keyed: Vec<(String, i64)> = pk
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.clone(), i as i64 + 1))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let rows = keyed
            .into_iter()
            .map(|(column, seq)| {
                vec![
                    Value::Null,
                    Value::Null,
                    text(table),
                    Value::Text(column),
                    Value::Integer(seq),
                    text_or_null(pk.name.as_deref()),
                ]
            })
            .collect();
        Ok(ResultSet::from_rows(&PRIMARY_KEYS_COLUMNS, rows))
    }

    /// Foreign-key column pairs declared on `table`, named from its definition.
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let definition = self.table_definition(table)?;

        let mut keys: Vec<ForeignKeyInfo> = self
            .query(FOREIGN_KEY_LIST_SQL, vec![text(table)])?
            .iter()
            .map(|row| ForeignKeyInfo {
                name: None,
                id: cell_i64(row, 0),
                seq: cell_i64(row, 1),
                referenced_table: cell(row, 2).unwrap_or_default(),
                local_column: cell(row, 3).unwrap_or_default(),
                referenced_column: cell(row, 4),
                update_rule: ForeignKeyRule::parse(&cell(row, 5).unwrap_or_default()),
                delete_rule: ForeignKeyRule::parse(&cell(row, 6).unwrap_or_default()),
            })
            .collect();

        let clauses = ddl::foreign_key_clauses(&definition);
        ddl::assign_foreign_key_names(&clauses, &mut keys);
        Ok(keys)
    }

    /// Primary key of a referenced table; a dangling reference has none.
    fn referenced_primary_key(
        &self,
        table: &str,
        cache: &mut HashMap<String, PrimaryKeyInfo>,
    ) -> Result<PrimaryKeyInfo> {
        let key = table.to_lowercase();
        if let Some(pk) = cache.get(&key) {
            return Ok(pk.clone());
        }
        let pk = match self.find_primary_key(table) {
            Ok(pk) => pk,
            Err(Error::TableNotFound(_)) | Err(Error::InvalidTableName(_)) => {
                PrimaryKeyInfo::default()
            }
            Err(e) => return Err(e),
        };
        cache.insert(key, pk.clone());
        Ok(pk)
    }

    /// Key rows for the foreign keys declared on `table`, sorted by
    /// referenced table then `KEY_SEQ`.
    fn imported_key_rows(&self, table: &str) -> Result<Vec<(String, i64, Vec<Value>)>> {
        let keys = self.foreign_keys(table)?;
        let mut cache = HashMap::new();

        let mut rows = Vec::with_capacity(keys.len());
        for key in &keys {
            let pk = self.referenced_primary_key(&key.referenced_table, &mut cache)?;
            let pk_table = key.referenced_table.clone();
            rows.push((pk_table.clone(), key.seq, key_row(&pk_table, table, key, &pk)));
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(rows)
    }

    /// Foreign keys declared on `table`, ordered by referenced table then
    /// `KEY_SEQ`.
    pub fn get_imported_keys(&self, table: &str) -> Result<ResultSet> {
        let rows = self.imported_key_rows(table)?;
        debug!(table, keys = rows.len(), "get_imported_keys");
        Ok(ResultSet::from_rows(
            &FOREIGN_KEYS_COLUMNS,
            rows.into_iter().map(|(_, _, row)| row).collect(),
        ))
    }

    /// Foreign keys of `foreign_table` that reference `primary_table`.
    ///
    /// With only one side given this is [`Self::get_exported_keys`] of the
    /// primary table or [`Self::get_imported_keys`] of the foreign table. With
    /// neither, the result is empty.
    pub fn get_cross_reference(
        &self,
        primary_table: Option<&str>,
        foreign_table: Option<&str>,
    ) -> Result<ResultSet> {
        match (primary_table, foreign_table) {
            (Some(primary), None) => self.get_exported_keys(primary),
            (None, Some(foreign)) => self.get_imported_keys(foreign),
            (None, None) => {
                self.conn.check_open()?;
                Ok(ResultSet::from_rows(&FOREIGN_KEYS_COLUMNS, Vec::new()))
            }
            (Some(primary), Some(foreign)) => {
                self.table_definition(primary)?;
                let target = primary.to_lowercase();
                let rows: Vec<Vec<Value>> = self
                    .imported_key_rows(foreign)?
                    .into_iter()
                    .filter(|(pk_table, _, _)| pk_table.to_lowercase() == target)
                    .map(|(_, _, row)| row)
                    .collect();
                debug!(primary, foreign, keys = rows.len(), "get_cross_reference");
                Ok(ResultSet::from_rows(&FOREIGN_KEYS_COLUMNS, rows))
            }
        }
    }

    /// Foreign keys in other tables that reference `table`, ordered by
    /// referencing table then `KEY_SEQ`.
    pub fn get_exported_keys(&self, table: &str) -> Result<ResultSet> {
        let pk = self.find_primary_key(table)?;
        let target = table.to_lowercase();

        let mut rows = Vec::new();
        for fk_table in self
            .query(USER_TABLES_SQL, Vec::new())?
            .iter()
            .filter_map(|row| cell(row, 0))
        {
            for key in self.foreign_keys(&fk_table)? {
                if key.referenced_table.to_lowercase() != target {
                    continue;
                }
                rows.push((fk_table.clone(), key.seq, key_row(table, &fk_table, &key, &pk)));
            }
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        debug!(table, keys = rows.len(), "get_exported_keys");
        Ok(ResultSet::from_rows(
            &FOREIGN_KEYS_COLUMNS,
            rows.into_iter().map(|(_, _, row)| row).collect(),
        ))
    }

    /// Index columns of `table`, ordered by `NON_UNIQUE`, `INDEX_NAME` and
    /// `ORDINAL_POSITION`. Expression columns report a NULL `COLUMN_NAME`.
    pub fn get_index_info(&self, table: &str, unique_only: bool) -> Result<ResultSet> {
        self.table_definition(table)?;

        let mut entries: Vec<(i64, String, i64, Option<String>)> = Vec::new();
        for index in self.query(INDEX_LIST_SQL, vec![text(table)])? {
            let Some(name) = cell(&index, 0) else {
                continue;
            };
            let non_unique = 1 - cell_i64(&index, 1);
            if unique_only && non_unique != 0 {
                continue;
            }
            for column in self.query(INDEX_INFO_SQL, vec![text(&name)])? {
                entries.push((non_unique, name.clone(), cell_i64(&column, 0) + 1, cell(&column, 1)));
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        let rows = entries
            .into_iter()
            .map(|(non_unique, name, ordinal, column)| {
                vec![
                    Value::Null,
                    Value::Null,
                    text(table),
                    Value::Integer(non_unique),
                    Value::Null,
                    Value::Text(name),
                    Value::Integer(INDEX_TYPE_OTHER),
                    Value::Integer(ordinal),
                    text_or_null(column.as_deref()),
                    Value::Null,
                    Value::Integer(0),
                    Value::Integer(0),
                    Value::Null,
                ]
            })
            .collect();
        Ok(ResultSet::from_rows(&INDEX_INFO_COLUMNS, rows))
    }

    /// The engine cannot tell which columns identify a row best; always empty.
    pub fn get_best_row_identifier(&self, _table: &str) -> Result<ResultSet> {
        self.conn.check_open()?;
        Ok(ResultSet::from_rows(&ROW_IDENTIFIER_COLUMNS, Vec::new()))
    }

    /// No column is updated automatically on row change; always empty.
    pub fn get_version_columns(&self, _table: &str) -> Result<ResultSet> {
        self.conn.check_open()?;
        Ok(ResultSet::from_rows(&ROW_IDENTIFIER_COLUMNS, Vec::new()))
    }

    /// The engine has no stored procedures; always empty.
    pub fn get_procedures(&self, _pattern: Option<&str>) -> Result<ResultSet> {
        self.conn.check_open()?;
        Ok(ResultSet::from_rows(&PROCEDURES_COLUMNS, Vec::new()))
    }

    /// The engine's five storage classes, ordered by `DATA_TYPE`.
    pub fn get_type_info(&self) -> Result<ResultSet> {
        self.conn.check_open()?;
        let rows = vec![
            type_row("NULL", 0, false, true, false),
            type_row("INTEGER", 4, false, false, true),
            type_row("REAL", 7, false, false, false),
            type_row("TEXT", 12, true, true, false),
            type_row("BLOB", 2004, false, true, false),
        ];
        Ok(ResultSet::from_rows(&TYPE_INFO_COLUMNS, rows))
    }

    /// Current `last_insert_rowid()` of the connection, through the shared
    /// generated-keys statement.
    pub fn get_generated_keys(&self) -> Result<ResultSet> {
        self.conn.check_open()?;
        let lease = self.conn.generated_keys.acquire();
        let value = lease.fetch()?;
        Ok(ResultSet::from_rows(&[GENERATED_KEYS_COLUMN], vec![vec![value]]).with_lease(lease))
    }
}

/// One `get_columns` row from a `table_xinfo` row.
fn column_row(table: &str, ordinal: i64, column: &[Value], autoincrement: bool) -> Vec<Value> {
    let name = cell(column, 1).unwrap_or_default();
    let decl = cell(column, 2).map_or_else(|| "TEXT".to_string(), |t| t.to_uppercase());
    let default = cell(column, 4);
    let is_pk = cell(column, 5).as_deref() == Some("1");
    let generated = matches!(cell(column, 6).as_deref(), Some("2") | Some("3"));

    let nullable = match cell(column, 3).as_deref() {
        None => COLUMN_NULLABLE_UNKNOWN,
        Some("0") => COLUMN_NULLABLE,
        Some(_) => COLUMN_NO_NULLS,
    };
    let is_nullable = match nullable {
        COLUMN_NO_NULLS => "NO",
        COLUMN_NULLABLE => "YES",
        _ => "",
    };

    let category = affinity::classify(Some(&decl));
    let (column_size, decimal_digits) = match affinity::parse_dimension(&decl) {
        Some(dim) => (dim.column_size, dim.decimal_digits),
        None => match category {
            TypeCategory::Integer | TypeCategory::Text => (DEFAULT_COLUMN_SIZE, 0),
            _ => (DEFAULT_COLUMN_SIZE, DEFAULT_DECIMAL_DIGITS),
        },
    };
    let type_name = if decl.find('(').is_some_and(|i| i > 0) {
        affinity::base_type_name(&decl)
    } else {
        decl.clone()
    };
    let yes_no = |flag: bool| text(if flag { "YES" } else { "NO" });

    vec![
        Value::Null,
        Value::Null,
        text(table),
        Value::Text(name),
        Value::Integer(i64::from(category.sql_type().code())),
        Value::Text(type_name),
        Value::Integer(column_size),
        Value::Integer(DEFAULT_COLUMN_SIZE),
        Value::Integer(decimal_digits),
        Value::Integer(NUM_PREC_RADIX),
        Value::Integer(nullable),
        Value::Null,
        text_or_null(default.as_deref()),
        Value::Integer(0),
        Value::Integer(0),
        Value::Integer(DEFAULT_COLUMN_SIZE),
        Value::Integer(ordinal),
        text(is_nullable),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        yes_no(is_pk && autoincrement),
        yes_no(generated),
    ]
}

/// One imported/exported key row.
fn key_row(pk_table: &str, fk_table: &str, key: &ForeignKeyInfo, pk: &PrimaryKeyInfo) -> Vec<Value> {
    let pk_column = key
        .referenced_column
        .clone()
        .or_else(|| usize::try_from(key.seq).ok().and_then(|i| pk.columns.get(i).cloned()));

    vec![
        Value::Null,
        Value::Null,
        text(pk_table),
        text_or_null(pk_column.as_deref()),
        Value::Null,
        Value::Null,
        text(fk_table),
        text(&key.local_column),
        Value::Integer(key.seq + 1),
        Value::Integer(key.update_rule.code()),
        Value::Integer(key.delete_rule.code()),
        text_or_null(key.name.as_deref()),
        text_or_null(pk.name.as_deref()),
        Value::Integer(DEFERRABILITY_INITIALLY_DEFERRED),
    ]
}

fn type_row(
    name: &str,
    data_type: i64,
    case_sensitive: bool,
    unsigned: bool,
    auto_increment: bool,
) -> Vec<Value> {
    let flag = |b: bool| Value::Integer(i64::from(b));
    vec![
        text(name),
        Value::Integer(data_type),
        Value::Integer(0),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Integer(TYPE_NULLABLE),
        flag(case_sensitive),
        Value::Integer(TYPE_SEARCHABLE),
        flag(unsigned),
        Value::Integer(0),
        flag(auto_increment),
        Value::Null,
        Value::Integer(0),
        Value::Integer(0),
        Value::Integer(0),
        Value::Integer(0),
        Value::Integer(NUM_PREC_RADIX),
    ]
}
