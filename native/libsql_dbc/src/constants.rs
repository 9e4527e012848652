/// Global constants and the shared runtime for libsql_dbc
///
/// This module holds the Tokio runtime that drives LibSQL's async API from the
/// synchronous surface, default configuration values, and the fixed column
/// layouts of every catalog result set.
use once_cell::sync::Lazy;
use tokio::runtime::Runtime;

/// Global Tokio runtime for async operations
///
/// IMPORTANT: This panics if Tokio runtime creation fails, which can only happen in
/// extremely rare circumstances (e.g., system has no available threads). In normal
/// operation, runtime creation succeeds immediately on the first engine call.
///
/// Never call into the crate from inside another Tokio runtime: `block_on` panics
/// when nested.
pub static TOKIO_RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Runtime::new()
        .expect("Failed to initialize Tokio runtime - check system resources and thread limits")
});

/// Default busy timeout applied on open (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 3000;

/// Prefix of the names given to savepoints created without a user name
pub const SAVEPOINT_NAME_PREFIX: &str = "SQLITE_SAVEPOINT_";

/// Label of the single column returned by generated-key lookups
pub const GENERATED_KEYS_COLUMN: &str = "last_insert_rowid()";

/// Column size and octet length reported when a declared type has no dimension
pub const DEFAULT_COLUMN_SIZE: i64 = 2_000_000_000;

/// Decimal digits reported for non-integer, non-text columns without a dimension
pub const DEFAULT_DECIMAL_DIGITS: i64 = 10;

/// Radix reported for every numeric column
pub const NUM_PREC_RADIX: i64 = 10;

/// `tableIndexOther`: the only index type the engine exposes
pub const INDEX_TYPE_OTHER: i64 = 3;

/// `importedKeyInitiallyDeferred`
pub const DEFERRABILITY_INITIALLY_DEFERRED: i64 = 5;

/// `columnNoNulls` / `columnNullable` / `columnNullableUnknown`
pub const COLUMN_NO_NULLS: i64 = 0;
pub const COLUMN_NULLABLE: i64 = 1;
pub const COLUMN_NULLABLE_UNKNOWN: i64 = 2;

/// `typeNullable`, reported for every type in `get_type_info`
pub const TYPE_NULLABLE: i64 = 1;

/// `typeSearchable`
pub const TYPE_SEARCHABLE: i64 = 3;

/// Table types reported by `get_table_types`, in report order
pub const TABLE_TYPES: [&str; 4] = ["GLOBAL TEMPORARY", "SYSTEM TABLE", "TABLE", "VIEW"];

pub const TABLES_COLUMNS: [&str; 10] = [
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "TABLE_TYPE",
    "REMARKS",
    "TYPE_CAT",
    "TYPE_SCHEM",
    "TYPE_NAME",
    "SELF_REFERENCING_COL_NAME",
    "REF_GENERATION",
];

pub const COLUMNS_COLUMNS: [&str; 24] = [
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "COLUMN_NAME",
    "DATA_TYPE",
    "TYPE_NAME",
    "COLUMN_SIZE",
    "BUFFER_LENGTH",
    "DECIMAL_DIGITS",
    "NUM_PREC_RADIX",
    "NULLABLE",
    "REMARKS",
    "COLUMN_DEF",
    "SQL_DATA_TYPE",
    "SQL_DATETIME_SUB",
    "CHAR_OCTET_LENGTH",
    "ORDINAL_POSITION",
    "IS_NULLABLE",
    "SCOPE_CATALOG",
    "SCOPE_SCHEMA",
    "SCOPE_TABLE",
    "SOURCE_DATA_TYPE",
    "IS_AUTOINCREMENT",
    "IS_GENERATEDCOLUMN",
];

pub const PRIMARY_KEYS_COLUMNS: [&str; 6] = [
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "COLUMN_NAME",
    "KEY_SEQ",
    "PK_NAME",
];

/// Shared by imported and exported key result sets
pub const FOREIGN_KEYS_COLUMNS: [&str; 14] = [
    "PKTABLE_CAT",
    "PKTABLE_SCHEM",
    "PKTABLE_NAME",
    "PKCOLUMN_NAME",
    "FKTABLE_CAT",
    "FKTABLE_SCHEM",
    "FKTABLE_NAME",
    "FKCOLUMN_NAME",
    "KEY_SEQ",
    "UPDATE_RULE",
    "DELETE_RULE",
    "FK_NAME",
    "PK_NAME",
    "DEFERRABILITY",
];

pub const INDEX_INFO_COLUMNS: [&str; 13] = [
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "NON_UNIQUE",
    "INDEX_QUALIFIER",
    "INDEX_NAME",
    "TYPE",
    "ORDINAL_POSITION",
    "COLUMN_NAME",
    "ASC_OR_DESC",
    "CARDINALITY",
    "PAGES",
    "FILTER_CONDITION",
];

pub const TYPE_INFO_COLUMNS: [&str; 18] = [
    "TYPE_NAME",
    "DATA_TYPE",
    "PRECISION",
    "LITERAL_PREFIX",
    "LITERAL_SUFFIX",
    "CREATE_PARAMS",
    "NULLABLE",
    "CASE_SENSITIVE",
    "SEARCHABLE",
    "UNSIGNED_ATTRIBUTE",
    "FIXED_PREC_SCALE",
    "AUTO_INCREMENT",
    "LOCAL_TYPE_NAME",
    "MINIMUM_SCALE",
    "MAXIMUM_SCALE",
    "SQL_DATA_TYPE",
    "SQL_DATETIME_SUB",
    "NUM_PREC_RADIX",
];

pub const TABLE_TYPES_COLUMNS: [&str; 1] = ["TABLE_TYPE"];

pub const SCHEMAS_COLUMNS: [&str; 2] = ["TABLE_SCHEM", "TABLE_CATALOG"];

pub const CATALOGS_COLUMNS: [&str; 1] = ["TABLE_CAT"];

/// Shared by `get_best_row_identifier` and `get_version_columns`
pub const ROW_IDENTIFIER_COLUMNS: [&str; 8] = [
    "SCOPE",
    "COLUMN_NAME",
    "DATA_TYPE",
    "TYPE_NAME",
    "COLUMN_SIZE",
    "BUFFER_LENGTH",
    "DECIMAL_DIGITS",
    "PSEUDO_COLUMN",
];

pub const PROCEDURES_COLUMNS: [&str; 8] = [
    "PROCEDURE_CAT",
    "PROCEDURE_SCHEM",
    "PROCEDURE_NAME",
    "UNDEF1",
    "UNDEF2",
    "UNDEF3",
    "REMARKS",
    "PROCEDURE_TYPE",
];
