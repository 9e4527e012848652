/// Data structures shared across the crate
///
/// This module defines the type codes reported through result-set and catalog
/// metadata, the runtime storage classes of engine values, and the column and
/// constraint records the metadata resolver assembles.
use libsql::Value;

/// Standard relational type codes (the `java.sql.Types` numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    Date,
    Timestamp,
    Binary,
    Boolean,
    Blob,
    Clob,
    Null,
}

impl SqlType {
    /// Numeric code as reported in `DATA_TYPE` columns.
    pub fn code(self) -> i32 {
        match self {
            SqlType::Bit => -7,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Char => 1,
            SqlType::VarChar => 12,
            SqlType::Date => 91,
            SqlType::Timestamp => 93,
            SqlType::Binary => -2,
            SqlType::Boolean => 16,
            SqlType::Blob => 2004,
            SqlType::Clob => 2005,
            SqlType::Null => 0,
        }
    }
}

/// Runtime storage class of a single engine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Real,
    Text,
    Blob,
    Null,
}

impl ValueType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
            Value::Null => ValueType::Null,
        }
    }
}

/// Nullability of a result column, as far as it can be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    NoNulls,
    Nullable,
    Unknown,
}

/// Table column an output column reads from directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOrigin {
    /// Attached database name (`main`, `temp`, ...)
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// Declared shape of one output column of a compiled statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDecl {
    /// Column label as the engine reports it
    pub name: String,
    /// Declared type text when the column maps directly onto a table column
    pub decl_type: Option<String>,
    /// Source table column; `None` for expressions
    pub origin: Option<ColumnOrigin>,
    /// `NOT NULL` of the source column, `Unknown` for expressions
    pub nullability: Nullability,
    /// Source column is an `AUTOINCREMENT` primary key
    pub auto_increment: bool,
}

impl ColumnDecl {
    pub fn new(name: impl Into<String>, decl_type: Option<String>) -> Self {
        ColumnDecl {
            name: name.into(),
            decl_type,
            origin: None,
            nullability: Nullability::Unknown,
            auto_increment: false,
        }
    }

    /// An untyped column, as used by synthetic catalog result sets.
    pub fn untyped(name: impl Into<String>) -> Self {
        ColumnDecl::new(name, None)
    }
}

/// Resolved metadata for one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub decl_type: Option<String>,
    pub sql_type: SqlType,
    pub type_name: String,
    pub precision: u32,
    pub scale: u32,
    pub nullability: Nullability,
    pub auto_increment: bool,
}

/// Referential action reported by the engine for `ON UPDATE` / `ON DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyRule {
    Cascade,
    Restrict,
    SetNull,
    NoAction,
    SetDefault,
}

impl ForeignKeyRule {
    /// Map the engine's textual rule name; unknown names read as NO ACTION.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => ForeignKeyRule::Cascade,
            "RESTRICT" => ForeignKeyRule::Restrict,
            "SET NULL" => ForeignKeyRule::SetNull,
            "SET DEFAULT" => ForeignKeyRule::SetDefault,
            _ => ForeignKeyRule::NoAction,
        }
    }

    /// Canonical rule code (`importedKeyCascade` = 0 ... `importedKeySetDefault` = 4).
    pub fn code(self) -> i64 {
        match self {
            ForeignKeyRule::Cascade => 0,
            ForeignKeyRule::Restrict => 1,
            ForeignKeyRule::SetNull => 2,
            ForeignKeyRule::NoAction => 3,
            ForeignKeyRule::SetDefault => 4,
        }
    }
}

/// Primary-key constraint of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryKeyInfo {
    /// Constraint name when declared as `CONSTRAINT <name> PRIMARY KEY (...)`
    pub name: Option<String>,
    /// Key columns in declaration order
    pub columns: Vec<String>,
}

/// One column pair of a foreign key, as recovered from introspection plus DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    /// Constraint name recovered from the DDL text, if any
    pub name: Option<String>,
    /// Engine-assigned id shared by all column pairs of one constraint
    pub id: i64,
    /// Position of this pair within the constraint, starting at 0
    pub seq: i64,
    pub local_column: String,
    pub referenced_table: String,
    /// `None` when the clause names only the table (implicit primary key)
    pub referenced_column: Option<String>,
    pub update_rule: ForeignKeyRule,
    pub delete_rule: ForeignKeyRule,
}
