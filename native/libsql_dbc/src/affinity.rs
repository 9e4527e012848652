/// Declared-type classification.
///
/// The engine derives a column's storage affinity from substrings of its
/// declared type. Reported types have to agree with how values are really
/// stored, so classification applies the same ordered rules:
///
/// 1. contains `INT` or `BOOL` → integer
/// 2. contains `CHAR`, `CLOB`, `TEXT` or `BLOB` → text
/// 3. contains `REAL`, `FLOA`, `DOUB`, `DEC` or `NUM` → numeric
/// 4. anything else, including no declared type → text
///
/// Result-set metadata additionally consults the runtime storage class of the
/// current value (see [`resolve_sql_type`]).
use crate::models::{SqlType, ValueType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Normalised category of a declared type or runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Text,
    Numeric,
    Blob,
    Null,
}

impl TypeCategory {
    /// Category of a runtime storage class.
    pub fn of_value(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Integer => TypeCategory::Integer,
            ValueType::Real => TypeCategory::Numeric,
            ValueType::Text => TypeCategory::Text,
            ValueType::Blob => TypeCategory::Blob,
            ValueType::Null => TypeCategory::Null,
        }
    }

    /// Type code reported in catalog `DATA_TYPE` columns.
    pub fn sql_type(self) -> SqlType {
        match self {
            TypeCategory::Integer => SqlType::Integer,
            TypeCategory::Text => SqlType::VarChar,
            TypeCategory::Numeric => SqlType::Float,
            TypeCategory::Blob => SqlType::Blob,
            TypeCategory::Null => SqlType::Null,
        }
    }
}

const INTEGER_TOKENS: [&str; 2] = ["INT", "BOOL"];
const TEXT_TOKENS: [&str; 4] = ["CHAR", "CLOB", "TEXT", "BLOB"];
const NUMERIC_TOKENS: [&str; 5] = ["REAL", "FLOA", "DOUB", "DEC", "NUM"];

/// Classify a declared type. First matching rule wins.
pub fn classify(decl_type: Option<&str>) -> TypeCategory {
    let upper = decl_type.unwrap_or("TEXT").to_ascii_uppercase();
    let contains_any = |tokens: &[&str]| tokens.iter().any(|t| upper.contains(t));

    if contains_any(&INTEGER_TOKENS) {
        TypeCategory::Integer
    } else if contains_any(&TEXT_TOKENS) {
        TypeCategory::Text
    } else if contains_any(&NUMERIC_TOKENS) {
        TypeCategory::Numeric
    } else {
        TypeCategory::Text
    }
}

/// Declared size and decimal digits of a type such as `VARCHAR(40)` or `NUMERIC(10,2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    /// `n` for `(n)`, `n + m` for `(n,m)`
    pub column_size: i64,
    /// `0` for `(n)`, `m` for `(n,m)`
    pub decimal_digits: i64,
}

/// Parse the `(n)` / `(n,m)` suffix of a declared type.
///
/// Returns `None` when there is no suffix or it does not hold unsigned integers.
pub fn parse_dimension(decl_type: &str) -> Option<Dimension> {
    let open = decl_type.find('(')?;
    let close = open + decl_type[open..].find(')')?;
    let inner = &decl_type[open + 1..close];

    match inner.split_once(',') {
        Some((integer, decimals)) => {
            let integer: i64 = integer.trim().parse::<u32>().ok()?.into();
            let decimals: i64 = decimals.trim().parse::<u32>().ok()?.into();
            Some(Dimension {
                column_size: integer + decimals,
                decimal_digits: decimals,
            })
        }
        None => {
            let integer: i64 = inner.trim().parse::<u32>().ok()?.into();
            Some(Dimension {
                column_size: integer,
                decimal_digits: 0,
            })
        }
    }
}

/// Declared type without its dimension, upper-cased: `varchar(40)` → `VARCHAR`.
pub fn base_type_name(decl_type: &str) -> String {
    decl_type
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}

/// Precision and scale from the first parenthesised group of a declared type.
pub fn precision_and_scale(decl_type: &str) -> (u32, u32) {
    let Some(open) = decl_type.find('(') else {
        return (0, 0);
    };
    let Some(len) = decl_type[open..].find(')') else {
        return (0, 0);
    };
    let mut parts = decl_type[open + 1..open + len].split(',');
    let precision = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    let scale = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    (precision, scale)
}

static CAST_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)cast\(.*?\s+as\s+(.*?)\s*\)").expect("valid CAST type regex")
});

/// Target type of a `CAST(expr AS type)` column label, if the label is one.
pub fn cast_type(label: &str) -> Option<String> {
    CAST_TYPE
        .captures(label)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Type name reported for a result column.
///
/// The declared type wins; otherwise the runtime storage class names the type.
pub fn type_name(decl_type: Option<&str>, value_type: ValueType) -> String {
    match decl_type {
        Some(decl) => base_type_name(decl),
        None => match value_type {
            ValueType::Integer => "INTEGER",
            ValueType::Real => "FLOAT",
            ValueType::Blob => "BLOB",
            ValueType::Text => "TEXT",
            ValueType::Null => "NUMERIC",
        }
        .to_string(),
    }
}

/// Resolve the type code of a result column from its type name and the
/// storage class of the current value.
///
/// A declared name only decides the code while the value is NULL or of the
/// matching storage class; otherwise the runtime class takes over. Integer
/// values outside the 32-bit range report as BIGINT.
pub fn resolve_sql_type(type_name: &str, value_type: ValueType, value: Option<i64>) -> SqlType {
    let null = value_type == ValueType::Null;

    if value_type == ValueType::Integer || null {
        match type_name {
            "BOOLEAN" => return SqlType::Boolean,
            "TINYINT" => return SqlType::TinyInt,
            "SMALLINT" | "INT2" => return SqlType::SmallInt,
            "BIGINT" | "INT8" | "UNSIGNED BIG INT" => return SqlType::BigInt,
            "DATE" | "DATETIME" => return SqlType::Date,
            "TIMESTAMP" => return SqlType::Timestamp,
            _ => {}
        }
        if value_type == ValueType::Integer || matches!(type_name, "INT" | "INTEGER" | "MEDIUMINT")
        {
            let v = value.unwrap_or(0);
            return if v > i64::from(i32::MAX) || v < i64::from(i32::MIN) {
                SqlType::BigInt
            } else {
                SqlType::Integer
            };
        }
    }

    if value_type == ValueType::Real || null {
        match type_name {
            "DECIMAL" => return SqlType::Decimal,
            "DOUBLE" | "DOUBLE PRECISION" => return SqlType::Double,
            "NUMERIC" => return SqlType::Numeric,
            "REAL" => return SqlType::Real,
            _ => {}
        }
        if value_type == ValueType::Real || type_name == "FLOAT" {
            return SqlType::Float;
        }
    }

    if value_type == ValueType::Text || null {
        match type_name {
            "CHARACTER" | "NCHAR" | "NATIVE CHARACTER" | "CHAR" => return SqlType::Char,
            "CLOB" => return SqlType::Clob,
            "DATE" | "DATETIME" => return SqlType::Date,
            "TIMESTAMP" => return SqlType::Timestamp,
            _ => {}
        }
        if value_type == ValueType::Text
            || matches!(type_name, "VARCHAR" | "VARYING CHARACTER" | "NVARCHAR" | "TEXT")
        {
            return SqlType::VarChar;
        }
    }

    if value_type == ValueType::Blob || null {
        if type_name == "BINARY" {
            return SqlType::Binary;
        }
        if value_type == ValueType::Blob || type_name == "BLOB" {
            return SqlType::Blob;
        }
    }

    SqlType::Numeric
}
