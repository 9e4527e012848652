/// Decoding and type conversion utilities
///
/// This module converts engine values into the Rust types handed out by the
/// typed cursor getters, following the engine's own coercion rules (text that
/// does not look numeric reads as zero, NULL reads as zero or `None`), and
/// validates names that get interpolated into SQL.
use crate::error::{Error, Result};
use libsql::Value;

/// Decode a value as text. NULL decodes to `None`.
pub fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(text) => Some(text.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Decode a value as a 64-bit integer.
///
/// Reals truncate toward zero; text is read through its numeric prefix.
pub fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Null | Value::Blob(_) => 0,
        Value::Integer(i) => *i,
        Value::Real(f) => *f as i64,
        Value::Text(text) => parse_numeric_prefix(text).map_or(0, |f| f as i64),
    }
}

/// Decode a value as a 32-bit integer, truncating like the engine does.
pub fn to_i32(value: &Value) -> i32 {
    to_i64(value) as i32
}

/// Decode a value as a double.
pub fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Null | Value::Blob(_) => 0.0,
        Value::Integer(i) => *i as f64,
        Value::Real(f) => *f,
        Value::Text(text) => parse_numeric_prefix(text).unwrap_or(0.0),
    }
}

/// Decode a value as a boolean: any non-zero integer reading is true.
pub fn to_bool(value: &Value) -> bool {
    to_i64(value) != 0
}

/// Decode a value as raw bytes. NULL decodes to `None`.
pub fn to_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => None,
        Value::Blob(bytes) => Some(bytes.clone()),
        Value::Text(text) => Some(text.as_bytes().to_vec()),
        Value::Integer(i) => Some(i.to_string().into_bytes()),
        Value::Real(f) => Some(f.to_string().into_bytes()),
    }
}

/// Longest leading run of `text` that parses as a number.
fn parse_numeric_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i as f64);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Some(f);
    }

    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()?;

    (1..=end)
        .rev()
        .find_map(|cut| trimmed[..cut].parse::<f64>().ok())
}

/// Validate that a savepoint name is a valid SQL identifier
///
/// Savepoint names must be:
/// - Non-empty
/// - ASCII alphanumeric or underscore
/// - Not start with a digit
pub fn validate_savepoint_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.chars().next().is_none_or(|c| c.is_ascii_digit())
    {
        return Err(Error::usage(format!(
            "Invalid savepoint name '{name}': must be a valid SQL identifier"
        )));
    }
    Ok(())
}
