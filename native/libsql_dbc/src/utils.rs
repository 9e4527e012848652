/// Utility functions and helpers for libsql_dbc
///
/// This module provides commonly used helpers for locking, identifier quoting,
/// statement classification and draining short-lived introspection queries.
use crate::error::{Error, Result};
use libsql::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard};

/// Safely lock a mutex with proper error handling
///
/// Returns a descriptive error if the mutex is poisoned.
pub fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| Error::Poisoned(format!("{context}: {e}")))
}

/// Safely lock an Arc<Mutex<T>> with proper error handling
///
/// Returns a descriptive error if the mutex is poisoned.
pub fn safe_lock_arc<'a, T>(
    arc_mutex: &'a Arc<Mutex<T>>,
    context: &str,
) -> Result<MutexGuard<'a, T>> {
    arc_mutex
        .lock()
        .map_err(|e| Error::Poisoned(format!("{context} (arc): {e}")))
}

/// Quote an identifier for interpolation into SQL text.
///
/// Embedded double quotes are doubled, then the whole name is wrapped in quotes.
pub fn quote_identifier(id: &str) -> String {
    format!("\"{}\"", id.replace('"', "\"\""))
}

/// Strip one layer of identifier quoting (`"x"`, `` `x` ``, `[x]`) and trim.
///
/// Names of two characters or fewer are returned trimmed but otherwise untouched.
pub fn unquote_identifier(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.len() > 2 {
        let first = trimmed.as_bytes()[0];
        let last = trimmed.as_bytes()[trimmed.len() - 1];
        let quoted = matches!(
            (first, last),
            (b'"', b'"') | (b'`', b'`') | (b'[', b']') | (b'\'', b'\'')
        );
        if quoted {
            return trimmed[1..trimmed.len() - 1].trim().to_string();
        }
    }
    trimmed.to_string()
}

static INSERT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(?:with\s+.+\(.+?\))*\s*(?:insert|replace)\s*")
        .expect("valid INSERT statement regex")
});

/// True when `sql` is an INSERT or REPLACE, optionally behind a `WITH` clause.
///
/// Used to decide whether `last_insert_rowid()` describes the statement just run.
pub fn is_insert_statement(sql: &str) -> bool {
    INSERT_STATEMENT.is_match(sql)
}

/// Run an introspection query and materialise every row.
///
/// The row cursor is dropped before returning, so no statement stays open on
/// the connection after this call, success or not.
pub async fn query_all(
    conn: &libsql::Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<Vec<Value>>> {
    let mut rows = conn.query(sql, params).await?;
    let column_count = rows.column_count().max(0) as usize;

    let mut collected = Vec::new();
    while let Some(row) = rows.next().await? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(row.get_value(i as i32)?);
        }
        collected.push(values);
    }

    Ok(collected)
}

/// Wrap an optional string as a text value or NULL.
pub fn text_or_null(text: Option<&str>) -> Value {
    text.map_or(Value::Null, |t| Value::Text(t.to_string()))
}
