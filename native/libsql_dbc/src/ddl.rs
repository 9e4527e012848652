/// Constraint recovery from stored table definitions.
///
/// The engine's introspection commands report primary-key membership and
/// foreign-key column pairs, but never constraint names. Those only exist in
/// the `CREATE TABLE` text kept in the catalog, so this module scans that text.
///
/// The scan is pattern based, not a grammar: exotic but legal definitions
/// (keywords inside string defaults, nested parentheses in key lists) can
/// defeat it. Not finding a clause is a normal outcome and callers fall back
/// to the per-column introspection data.
use crate::models::{ForeignKeyInfo, PrimaryKeyInfo};
use crate::utils::unquote_identifier;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// A quoted or bare identifier.
const IDENT: &str = r#"(?:"(?:[^"]|"")*"|`[^`]*`|\[[^\]]*\]|[A-Za-z_][A-Za-z0-9_$]*)"#;

static NAMED_PRIMARY_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)\bCONSTRAINT\s+({IDENT})\s*PRIMARY\s+KEY\s*\(([^)]*)\)"
    ))
    .expect("valid named PRIMARY KEY regex")
});

static UNNAMED_PRIMARY_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)[\s,]PRIMARY\s+KEY\s*\(([^)]*)\)").expect("valid PRIMARY KEY regex")
});

static TABLE_FOREIGN_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)(?:\bCONSTRAINT\s+({IDENT})\s+)?\bFOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+({IDENT})"
    ))
    .expect("valid FOREIGN KEY regex")
});

static COLUMN_FOREIGN_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)[(,]\s*({IDENT})(?:[^,()]|\([^()]*\))*?\bCONSTRAINT\s+({IDENT})\s+REFERENCES\s+({IDENT})"
    ))
    .expect("valid column REFERENCES regex")
});

static AUTOINCREMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAUTOINCREMENT\b").expect("valid AUTOINCREMENT regex"));

/// A foreign-key clause found in definition text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyClause {
    /// Constraint name, when the clause was introduced by `CONSTRAINT <name>`
    pub name: Option<String>,
    /// Local columns in declaration order, unquoted
    pub columns: Vec<String>,
    /// Referenced table, unquoted
    pub referenced_table: String,
    /// Byte offset of the clause; orders clauses by declaration
    pub offset: usize,
}

/// Everything the text scan recovers for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintInfo {
    /// Primary key declared as a table constraint; `None` when only column
    /// flags can tell (e.g. `id INTEGER PRIMARY KEY`)
    pub primary_key: Option<PrimaryKeyInfo>,
    /// Foreign-key clauses in declaration order
    pub foreign_keys: Vec<ForeignKeyClause>,
}

/// Scan a table definition for its key constraints.
pub fn resolve_constraints(definition: &str) -> ConstraintInfo {
    ConstraintInfo {
        primary_key: primary_key_clause(definition),
        foreign_keys: foreign_key_clauses(definition),
    }
}

/// Find a `[CONSTRAINT <name>] PRIMARY KEY (<cols>)` table constraint.
///
/// The named form is tried first; the unnamed form carries no name.
pub fn primary_key_clause(definition: &str) -> Option<PrimaryKeyInfo> {
    if let Some(caps) = NAMED_PRIMARY_KEY.captures(definition) {
        let name = caps.get(1).map(|m| unquote_identifier(m.as_str()));
        let columns = caps.get(2).map(|m| split_key_columns(m.as_str()))?;
        if !columns.is_empty() {
            return Some(PrimaryKeyInfo { name, columns });
        }
    }

    let caps = UNNAMED_PRIMARY_KEY.captures(definition)?;
    let columns = split_key_columns(caps.get(1)?.as_str());
    if columns.is_empty() {
        return None;
    }
    Some(PrimaryKeyInfo {
        name: None,
        columns,
    })
}

/// Every foreign-key clause, named or not, in declaration order.
///
/// Covers table constraints (`[CONSTRAINT n] FOREIGN KEY (a, b) REFERENCES t`)
/// and named column constraints (`a INT CONSTRAINT n REFERENCES t`).
pub fn foreign_key_clauses(definition: &str) -> Vec<ForeignKeyClause> {
    let mut clauses: Vec<ForeignKeyClause> = TABLE_FOREIGN_KEY
        .captures_iter(definition)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ForeignKeyClause {
                name: caps.get(1).map(|m| unquote_identifier(m.as_str())),
                columns: split_key_columns(caps.get(2)?.as_str()),
                referenced_table: unquote_identifier(caps.get(3)?.as_str()),
                offset: whole.start(),
            })
        })
        .collect();

    clauses.extend(COLUMN_FOREIGN_KEY.captures_iter(definition).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some(ForeignKeyClause {
            name: caps.get(2).map(|m| unquote_identifier(m.as_str())),
            columns: vec![unquote_identifier(caps.get(1)?.as_str())],
            referenced_table: unquote_identifier(caps.get(3)?.as_str()),
            offset: whole.start(),
        })
    }));

    clauses.sort_by_key(|c| c.offset);
    clauses
}

/// Attach constraint names from scanned clauses to introspected key pairs.
///
/// The engine numbers foreign keys in reverse declaration order, so groups are
/// visited by descending id. Each group takes the first unused clause with the
/// same local columns and referenced table (compared case-insensitively).
/// Several same-shaped unnamed keys cannot be told apart; pairing is then
/// best-effort and may hand a name to the wrong one of them.
pub fn assign_foreign_key_names(clauses: &[ForeignKeyClause], keys: &mut [ForeignKeyInfo]) {
    let mut ids: Vec<i64> = keys.iter().map(|k| k.id).collect();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();

    let mut used: HashSet<usize> = HashSet::new();

    for id in ids {
        let (local, table) = {
            let mut group: Vec<&ForeignKeyInfo> = keys.iter().filter(|k| k.id == id).collect();
            group.sort_by_key(|k| k.seq);

            let local: Vec<String> = group
                .iter()
                .map(|k| k.local_column.to_lowercase())
                .collect();
            let table = group
                .first()
                .map(|k| k.referenced_table.to_lowercase())
                .unwrap_or_default();
            (local, table)
        };

        let matched = clauses.iter().enumerate().find(|(i, clause)| {
            !used.contains(i)
                && clause.referenced_table.to_lowercase() == table
                && clause
                    .columns
                    .iter()
                    .map(|c| c.to_lowercase())
                    .eq(local.iter().cloned())
        });

        let name = match matched {
            Some((i, clause)) => {
                used.insert(i);
                clause.name.clone()
            }
            None => None,
        };

        for key in keys.iter_mut().filter(|k| k.id == id) {
            key.name.clone_from(&name);
        }
    }
}

/// True when the definition declares an AUTOINCREMENT column.
pub fn has_autoincrement(definition: &str) -> bool {
    AUTOINCREMENT.is_match(definition)
}

/// Split a key column list, dropping sort order and collation suffixes.
fn split_key_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(strip_column_modifiers)
        .map(|c| unquote_identifier(&c))
        .filter(|c| !c.is_empty())
        .collect()
}

fn strip_column_modifiers(part: &str) -> String {
    let mut column = part.trim().to_string();
    loop {
        let upper = column.to_ascii_uppercase();
        let cut = if upper.ends_with(" ASC") {
            Some(column.len() - 4)
        } else if upper.ends_with(" DESC") {
            Some(column.len() - 5)
        } else {
            upper
                .rfind(" COLLATE ")
                .filter(|_| !column.ends_with(['"', '`', ']']))
        };
        match cut {
            Some(at) => column = column[..at].trim_end().to_string(),
            None => return column,
        }
    }
}
