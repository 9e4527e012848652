#![no_main]
//! Structured DDL fuzzing
//!
//! Generates CREATE TABLE statements from column and constraint fragments so the
//! constraint scanner sees inputs that look like real table definitions.

use arbitrary::Arbitrary;
use libsql_dbc::ddl::{assign_foreign_key_names, foreign_key_clauses, resolve_constraints};
use libsql_dbc::models::{ForeignKeyInfo, ForeignKeyRule};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct TableInput<'a> {
    name: &'a str,
    columns: Vec<ColumnInput<'a>>,
    constraints: Vec<ConstraintInput<'a>>,
}

#[derive(Debug, Arbitrary)]
struct ColumnInput<'a> {
    name: &'a str,
    decl_type: Option<&'a str>,
    references: Option<&'a str>,
}

#[derive(Debug, Arbitrary)]
enum ConstraintInput<'a> {
    PrimaryKey {
        name: Option<&'a str>,
        columns: Vec<&'a str>,
    },
    ForeignKey {
        name: Option<&'a str>,
        columns: Vec<&'a str>,
        table: &'a str,
    },
    Raw(&'a str),
}

impl ConstraintInput<'_> {
    fn render(&self) -> String {
        let named = |name: &Option<&str>| {
            name.map(|n| format!("CONSTRAINT {n} ")).unwrap_or_default()
        };
        match self {
            ConstraintInput::PrimaryKey { name, columns } => {
                format!("{}PRIMARY KEY ({})", named(name), columns.join(", "))
            }
            ConstraintInput::ForeignKey {
                name,
                columns,
                table,
            } => format!(
                "{}FOREIGN KEY ({}) REFERENCES {table}",
                named(name),
                columns.join(", ")
            ),
            ConstraintInput::Raw(text) => (*text).to_string(),
        }
    }
}

fuzz_target!(|input: TableInput| {
    let mut parts: Vec<String> = input
        .columns
        .iter()
        .map(|c| {
            let mut column = c.name.to_string();
            if let Some(decl) = c.decl_type {
                column.push(' ');
                column.push_str(decl);
            }
            if let Some(table) = c.references {
                column.push_str(" REFERENCES ");
                column.push_str(table);
            }
            column
        })
        .collect();
    parts.extend(input.constraints.iter().map(ConstraintInput::render));

    let ddl = format!("CREATE TABLE {} ({})", input.name, parts.join(", "));
    let _ = resolve_constraints(&ddl);

    // Name assignment must cope with any pairing of clauses and keys
    let clauses = foreign_key_clauses(&ddl);
    let mut keys: Vec<ForeignKeyInfo> = input
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| ForeignKeyInfo {
            name: None,
            id: i as i64,
            seq: 0,
            local_column: c.name.to_string(),
            referenced_table: c.references.unwrap_or_default().to_string(),
            referenced_column: None,
            update_rule: ForeignKeyRule::NoAction,
            delete_rule: ForeignKeyRule::NoAction,
        })
        .collect();
    assign_foreign_key_names(&clauses, &mut keys);
});
