//! Catalog metadata tests with a real database
//!
//! These tests verify that:
//! - every catalog call keeps its fixed column layout
//! - primary and foreign keys are reported with their declared names
//! - missing and blank table names are told apart
//! - catalog calls leave no statement handles behind

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::unwrap_used)]

use super::test_utils::{exec_all, open_test_db, strings_of, TestDb};
use crate::constants::{
    COLUMNS_COLUMNS, FOREIGN_KEYS_COLUMNS, INDEX_INFO_COLUMNS, PRIMARY_KEYS_COLUMNS,
    PROCEDURES_COLUMNS, ROW_IDENTIFIER_COLUMNS, TABLES_COLUMNS, TYPE_INFO_COLUMNS,
};
use crate::{Error, ResultSet, Value};

fn rows_of(rs: &mut ResultSet) -> Vec<Vec<Value>> {
    rs.collect_rows().unwrap()
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn catalog_db() -> TestDb {
    let db = open_test_db("meta");
    exec_all(
        &db.conn,
        &[
            "CREATE TABLE people (\
               id INTEGER PRIMARY KEY AUTOINCREMENT, \
               name VARCHAR(50) NOT NULL, \
               score NUMERIC(10,2) DEFAULT 0, \
               email text)",
            "CREATE TABLE orders (\
               id INTEGER PRIMARY KEY, \
               person_id INTEGER, \
               CONSTRAINT fk_person FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE)",
            "CREATE VIEW adults AS SELECT name FROM people",
        ],
    );
    db
}

mod tables {
    use super::*;

    #[test]
    fn test_get_tables_layout_and_order() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();
        let mut rs = meta.get_tables(None, None).unwrap();
        assert_eq!(rs.column_names(), TABLES_COLUMNS.to_vec());

        let rows = rows_of(&mut rs);
        let listed: Vec<(Value, Value)> = rows
            .iter()
            .map(|row| (row[3].clone(), row[2].clone()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (text("SYSTEM TABLE"), text("sqlite_schema")),
                (text("SYSTEM TABLE"), text("sqlite_sequence")),
                (text("TABLE"), text("orders")),
                (text("TABLE"), text("people")),
                (text("VIEW"), text("adults")),
            ]
        );
    }

    #[test]
    fn test_get_tables_filters_by_type_and_pattern() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_tables(None, Some(&["table"])).unwrap();
        assert_eq!(
            strings_of(&mut rs, "TABLE_NAME"),
            vec![Some("orders".to_string()), Some("people".to_string())]
        );

        let mut rs = meta.get_tables(Some("PEO%"), None).unwrap();
        assert_eq!(strings_of(&mut rs, "table_name"), vec![Some("people".to_string())]);

        let mut rs = meta.get_tables(Some("nothing_here"), None).unwrap();
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn test_fixed_catalog_listings() {
        let db = open_test_db("meta");
        let meta = db.conn.metadata().unwrap();

        let mut types = meta.get_table_types().unwrap();
        assert_eq!(
            strings_of(&mut types, "TABLE_TYPE"),
            vec![
                Some("GLOBAL TEMPORARY".to_string()),
                Some("SYSTEM TABLE".to_string()),
                Some("TABLE".to_string()),
                Some("VIEW".to_string()),
            ]
        );
        assert!(!meta.get_schemas().unwrap().next().unwrap());
        assert!(!meta.get_catalogs().unwrap().next().unwrap());
        assert_eq!(meta.database_product_name(), "SQLite");
        assert!(meta.database_product_version().unwrap().starts_with('3'));
        assert_eq!(meta.search_string_escape(), "\\");
    }
}

mod columns {
    use super::*;

    #[test]
    fn test_get_columns_layout() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();
        let mut rs = meta.get_columns(Some("people"), None).unwrap();
        assert_eq!(rs.column_count(), 24);
        assert_eq!(rs.column_names(), COLUMNS_COLUMNS.to_vec());

        // Same layout when nothing matches
        let empty = meta.get_columns(Some("missing"), None).unwrap();
        assert_eq!(empty.column_count(), 24);

        assert_eq!(
            strings_of(&mut rs, "COLUMN_NAME"),
            vec![
                Some("id".to_string()),
                Some("name".to_string()),
                Some("score".to_string()),
                Some("email".to_string()),
            ]
        );
    }

    #[test]
    fn test_get_columns_values() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();
        let mut rs = meta.get_columns(Some("people"), None).unwrap();

        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string_by_name("TYPE_NAME").unwrap(), Some("INTEGER".to_string()));
        assert_eq!(rs.get_long_by_name("DATA_TYPE").unwrap(), 4);
        assert_eq!(rs.get_long_by_name("COLUMN_SIZE").unwrap(), 2_000_000_000);
        assert_eq!(rs.get_long_by_name("DECIMAL_DIGITS").unwrap(), 0);
        assert_eq!(rs.get_long_by_name("ORDINAL_POSITION").unwrap(), 1);
        assert_eq!(rs.get_string_by_name("IS_AUTOINCREMENT").unwrap(), Some("YES".to_string()));

        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string_by_name("TYPE_NAME").unwrap(), Some("VARCHAR".to_string()));
        assert_eq!(rs.get_long_by_name("DATA_TYPE").unwrap(), 12);
        assert_eq!(rs.get_long_by_name("COLUMN_SIZE").unwrap(), 50);
        assert_eq!(rs.get_long_by_name("NULLABLE").unwrap(), 0);
        assert_eq!(rs.get_string_by_name("IS_NULLABLE").unwrap(), Some("NO".to_string()));
        assert_eq!(rs.get_string_by_name("IS_AUTOINCREMENT").unwrap(), Some("NO".to_string()));

        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string_by_name("TYPE_NAME").unwrap(), Some("NUMERIC".to_string()));
        assert_eq!(rs.get_long_by_name("DATA_TYPE").unwrap(), 6);
        assert_eq!(rs.get_long_by_name("COLUMN_SIZE").unwrap(), 12);
        assert_eq!(rs.get_long_by_name("DECIMAL_DIGITS").unwrap(), 2);
        assert_eq!(rs.get_string_by_name("COLUMN_DEF").unwrap(), Some("0".to_string()));
        assert_eq!(rs.get_long_by_name("NULLABLE").unwrap(), 1);

        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string_by_name("TYPE_NAME").unwrap(), Some("TEXT".to_string()));
        assert_eq!(rs.get_string_by_name("COLUMN_DEF").unwrap(), None);
        assert_eq!(rs.get_string_by_name("IS_GENERATEDCOLUMN").unwrap(), Some("NO".to_string()));

        assert!(!rs.next().unwrap());
    }

    #[test]
    fn test_get_columns_patterns() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_columns(None, Some("ID")).unwrap();
        // Ordered by table, then ordinal
        assert_eq!(
            strings_of(&mut rs, "TABLE_NAME"),
            vec![Some("orders".to_string()), Some("people".to_string())]
        );

        let mut rs = meta.get_columns(Some("people"), Some("s%")).unwrap();
        assert_eq!(strings_of(&mut rs, "COLUMN_NAME"), vec![Some("score".to_string())]);
    }

    #[test]
    fn test_generated_column_flag() {
        let db = open_test_db("meta");
        exec_all(
            &db.conn,
            &["CREATE TABLE boxes (w INT, h INT, area INT GENERATED ALWAYS AS (w * h) VIRTUAL)"],
        );
        let meta = db.conn.metadata().unwrap();
        let mut rs = meta.get_columns(Some("boxes"), Some("area")).unwrap();
        assert!(rs.next().unwrap());
        assert_eq!(
            rs.get_string_by_name("IS_GENERATEDCOLUMN").unwrap(),
            Some("YES".to_string())
        );
    }
}

mod primary_keys {
    use super::*;

    #[test]
    fn test_unnamed_single_column_key() {
        let db = open_test_db("meta");
        exec_all(&db.conn, &["CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"]);
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_primary_keys("t").unwrap();
        assert_eq!(rs.column_names(), PRIMARY_KEYS_COLUMNS.to_vec());
        let rows = rows_of(&mut rs);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][3], text("id"));
        assert_eq!(rows[0][4], Value::Integer(1));
        assert_eq!(rows[0][5], Value::Null);
    }

    #[test]
    fn test_named_composite_key() {
        let db = open_test_db("meta");
        exec_all(
            &db.conn,
            &["CREATE TABLE t (c1 INT, c2 INT, CONSTRAINT pk_t PRIMARY KEY (c2, c1))"],
        );
        let meta = db.conn.metadata().unwrap();

        let rows = rows_of(&mut meta.get_primary_keys("t").unwrap());
        // Ordered by column name; KEY_SEQ keeps the declaration order
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0][3].clone(), rows[0][4].clone()), (text("c1"), Value::Integer(2)));
        assert_eq!((rows[1][3].clone(), rows[1][4].clone()), (text("c2"), Value::Integer(1)));
        assert!(rows.iter().all(|row| row[5] == text("pk_t")));
    }

    #[test]
    fn test_table_without_key() {
        let db = open_test_db("meta");
        exec_all(&db.conn, &["CREATE TABLE loose (a TEXT)"]);
        let meta = db.conn.metadata().unwrap();
        assert!(!meta.get_primary_keys("loose").unwrap().next().unwrap());
        assert!(!meta.get_primary_keys("sqlite_schema").unwrap().next().unwrap());
    }

    #[test]
    fn test_missing_and_blank_tables() {
        let db = open_test_db("meta");
        let meta = db.conn.metadata().unwrap();

        assert!(matches!(
            meta.get_primary_keys("nope").unwrap_err(),
            Error::TableNotFound(name) if name == "nope"
        ));
        assert!(matches!(
            meta.get_primary_keys("  ").unwrap_err(),
            Error::InvalidTableName(_)
        ));
        assert!(matches!(
            meta.get_imported_keys("nope").unwrap_err(),
            Error::TableNotFound(_)
        ));
        assert!(matches!(
            meta.get_index_info("nope", false).unwrap_err(),
            Error::TableNotFound(_)
        ));
    }
}

mod foreign_keys {
    use super::*;

    #[test]
    fn test_named_foreign_key() {
        let db = open_test_db("meta");
        exec_all(
            &db.conn,
            &[
                "CREATE TABLE t (b INTEGER PRIMARY KEY)",
                "CREATE TABLE child (a INT, CONSTRAINT fk1 FOREIGN KEY(a) REFERENCES t(b))",
            ],
        );
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_imported_keys("child").unwrap();
        assert_eq!(rs.column_names(), FOREIGN_KEYS_COLUMNS.to_vec());
        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string_by_name("FK_NAME").unwrap(), Some("fk1".to_string()));
        assert_eq!(rs.get_string_by_name("PKTABLE_NAME").unwrap(), Some("t".to_string()));
        assert_eq!(rs.get_string_by_name("PKCOLUMN_NAME").unwrap(), Some("b".to_string()));
        assert_eq!(rs.get_string_by_name("FKTABLE_NAME").unwrap(), Some("child".to_string()));
        assert_eq!(rs.get_string_by_name("FKCOLUMN_NAME").unwrap(), Some("a".to_string()));
        assert_eq!(rs.get_long_by_name("KEY_SEQ").unwrap(), 1);
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn test_rules_and_implicit_target_column() {
        let db = open_test_db("meta");
        exec_all(
            &db.conn,
            &[
                "CREATE TABLE parent (id INTEGER PRIMARY KEY)",
                "CREATE TABLE child (pid INTEGER REFERENCES parent ON DELETE CASCADE ON UPDATE SET NULL)",
            ],
        );
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_imported_keys("child").unwrap();
        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string_by_name("PKCOLUMN_NAME").unwrap(), Some("id".to_string()));
        assert_eq!(rs.get_long_by_name("DELETE_RULE").unwrap(), 0);
        assert_eq!(rs.get_long_by_name("UPDATE_RULE").unwrap(), 2);
        assert_eq!(rs.get_string_by_name("FK_NAME").unwrap(), None);
        assert_eq!(rs.get_long_by_name("DEFERRABILITY").unwrap(), 5);
    }

    #[test]
    fn test_composite_foreign_key_sequence() {
        let db = open_test_db("meta");
        exec_all(
            &db.conn,
            &[
                "CREATE TABLE p (x INT, y INT, CONSTRAINT pk_p PRIMARY KEY (x, y))",
                "CREATE TABLE c (a INT, b INT, CONSTRAINT fk_ab FOREIGN KEY (a, b) REFERENCES p (x, y))",
            ],
        );
        let meta = db.conn.metadata().unwrap();

        let rows = rows_of(&mut meta.get_imported_keys("c").unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][7], text("a"));
        assert_eq!(rows[0][8], Value::Integer(1));
        assert_eq!(rows[1][7], text("b"));
        assert_eq!(rows[1][8], Value::Integer(2));
        assert!(rows.iter().all(|row| row[11] == text("fk_ab") && row[12] == text("pk_p")));
    }

    #[test]
    fn test_dangling_reference_has_no_key_columns() {
        let db = open_test_db("meta");
        exec_all(
            &db.conn,
            &["CREATE TABLE orphan (gone_id INT REFERENCES gone)"],
        );
        let meta = db.conn.metadata().unwrap();

        let rows = rows_of(&mut meta.get_imported_keys("orphan").unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2], text("gone"));
        assert_eq!(rows[0][3], Value::Null);
    }

    #[test]
    fn test_exported_keys() {
        let db = catalog_db();
        exec_all(
            &db.conn,
            &["CREATE TABLE notes (author INTEGER REFERENCES people(id))"],
        );
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_exported_keys("people").unwrap();
        let rows = rows_of(&mut rs);
        let referencing: Vec<(Value, Value, Value)> = rows
            .iter()
            .map(|row| (row[6].clone(), row[7].clone(), row[11].clone()))
            .collect();
        assert_eq!(
            referencing,
            vec![
                (text("notes"), text("author"), Value::Null),
                (text("orders"), text("person_id"), text("fk_person")),
            ]
        );
        assert!(rows.iter().all(|row| row[2] == text("people") && row[3] == text("id")));

        assert!(!meta.get_exported_keys("orders").unwrap().next().unwrap());
    }

    #[test]
    fn test_cross_reference_between_two_tables() {
        let db = catalog_db();
        exec_all(
            &db.conn,
            &[
                "CREATE TABLE shops (id INTEGER PRIMARY KEY)",
                "CREATE TABLE visits (who INTEGER REFERENCES people(id), shop INTEGER, \
                   CONSTRAINT fk_shop FOREIGN KEY (shop) REFERENCES shops(id))",
            ],
        );
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta
            .get_cross_reference(Some("people"), Some("orders"))
            .unwrap();
        assert_eq!(rs.column_names(), FOREIGN_KEYS_COLUMNS.to_vec());
        let rows = rows_of(&mut rs);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2], text("people"));
        assert_eq!(rows[0][6], text("orders"));
        assert_eq!(rows[0][11], text("fk_person"));

        // Only the key pointing at the given primary table is listed
        let rows = rows_of(&mut meta.get_cross_reference(Some("SHOPS"), Some("visits")).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][7], text("shop"));
        assert_eq!(rows[0][11], text("fk_shop"));

        let mut rs = meta
            .get_cross_reference(Some("orders"), Some("people"))
            .unwrap();
        assert!(!rs.next().unwrap());
        assert!(matches!(
            meta.get_cross_reference(Some("nope"), Some("orders")).unwrap_err(),
            Error::TableNotFound(_)
        ));
    }

    #[test]
    fn test_cross_reference_with_one_side() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();

        assert_eq!(
            rows_of(&mut meta.get_cross_reference(Some("people"), None).unwrap()),
            rows_of(&mut meta.get_exported_keys("people").unwrap())
        );
        assert_eq!(
            rows_of(&mut meta.get_cross_reference(None, Some("orders")).unwrap()),
            rows_of(&mut meta.get_imported_keys("orders").unwrap())
        );

        let mut rs = meta.get_cross_reference(None, None).unwrap();
        assert_eq!(rs.column_names().len(), 14);
        assert!(!rs.next().unwrap());
    }
}

mod indexes {
    use super::*;

    #[test]
    fn test_index_info_order() {
        let db = catalog_db();
        exec_all(
            &db.conn,
            &[
                "CREATE INDEX idx_name_score ON people (name, score)",
                "CREATE UNIQUE INDEX idx_email ON people (email)",
            ],
        );
        let meta = db.conn.metadata().unwrap();

        let mut rs = meta.get_index_info("people", false).unwrap();
        assert_eq!(rs.column_names(), INDEX_INFO_COLUMNS.to_vec());
        let rows = rows_of(&mut rs);
        let listed: Vec<(Value, Value, Value, Value)> = rows
            .iter()
            .map(|row| (row[3].clone(), row[5].clone(), row[7].clone(), row[8].clone()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (Value::Integer(0), text("idx_email"), Value::Integer(1), text("email")),
                (Value::Integer(1), text("idx_name_score"), Value::Integer(1), text("name")),
                (Value::Integer(1), text("idx_name_score"), Value::Integer(2), text("score")),
            ]
        );

        let unique = rows_of(&mut meta.get_index_info("people", true).unwrap());
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0][5], text("idx_email"));
    }

    #[test]
    fn test_table_without_indexes() {
        let db = catalog_db();
        let meta = db.conn.metadata().unwrap();
        assert!(!meta.get_index_info("orders", false).unwrap().next().unwrap());
    }
}

#[test]
fn test_type_info_rows() {
    let db = open_test_db("meta");
    let meta = db.conn.metadata().unwrap();
    let mut rs = meta.get_type_info().unwrap();
    assert_eq!(rs.column_names(), TYPE_INFO_COLUMNS.to_vec());

    let rows = rows_of(&mut rs);
    let listed: Vec<(Value, Value)> = rows.iter().map(|row| (row[0].clone(), row[1].clone())).collect();
    assert_eq!(
        listed,
        vec![
            (text("NULL"), Value::Integer(0)),
            (text("INTEGER"), Value::Integer(4)),
            (text("REAL"), Value::Integer(7)),
            (text("TEXT"), Value::Integer(12)),
            (text("BLOB"), Value::Integer(2004)),
        ]
    );
    // Only INTEGER auto-increments, only TEXT is case sensitive
    assert_eq!(rows[1][11], Value::Integer(1));
    assert_eq!(rows[3][7], Value::Integer(1));
    assert_eq!(rows[2][7], Value::Integer(0));
}

#[test]
fn test_empty_catalog_listings_keep_their_layout() {
    let db = catalog_db();
    let meta = db.conn.metadata().unwrap();

    let mut rs = meta.get_best_row_identifier("people").unwrap();
    assert_eq!(rs.column_names(), ROW_IDENTIFIER_COLUMNS.to_vec());
    assert!(!rs.next().unwrap());

    let mut rs = meta.get_version_columns("people").unwrap();
    assert_eq!(rs.column_names().len(), 8);
    assert!(!rs.next().unwrap());

    let mut rs = meta.get_procedures(None).unwrap();
    assert_eq!(rs.column_names(), PROCEDURES_COLUMNS.to_vec());
    assert!(!rs.next().unwrap());
}

#[test]
fn test_debug_output_names_the_connection() {
    let db = catalog_db();
    let meta = db.conn.metadata().unwrap();
    assert!(format!("{meta:?}").starts_with("DatabaseMetaData"));
}

#[test]
fn test_catalog_calls_leave_no_handles() {
    let db = catalog_db();
    let meta = db.conn.metadata().unwrap();
    let baseline = db.conn.open_handle_count().unwrap();

    meta.get_tables(None, None).unwrap();
    meta.get_columns(None, None).unwrap();
    meta.get_primary_keys("people").unwrap();
    meta.get_imported_keys("orders").unwrap();
    meta.get_exported_keys("people").unwrap();
    meta.get_index_info("people", false).unwrap();
    meta.get_cross_reference(Some("people"), Some("orders")).unwrap();
    let _ = meta.get_primary_keys("missing");

    assert_eq!(db.conn.open_handle_count().unwrap(), baseline);
}

#[test]
fn test_metadata_after_close() {
    let db = catalog_db();
    let meta = db.conn.metadata().unwrap();
    db.conn.close().unwrap();
    assert!(meta.get_tables(None, None).unwrap_err().is_usage());
    assert!(db.conn.metadata().unwrap_err().is_usage());
}
