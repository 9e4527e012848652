//! Tests for ddl.rs - constraint recovery from stored table definitions
//!
//! These tests exercise the text scan in isolation; the metadata tests cover
//! how its output is merged with introspection data.

use crate::ddl::{
    assign_foreign_key_names, foreign_key_clauses, has_autoincrement, primary_key_clause,
    resolve_constraints,
};
use crate::models::{ForeignKeyInfo, ForeignKeyRule, PrimaryKeyInfo};

fn key(id: i64, seq: i64, local: &str, table: &str) -> ForeignKeyInfo {
    ForeignKeyInfo {
        name: None,
        id,
        seq,
        local_column: local.to_string(),
        referenced_table: table.to_string(),
        referenced_column: None,
        update_rule: ForeignKeyRule::NoAction,
        delete_rule: ForeignKeyRule::NoAction,
    }
}

mod primary_keys {
    use super::*;

    #[test]
    fn test_named_composite_primary_key() {
        let pk = primary_key_clause(
            "CREATE TABLE t (c1 INT, c2 INT, CONSTRAINT pk_t PRIMARY KEY (c2, c1))",
        );
        assert_eq!(
            pk,
            Some(PrimaryKeyInfo {
                name: Some("pk_t".to_string()),
                columns: vec!["c2".to_string(), "c1".to_string()],
            })
        );
    }

    #[test]
    fn test_named_key_spanning_lines() {
        let pk = primary_key_clause(
            "CREATE TABLE t (\n  a TEXT,\n  b TEXT,\n  constraint\n  \"My Key\"\n  primary key\n  (\n a , b )\n)",
        );
        let pk = pk.unwrap_or_default();
        assert_eq!(pk.name.as_deref(), Some("My Key"));
        assert_eq!(pk.columns, vec!["a", "b"]);
    }

    #[test]
    fn test_unnamed_table_constraint() {
        let pk = primary_key_clause("CREATE TABLE t (a INT, b INT, PRIMARY KEY (b, a))");
        assert_eq!(
            pk,
            Some(PrimaryKeyInfo {
                name: None,
                columns: vec!["b".to_string(), "a".to_string()],
            })
        );
    }

    #[test]
    fn test_sort_order_and_quotes_are_stripped() {
        let pk = primary_key_clause(
            "CREATE TABLE t (a INT, b INT, PRIMARY KEY (\"a\" DESC, [b] COLLATE NOCASE ASC))",
        );
        assert_eq!(pk.unwrap_or_default().columns, vec!["a", "b"]);
    }

    #[test]
    fn test_column_shorthand_is_left_to_introspection() {
        assert_eq!(
            primary_key_clause("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)"),
            None
        );
        assert_eq!(primary_key_clause("CREATE VIEW v AS SELECT 1"), None);
        assert_eq!(primary_key_clause(""), None);
    }
}

mod foreign_keys {
    use super::*;

    #[test]
    fn test_named_table_constraint() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE child (a INT, CONSTRAINT fk1 FOREIGN KEY(a) REFERENCES t(b))",
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].name.as_deref(), Some("fk1"));
        assert_eq!(clauses[0].columns, vec!["a"]);
        assert_eq!(clauses[0].referenced_table, "t");
    }

    #[test]
    fn test_unnamed_and_column_constraints_in_declaration_order() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE c (\n\
               x INT CONSTRAINT fk_x REFERENCES px(id),\n\
               y INT,\n\
               z INT,\n\
               FOREIGN KEY (y) REFERENCES py(id),\n\
               CONSTRAINT \"fk z\" FOREIGN KEY (z) REFERENCES \"pz\"(id)\n\
             )",
        );
        let names: Vec<Option<&str>> = clauses.iter().map(|c| c.name.as_deref()).collect();
        assert_eq!(names, vec![Some("fk_x"), None, Some("fk z")]);

        let tables: Vec<&str> = clauses.iter().map(|c| c.referenced_table.as_str()).collect();
        assert_eq!(tables, vec!["px", "py", "pz"]);
        assert_eq!(clauses[0].columns, vec!["x"]);
    }

    #[test]
    fn test_column_constraint_after_parenthesized_type() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE pay (id INT, amount NUMERIC(10,2) CONSTRAINT fk_amt REFERENCES prices(v))",
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].name.as_deref(), Some("fk_amt"));
        assert_eq!(clauses[0].columns, vec!["amount"]);
        assert_eq!(clauses[0].referenced_table, "prices");
    }

    #[test]
    fn test_composite_foreign_key_columns() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE c (a INT, b INT, CONSTRAINT fk_ab FOREIGN KEY (a, b) REFERENCES p (x, y))",
        );
        assert_eq!(clauses[0].columns, vec!["a", "b"]);
    }

    #[test]
    fn test_resolve_constraints_combines_both_scans() {
        let info = resolve_constraints(
            "CREATE TABLE c (id INT, p INT, CONSTRAINT pk_c PRIMARY KEY (id), CONSTRAINT fk_p FOREIGN KEY (p) REFERENCES parent(id))",
        );
        assert_eq!(info.primary_key.unwrap_or_default().name.as_deref(), Some("pk_c"));
        assert_eq!(info.foreign_keys.len(), 1);
        assert_eq!(info.foreign_keys[0].name.as_deref(), Some("fk_p"));
    }

    #[test]
    fn test_no_clauses_is_not_an_error() {
        let info = resolve_constraints("CREATE TABLE t (a INT)");
        assert!(info.primary_key.is_none());
        assert!(info.foreign_keys.is_empty());
    }
}

mod name_assignment {
    use super::*;

    #[test]
    fn test_names_follow_declaration_order() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE c (a INT, b INT, \
             CONSTRAINT fk_a FOREIGN KEY (a) REFERENCES p(id), \
             CONSTRAINT fk_b FOREIGN KEY (b) REFERENCES p(id))",
        );
        // The engine lists the last declared key first, with the lowest id
        let mut keys = vec![key(0, 0, "b", "p"), key(1, 0, "a", "p")];
        assign_foreign_key_names(&clauses, &mut keys);

        assert_eq!(keys[0].name.as_deref(), Some("fk_b"));
        assert_eq!(keys[1].name.as_deref(), Some("fk_a"));
    }

    #[test]
    fn test_matching_ignores_case() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE c (Parent_Id INT, CONSTRAINT fk FOREIGN KEY (Parent_Id) REFERENCES Parent(id))",
        );
        let mut keys = vec![key(0, 0, "parent_id", "PARENT")];
        assign_foreign_key_names(&clauses, &mut keys);
        assert_eq!(keys[0].name.as_deref(), Some("fk"));
    }

    #[test]
    fn test_every_column_pair_of_a_key_gets_the_name() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE c (a INT, b INT, CONSTRAINT fk_ab FOREIGN KEY (a, b) REFERENCES p (x, y))",
        );
        let mut keys = vec![key(0, 0, "a", "p"), key(0, 1, "b", "p")];
        assign_foreign_key_names(&clauses, &mut keys);
        assert!(keys.iter().all(|k| k.name.as_deref() == Some("fk_ab")));
    }

    #[test]
    fn test_unmatched_keys_stay_unnamed() {
        let clauses = foreign_key_clauses("CREATE TABLE c (a INT REFERENCES p(id))");
        let mut keys = vec![key(0, 0, "a", "p")];
        assign_foreign_key_names(&clauses, &mut keys);
        assert_eq!(keys[0].name, None);
    }

    #[test]
    fn test_unnamed_clause_consumes_its_match() {
        let clauses = foreign_key_clauses(
            "CREATE TABLE c (a INT, b INT, \
             FOREIGN KEY (a) REFERENCES p(id), \
             CONSTRAINT fk_b FOREIGN KEY (b) REFERENCES p(id))",
        );
        let mut keys = vec![key(0, 0, "b", "p"), key(1, 0, "a", "p")];
        assign_foreign_key_names(&clauses, &mut keys);
        assert_eq!(keys[0].name.as_deref(), Some("fk_b"));
        assert_eq!(keys[1].name, None);
    }
}

#[test]
fn test_autoincrement_detection() {
    assert!(has_autoincrement(
        "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)"
    ));
    assert!(has_autoincrement("create table t (id integer primary key autoincrement)"));
    assert!(!has_autoincrement("CREATE TABLE t (id INTEGER PRIMARY KEY)"));
}
