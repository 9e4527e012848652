//! Auto-commit, transaction and savepoint tests with a real database

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::unwrap_used)]

use super::test_utils::{column_values, exec_all, open_test_db};
use crate::{TransactionMode, Value};

fn count_rows(conn: &crate::Connection) -> Vec<Value> {
    column_values(conn, "SELECT count(*) FROM items")
}

fn insert_item(conn: &crate::Connection, name: &str) {
    let mut ps = conn
        .prepare_statement("INSERT INTO items (name) VALUES (?)")
        .unwrap();
    ps.set_string(1, Some(name)).unwrap();
    ps.execute_update().unwrap();
}

const ITEMS_DDL: &str = "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)";

mod auto_commit {
    use super::*;

    #[test]
    fn test_connection_starts_in_auto_commit() {
        let db = open_test_db("tx");
        assert!(db.conn.get_auto_commit().unwrap());
    }

    #[test]
    fn test_commit_and_rollback_require_manual_mode() {
        let db = open_test_db("tx");
        assert!(db.conn.commit().unwrap_err().is_usage());
        assert!(db.conn.rollback().unwrap_err().is_usage());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let db = open_test_db("tx");
        exec_all(&db.conn, &[ITEMS_DDL]);

        db.conn.set_auto_commit(false).unwrap();
        insert_item(&db.conn, "kept");
        db.conn.commit().unwrap();

        // A new transaction is already open; rolling it back keeps the commit
        db.conn.rollback().unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(1)]);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let db = open_test_db("tx");
        exec_all(&db.conn, &[ITEMS_DDL]);

        db.conn.set_auto_commit(false).unwrap();
        insert_item(&db.conn, "gone");
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(1)]);
        db.conn.rollback().unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(0)]);
    }

    #[test]
    fn test_returning_to_auto_commit_commits() {
        let db = open_test_db("tx");
        exec_all(&db.conn, &[ITEMS_DDL]);

        db.conn.set_auto_commit(false).unwrap();
        insert_item(&db.conn, "a");
        db.conn.set_auto_commit(true).unwrap();
        assert!(db.conn.get_auto_commit().unwrap());
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(1)]);

        // Setting the same value again is a no-op
        db.conn.set_auto_commit(true).unwrap();
    }

    #[test]
    fn test_transaction_reopened_after_plain_commit() {
        let db = open_test_db("tx");
        exec_all(&db.conn, &[ITEMS_DDL]);

        db.conn.set_auto_commit(false).unwrap();
        insert_item(&db.conn, "first");
        exec_all(&db.conn, &["COMMIT"]);

        // Manual mode is still on, so the next write opens a new transaction
        insert_item(&db.conn, "second");
        db.conn.rollback().unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(1)]);
    }

    #[test]
    fn test_transaction_mode_setting() {
        let db = open_test_db("tx");
        exec_all(&db.conn, &[ITEMS_DDL]);
        assert_eq!(db.conn.transaction_mode().unwrap(), TransactionMode::Deferred);

        db.conn
            .set_transaction_mode(TransactionMode::Immediate)
            .unwrap();
        assert_eq!(
            db.conn.transaction_mode().unwrap(),
            TransactionMode::Immediate
        );

        db.conn.set_auto_commit(false).unwrap();
        insert_item(&db.conn, "x");
        db.conn.commit().unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(1)]);
    }

    #[test]
    fn test_closed_connection_rejects_transaction_calls() {
        let db = open_test_db("tx");
        db.conn.close().unwrap();
        assert!(db.conn.is_closed());
        assert!(db.conn.set_auto_commit(false).unwrap_err().is_usage());
        assert!(db.conn.get_auto_commit().unwrap_err().is_usage());
        assert!(db.conn.set_savepoint().unwrap_err().is_usage());
    }
}

mod savepoints {
    use super::*;

    #[test]
    fn test_savepoint_leaves_auto_commit() {
        let db = open_test_db("savepoint");
        assert!(db.conn.get_auto_commit().unwrap());
        let sp = db.conn.set_savepoint().unwrap();
        assert!(!db.conn.get_auto_commit().unwrap());
        assert_eq!(sp.name(), None);
        assert_eq!(sp.sql_name(), format!("SQLITE_SAVEPOINT_{}", sp.id()));
    }

    #[test]
    fn test_savepoint_ids_increase() {
        let db = open_test_db("savepoint");
        let first = db.conn.set_savepoint().unwrap();
        let second = db.conn.set_named_savepoint("named").unwrap();
        let third = db.conn.set_savepoint().unwrap();
        assert!(first.id() < second.id());
        assert!(second.id() < third.id());
        assert_eq!(second.sql_name(), "named");
    }

    #[test]
    fn test_release_and_rollback_need_manual_mode() {
        let db = open_test_db("savepoint");
        let sp = db.conn.set_savepoint().unwrap();
        db.conn.set_auto_commit(true).unwrap();

        assert!(db.conn.release_savepoint(&sp).unwrap_err().is_usage());
        assert!(db.conn.rollback_to_savepoint(&sp).unwrap_err().is_usage());
    }

    #[test]
    fn test_rollback_to_savepoint() {
        let db = open_test_db("savepoint");
        exec_all(&db.conn, &[ITEMS_DDL]);

        let outer = db.conn.set_named_savepoint("outer").unwrap();
        insert_item(&db.conn, "a");
        let inner = db.conn.set_named_savepoint("inner").unwrap();
        insert_item(&db.conn, "b");

        db.conn.rollback_to_savepoint(&inner).unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(1)]);

        // The savepoint stays usable after a rollback to it
        insert_item(&db.conn, "c");
        db.conn.rollback_to_savepoint(&outer).unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(0)]);

        insert_item(&db.conn, "d");
        db.conn.release_savepoint(&outer).unwrap();
        db.conn.commit().unwrap();
        assert_eq!(
            column_values(&db.conn, "SELECT name FROM items"),
            vec![Value::Text("d".to_string())]
        );
    }

    #[test]
    fn test_release_folds_changes_into_transaction() {
        let db = open_test_db("savepoint");
        exec_all(&db.conn, &[ITEMS_DDL]);

        db.conn.set_auto_commit(false).unwrap();
        let sp = db.conn.set_savepoint().unwrap();
        insert_item(&db.conn, "a");
        db.conn.release_savepoint(&sp).unwrap();
        db.conn.rollback().unwrap();
        assert_eq!(count_rows(&db.conn), vec![Value::Integer(0)]);
    }

    #[test]
    fn test_unknown_savepoint_is_an_engine_error() {
        let db = open_test_db("savepoint");
        let sp = db.conn.set_named_savepoint("once").unwrap();
        db.conn.release_savepoint(&sp).unwrap();
        let err = db.conn.release_savepoint(&sp).unwrap_err();
        assert!(err.engine_code().is_some(), "unexpected error: {err}");
    }

    #[test]
    fn test_invalid_savepoint_names_are_rejected() {
        let db = open_test_db("savepoint");
        for name in ["", "1abc", "bad name", "x;DROP TABLE items"] {
            let err = db.conn.set_named_savepoint(name).unwrap_err();
            assert!(err.is_usage(), "{name:?} gave {err}");
        }
        // Nothing was started by the rejected calls
        assert!(db.conn.get_auto_commit().unwrap());
    }
}
