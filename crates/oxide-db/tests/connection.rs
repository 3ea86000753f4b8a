//! Connection behaviour over scripted drivers: lost-connection retries,
//! error classification, binding preparation, pretend mode, the query log
//! and the read/write split.

mod common;
use common::*;

use chrono::NaiveDate;
use oxide_db::{Connection, ConnectionConfig, Handles};
use oxide_query::prelude::*;
use oxide_query::{ConstraintKind, Dialect, DriverError};

#[test]
fn test_lost_connection_outside_transaction_reconnects_and_retries_once() {
    let (db, script) = scripted_dialect(Dialect::Mysql);
    fail_next(&script, lost_connection());
    push_rows(&script, vec![row(&[("id", SqlValue::Int(1))])]);

    let rows = db.select("SELECT * FROM `users` WHERE `id` = ?", &[SqlValue::Int(1)], true).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(reconnects(&script), 1);
    let calls = script.borrow().calls.clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[test]
fn test_lost_connection_inside_transaction_propagates_without_retry() {
    let (db, script) = scripted_dialect(Dialect::Mysql);
    db.begin_transaction().unwrap();
    fail_next(&script, lost_connection());

    let error = db.statement("UPDATE `users` SET `name` = ?", &[SqlValue::Text("x".into())]).unwrap_err();

    assert!(matches!(error, Error::Query(_)));
    assert_eq!(reconnects(&script), 0);
    assert_eq!(sqls(&script), ["BEGIN", "UPDATE `users` SET `name` = ?"]);
    assert_eq!(db.transaction_level(), 1);
}

#[test]
fn test_second_failure_after_reconnect_propagates() {
    let (db, script) = scripted_dialect(Dialect::Mysql);
    fail_next(&script, lost_connection());
    fail_next(&script, lost_connection());

    let error = db.statement("DELETE FROM `users`", &[]).unwrap_err();

    assert_eq!(reconnects(&script), 1);
    assert_eq!(sqls(&script).len(), 2);
    let exception = error.query_exception().unwrap();
    assert_eq!(exception.sql, "DELETE FROM `users`");
    assert_eq!(exception.connection.name, "main");
}

#[test]
fn test_other_failures_are_not_retried() {
    let (db, script) = scripted_dialect(Dialect::Sqlite);
    fail_next(&script, DriverError::new("no such table: users"));

    assert!(db.select("SELECT * FROM \"users\"", &[], true).is_err());
    assert_eq!(reconnects(&script), 0);
    assert_eq!(sqls(&script).len(), 1);
}

#[test]
fn test_lost_connection_without_reconnector() {
    let script = script();
    let db = Connection::new(
        "main",
        ConnectionConfig::new(Dialect::Pgsql),
        Handles::new(ScriptedDriver::boxed("write", &script)),
    );
    fail_next(&script, lost_connection());

    let error = db.statement("SELECT 1", &[]).unwrap_err();
    assert!(matches!(error, Error::LostConnection));
}

#[test]
fn test_disconnected_connection_reopens_before_running() {
    let (db, script) = scripted_dialect(Dialect::Sqlite);
    db.disconnect();
    assert!(!db.is_connected());

    db.statement("VACUUM", &[]).unwrap();

    assert!(db.is_connected());
    assert_eq!(reconnects(&script), 1);
    assert_eq!(sqls(&script), ["VACUUM"]);
}

#[test]
fn test_constraint_violations_are_classified_by_the_grammar() {
    let (db, script) = scripted_dialect(Dialect::Sqlite);
    fail_next(
        &script,
        DriverError::with_code("2067", "UNIQUE constraint failed: users.email"),
    );

    let error = db
        .table("users")
        .insert(vec![record! { "email" => "a@example.com" }])
        .unwrap_err();

    match error {
        Error::ConstraintViolation { kind, exception } => {
            assert_eq!(kind, ConstraintKind::Unique);
            assert_eq!(exception.sql, r#"INSERT INTO "users" ("email") VALUES (?)"#);
            assert_eq!(exception.bindings, [SqlValue::Text("a@example.com".into())]);
            assert_eq!(exception.connection.driver, "sqlite");
        }
        other => panic!("expected a constraint violation, got {other:?}"),
    }
}

#[test]
fn test_bindings_are_prepared_for_the_dialect() {
    let (db, script) = scripted_dialect(Dialect::Sqlite);
    let day = NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();

    db.table("events")
        .insert(vec![record! { "active" => true, "at" => day }])
        .unwrap();

    let calls = script.borrow().calls.clone();
    assert_eq!(
        calls[0].bindings,
        [SqlValue::Int(1), SqlValue::Text("2024-03-09 08:30:00".into())]
    );
}

#[test]
fn test_pretend_logs_without_touching_the_database() {
    let (db, script) = scripted_dialect(Dialect::Mysql);

    let log = db
        .pretend(|db| {
            let affected = db
                .table("users")
                .where_eq("id", 1)
                .update(record! { "name" => "Ada" })?;
            assert_eq!(affected, 0);
            assert!(db.table("users").get()?.is_empty());
            db.transaction(|db| db.statement("DELETE FROM `sessions`", &[]), 1)?;
            Ok(())
        })
        .unwrap();

    assert!(sqls(&script).is_empty());
    let logged: Vec<&str> = log.iter().map(|entry| entry.sql.as_str()).collect();
    assert_eq!(
        logged,
        [
            "UPDATE `users` SET `name` = ? WHERE `id` = ?",
            "SELECT * FROM `users`",
            "DELETE FROM `sessions`",
        ]
    );
    assert_eq!(log[0].bindings, [SqlValue::Text("Ada".into()), SqlValue::Int(1)]);
    assert!(!db.pretending());
    assert_eq!(db.transaction_level(), 0);
    assert!(!db.has_modified_records());
}

#[test]
fn test_pretend_restores_the_previous_query_log() {
    let (db, _script) = scripted_dialect(Dialect::Sqlite);
    db.enable_query_log();
    db.statement("SELECT 1", &[]).unwrap();

    let log = db.pretend(|db| db.statement("SELECT 2", &[]).map(|_| ())).unwrap();

    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sql, "SELECT 2");
    let kept: Vec<String> = db.query_log().into_iter().map(|entry| entry.sql).collect();
    assert_eq!(kept, ["SELECT 1"]);
    assert!(db.logging());
}

#[test]
fn test_query_log_is_opt_in() {
    let (db, _script) = scripted_dialect(Dialect::Sqlite);
    db.statement("SELECT 1", &[]).unwrap();
    assert!(db.query_log().is_empty());

    db.enable_query_log();
    db.statement("SELECT ?", &[SqlValue::Int(2)]).unwrap();
    let log = db.query_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].bindings, [SqlValue::Int(2)]);
    assert!(log[0].time_ms >= 0.0);

    db.flush_query_log();
    db.disable_query_log();
    db.statement("SELECT 3", &[]).unwrap();
    assert!(db.query_log().is_empty());
}

#[test]
fn test_failed_statements_are_not_logged() {
    let (db, script) = scripted_dialect(Dialect::Sqlite);
    db.enable_query_log();
    fail_next(&script, DriverError::new("syntax error"));
    assert!(db.statement("SELEC 1", &[]).is_err());
    assert!(db.query_log().is_empty());
}

#[test]
fn test_reads_use_the_replica_outside_transactions() {
    let (db, script) = with_replica(false);

    db.table("users").get().unwrap();
    db.begin_transaction().unwrap();
    db.table("users").get().unwrap();
    db.commit().unwrap();
    db.table("users").lock_for_update().get().unwrap();

    assert_eq!(
        handles_used(&script),
        ["read", "write", "write", "write", "write"]
    );
}

#[test]
fn test_sticky_connections_read_their_own_writes() {
    let (db, script) = with_replica(true);

    db.table("users").get().unwrap();
    db.table("users").insert(vec![record! { "name" => "Ada" }]).unwrap();
    db.table("users").get().unwrap();
    db.forget_record_modification_state();
    db.table("users").get().unwrap();

    assert_eq!(handles_used(&script), ["read", "write", "write", "read"]);
}

#[test]
fn test_non_sticky_connections_keep_reading_from_the_replica() {
    let (db, script) = with_replica(false);

    db.table("users").insert(vec![record! { "name" => "Ada" }]).unwrap();
    db.table("users").get().unwrap();
    db.use_write_connection_when_reading(true);
    db.table("users").get().unwrap();

    assert_eq!(handles_used(&script), ["write", "read", "write"]);
}

#[test]
fn test_affecting_statements_without_changes_do_not_stick() {
    let (db, script) = with_replica(true);
    script.borrow_mut().affected = 0;

    db.table("users").where_eq("id", 99).delete().unwrap();
    db.table("users").get().unwrap();

    assert_eq!(handles_used(&script), ["write", "read"]);
}

#[test]
fn test_scalar_reads_the_single_column() {
    let (db, script) = scripted_dialect(Dialect::Pgsql);
    push_rows(&script, vec![row(&[("n", SqlValue::Int(3))])]);
    push_rows(&script, vec![row(&[("a", SqlValue::Int(1)), ("b", SqlValue::Int(2))])]);
    push_rows(&script, vec![]);

    assert_eq!(db.scalar("SELECT COUNT(*) AS n", &[], true).unwrap(), SqlValue::Int(3));
    assert!(matches!(
        db.scalar("SELECT 1 AS a, 2 AS b", &[], true),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(db.scalar("SELECT 1 WHERE 0", &[], true).unwrap(), SqlValue::Null);
}

#[test]
fn test_unprepared_marks_records_modified() {
    let (db, script) = with_replica(true);
    db.unprepared("CREATE TABLE t (id INTEGER)").unwrap();
    db.table("t").get().unwrap();
    assert_eq!(handles_used(&script), ["write", "write"]);
}
