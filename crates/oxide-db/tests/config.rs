//! Configuration files and the connection manager.

use std::fs;

use oxide_db::{ConnectionConfig, DatabaseConfig, DatabaseManager, DbError, DriverRegistry};
use oxide_query::prelude::*;
use oxide_query::Dialect;

fn write_config(dir: &tempfile::TempDir, database: &str) -> std::path::PathBuf {
    let path = dir.path().join("database.json");
    let json = format!(
        r#"{{
            "default": "app",
            "connections": {{
                "app": {{ "driver": "sqlite", "database": "{database}", "prefix": "app_" }},
                "cache": {{ "driver": "sqlite", "database": ":memory:" }},
                "warehouse": {{ "driver": "mysql", "host": "db.internal", "database": "dw" }}
            }}
        }}"#
    );
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_loads_connections_from_a_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("app.sqlite");
    let path = write_config(&dir, &database.display().to_string());

    let config = DatabaseConfig::from_path(&path).unwrap();

    assert_eq!(config.default, "app");
    let app = config.connection("app").unwrap();
    assert_eq!(app.driver, Dialect::Sqlite);
    assert_eq!(app.prefix, "app_");
    assert!(app.foreign_key_constraints);
    assert!(config.connection("cache").unwrap().is_memory());
    assert_eq!(config.connection("warehouse").unwrap().driver, Dialect::Mysql);
}

#[test]
fn test_missing_default_connection_is_rejected() {
    let json = r#"{ "default": "nope", "connections": { "app": { "driver": "sqlite" } } }"#;
    let error = DatabaseConfig::from_json(json).unwrap_err();
    assert!(matches!(error, DbError::UnknownConnection(name) if name == "nope"));
}

#[test]
fn test_file_database_survives_a_purge() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("app.sqlite");
    let path = write_config(&dir, &database.display().to_string());
    let manager = DatabaseManager::new(
        DatabaseConfig::from_path(&path).unwrap(),
        DriverRegistry::with_defaults(),
    );

    let db = manager.connection(None).unwrap();
    db.unprepared("CREATE TABLE app_users (id INTEGER PRIMARY KEY, name TEXT)")
        .unwrap();
    db.table("users").insert(vec![record! { "name" => "Ada" }]).unwrap();
    drop(db);

    manager.purge(None);
    assert!(manager.connections().is_empty());
    assert!(database.exists());

    let db = manager.connection(Some("app")).unwrap();
    assert_eq!(db.table("users").count().unwrap(), 1);
    assert_eq!(manager.connections(), ["app"]);
}

#[test]
fn test_connections_are_cached_and_reconnected_in_place() {
    let config = DatabaseConfig::single("main", ConnectionConfig::sqlite_memory());
    let manager = DatabaseManager::new(config, DriverRegistry::with_defaults());

    let first = manager.connection(None).unwrap();
    let second = manager.connection(Some("main")).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &second));

    manager.disconnect(None);
    assert!(!first.is_connected());
    let reconnected = manager.reconnect(None).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &reconnected));
    assert!(first.is_connected());
}

#[test]
fn test_unknown_and_unsupported_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, ":memory:");
    let manager = DatabaseManager::new(
        DatabaseConfig::from_path(&path).unwrap(),
        DriverRegistry::with_defaults(),
    );

    assert!(matches!(
        manager.connection(Some("missing")).unwrap_err(),
        DbError::UnknownConnection(name) if name == "missing"
    ));
    assert!(matches!(
        manager.connection(Some("warehouse")).unwrap_err(),
        DbError::UnsupportedDriver(driver) if driver == "mysql"
    ));
}

#[test]
fn test_url_configuration_for_the_cli() {
    let config = DatabaseConfig::load(None, "sqlite::memory:").unwrap();
    assert_eq!(config.default, "default");
    assert!(config.connection("default").unwrap().is_memory());

    let config = DatabaseConfig::load(None, "postgres://app:secret@db:5433/shop").unwrap();
    let connection = config.connection("default").unwrap();
    assert_eq!(connection.driver, Dialect::Pgsql);
    assert_eq!(connection.port, Some(5433));
    assert_eq!(connection.database.as_deref(), Some("shop"));
}
