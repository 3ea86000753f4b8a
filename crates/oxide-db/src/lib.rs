//! # oxide-db
//!
//! Database connections for [`oxide_query`] builders.
//!
//! This crate provides:
//! - [`Connection`], which executes compiled SQL with per-dialect binding
//!   preparation, a query log, pretend mode, a read/write split and a
//!   transaction state machine with savepoints
//! - The [`Driver`] trait for physical statement execution, with a SQLite
//!   driver backed by `sqlx`
//! - [`DatabaseManager`], which opens and caches named connections from a
//!   [`DatabaseConfig`]
//!
//! ## Example
//!
//! ```rust
//! use oxide_db::{ConnectionConfig, DatabaseConfig, DatabaseManager, DriverRegistry};
//! use oxide_query::prelude::*;
//!
//! let config = DatabaseConfig::single("main", ConnectionConfig::sqlite_memory());
//! let manager = DatabaseManager::new(config, DriverRegistry::with_defaults());
//! let db = manager.connection(None).unwrap();
//!
//! db.statement("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
//! db.table("users").insert(vec![record! { "name" => "Ada" }]).unwrap();
//!
//! assert_eq!(db.table("users").where_eq("name", "Ada").count().unwrap(), 1);
//! ```
//!
//! ## Retries
//!
//! A statement that fails because the connection dropped is retried once
//! after reconnecting, but only outside a transaction: inside one, the
//! server-side state is unknown and the error is returned as is.

pub mod config;
pub mod connection;
pub mod detect;
pub mod driver;
pub mod error;
pub mod manager;
pub mod sqlite;
mod transaction;

pub use config::{ConnectionConfig, DatabaseConfig, ReadConfig};
pub use connection::{Connection, LoggedQuery, Reconnector};
pub use driver::{Driver, DriverResult, Execution, Handles};
pub use error::{DbError, Result};
pub use manager::{DatabaseManager, DriverFactory, DriverRegistry};
pub use sqlite::SqliteDriver;
