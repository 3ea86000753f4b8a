//! # oxide-query
//!
//! A fluent SQL query builder that compiles one query model to several SQL
//! dialects.
//!
//! This crate provides:
//! - A [`Builder`] accumulating SELECT, INSERT, UPDATE, DELETE and UPSERT
//!   intent, with bindings kept per clause so they always match placeholder
//!   order
//! - A [`Grammar`] per dialect (Standard, MySQL, MariaDB, PostgreSQL,
//!   SQLite, SQL Server) turning that intent into SQL text
//! - The [`ConnectionInterface`] contract a driver implements to execute it
//!
//! ## Dialects
//!
//! The same intent compiles differently per dialect:
//!
//! ```rust
//! use oxide_query::Dialect;
//!
//! let mysql = Dialect::Mysql.grammar("");
//! let sqlsrv = Dialect::Sqlsrv.grammar("");
//!
//! assert_eq!(mysql.wrap("users.name as n"), "`users`.`name` AS `n`");
//! assert_eq!(sqlsrv.wrap("users.name as n"), "[users].[name] AS [n]");
//! ```
//!
//! ## SQL Injection Prevention
//!
//! Values never reach the SQL text: every comparison value is emitted as a
//! `?` placeholder and returned as a binding. Only [`Expression`]s, created
//! explicitly with [`raw`], are inlined verbatim.

pub mod connection;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod processor;
pub mod query;
pub mod value;

pub use connection::ConnectionInterface;
pub use error::{ConnectionDetails, ConstraintKind, DriverError, Error, QueryException, Result};
pub use expression::{Expression, raw};
pub use grammar::{Dialect, Grammar, Statement, UpsertColumn};
pub use processor::{DefaultProcessor, Processor, ReturningProcessor};
pub use query::{
    BindingSlot, Builder, Conditions, Direction, IntoSubquery, JoinClause, LengthAwarePaginator,
    MacroRegistry, Paginator,
};
pub use value::{Param, Record, Row, SqlValue, ToSqlValue};

/// Commonly used items.
pub mod prelude {
    pub use crate::connection::ConnectionInterface;
    pub use crate::error::{Error, Result};
    pub use crate::expression::raw;
    pub use crate::query::{Builder, Conditions, Direction, IntoSubquery};
    pub use crate::record;
    pub use crate::value::{Param, Record, SqlValue};
}
