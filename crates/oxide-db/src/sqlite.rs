//! SQLite driver backed by `sqlx`.

use std::str::FromStr;

use oxide_query::{DriverError, Row, SqlValue};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row as _, Sqlite, TypeInfo, ValueRef};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverResult, Execution};

/// One SQLite connection driven on a private current-thread runtime.
pub struct SqliteDriver {
    // Dropped before the runtime that drives it.
    connection: SqliteConnection,
    runtime: Runtime,
    last_insert_id: i64,
}

impl SqliteDriver {
    /// Opens the database named by `config`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Fails if the runtime cannot start or the database cannot be opened.
    pub fn connect(config: &ConnectionConfig) -> DriverResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DriverError::new(e.to_string()))?;

        let options = match config.database.as_deref() {
            Some(path) if !config.is_memory() => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            _ => SqliteConnectOptions::from_str("sqlite::memory:").map_err(driver_error)?,
        }
        .foreign_keys(config.foreign_key_constraints);

        let connection = runtime.block_on(options.connect()).map_err(driver_error)?;
        debug!(database = ?config.database, "Opened SQLite connection");

        Ok(Self {
            connection,
            runtime,
            last_insert_id: 0,
        })
    }

    /// Boxed constructor for the driver registry.
    ///
    /// # Errors
    ///
    /// See [`SqliteDriver::connect`].
    pub fn factory(config: &ConnectionConfig) -> DriverResult<Box<dyn Driver>> {
        Ok(Box::new(Self::connect(config)?))
    }
}

impl Driver for SqliteDriver {
    fn select(&mut self, sql: &str, bindings: &[SqlValue]) -> DriverResult<Vec<Row>> {
        let query = bindings.iter().cloned().fold(sqlx::query(sql), bind_value);
        let rows = self
            .runtime
            .block_on(query.fetch_all(&mut self.connection))
            .map_err(driver_error)?;
        rows.iter().map(convert_row).collect()
    }

    fn execute(&mut self, sql: &str, bindings: &[SqlValue]) -> DriverResult<Execution> {
        let query = bindings.iter().cloned().fold(sqlx::query(sql), bind_value);
        let result = self
            .runtime
            .block_on(query.execute(&mut self.connection))
            .map_err(driver_error)?;
        self.last_insert_id = result.last_insert_rowid();
        Ok(Execution {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(self.last_insert_id),
        })
    }

    fn unprepared(&mut self, sql: &str) -> DriverResult<()> {
        self.runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.connection))
            .map_err(driver_error)?;
        Ok(())
    }

    fn last_insert_id(&mut self, _sequence: Option<&str>) -> DriverResult<SqlValue> {
        Ok(SqlValue::Int(self.last_insert_id))
    }
}

/// Binds a `SqlValue` parameter to a raw query.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
        SqlValue::Date(d) => query.bind(d),
        SqlValue::Time(t) => query.bind(t),
        SqlValue::Timestamp(ts) => query.bind(ts),
    }
}

/// Decodes a row by the storage class of each value. Columns declared
/// `BOOLEAN` come back as booleans.
fn convert_row(row: &SqliteRow) -> DriverResult<Row> {
    let mut names = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index).map_err(driver_error)?;
        let storage = if raw.is_null() {
            None
        } else {
            Some(raw.type_info().name().to_string())
        };
        let declared = column.type_info().name().to_uppercase();

        let value = match storage.as_deref() {
            None => SqlValue::Null,
            Some("INTEGER") if declared.contains("BOOL") => {
                SqlValue::Bool(row.try_get_unchecked::<i64, _>(index).map_err(driver_error)? != 0)
            }
            Some("INTEGER") => SqlValue::Int(row.try_get_unchecked(index).map_err(driver_error)?),
            Some("REAL") => SqlValue::Float(row.try_get_unchecked(index).map_err(driver_error)?),
            Some("BLOB") => SqlValue::Blob(row.try_get_unchecked(index).map_err(driver_error)?),
            Some(_) => SqlValue::Text(row.try_get_unchecked(index).map_err(driver_error)?),
        };

        names.push(column.name().to_string());
        values.push(value);
    }

    Ok(Row::new(names, values))
}

/// Keeps the SQLite extended result code so grammars can classify it.
fn driver_error(error: sqlx::Error) -> DriverError {
    match &error {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => DriverError::with_code(code.into_owned(), db.message()),
            None => DriverError::new(db.message()),
        },
        _ => DriverError::new(error.to_string()),
    }
}
