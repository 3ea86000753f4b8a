//! A named database connection.
//!
//! [`Connection`] is the execution boundary the query builder talks to. It
//! prepares bindings for its grammar, picks the read or write handle,
//! times and logs every statement, classifies failures, and reconnects
//! once when a statement outside a transaction hits a dropped connection.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::{Duration, Instant};

use oxide_query::{
    ConnectionInterface, DriverError, Error, Grammar, MacroRegistry, Processor, QueryException,
    Result, Row, SqlValue,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::detect;
use crate::driver::{Driver, DriverResult, Handles};

/// Re-opens the physical handles after the connection was lost.
pub type Reconnector = Box<dyn Fn() -> DriverResult<Handles>>;

/// A statement recorded by the query log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedQuery {
    /// SQL text.
    pub sql: String,
    /// Prepared bindings.
    pub bindings: Vec<SqlValue>,
    /// Elapsed milliseconds.
    pub time_ms: f64,
}

/// A database connection with transaction state and an optional replica.
pub struct Connection {
    name: String,
    config: ConnectionConfig,
    grammar: Box<dyn Grammar>,
    processor: Box<dyn Processor>,
    macros: Option<MacroRegistry>,
    write: RefCell<Option<Box<dyn Driver>>>,
    read: RefCell<Option<Box<dyn Driver>>>,
    reconnector: Option<Reconnector>,
    pub(crate) transactions: Cell<u32>,
    records_modified: Cell<bool>,
    read_on_write: Cell<bool>,
    pub(crate) pretending: Cell<bool>,
    logging_queries: Cell<bool>,
    query_log: RefCell<Vec<LoggedQuery>>,
}

impl Connection {
    /// Creates a connection over open handles.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ConnectionConfig, handles: Handles) -> Self {
        let connection = Self::lazy(name, config);
        connection.set_handles(handles);
        connection
    }

    /// Creates a connection that opens its handles through the reconnector
    /// on first use.
    #[must_use]
    pub fn lazy(name: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            name: name.into(),
            grammar: config.driver.grammar(&config.prefix),
            processor: config.driver.processor(),
            config,
            macros: None,
            write: RefCell::new(None),
            read: RefCell::new(None),
            reconnector: None,
            transactions: Cell::new(0),
            records_modified: Cell::new(false),
            read_on_write: Cell::new(false),
            pretending: Cell::new(false),
            logging_queries: Cell::new(false),
            query_log: RefCell::new(Vec::new()),
        }
    }

    /// Sets the callback used to re-open lost handles.
    #[must_use]
    pub fn with_reconnector(mut self, reconnector: Reconnector) -> Self {
        self.reconnector = Some(reconnector);
        self
    }

    /// Makes builder macros available on this connection.
    #[must_use]
    pub fn with_macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = Some(macros);
        self
    }

    /// Configuration this connection was created from.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Replaces both handles.
    pub fn set_handles(&self, handles: Handles) {
        *self.write.borrow_mut() = Some(handles.write);
        *self.read.borrow_mut() = handles.read;
    }

    /// Drops both handles. The next statement reconnects.
    pub fn disconnect(&self) {
        self.write.borrow_mut().take();
        self.read.borrow_mut().take();
    }

    /// Returns true while a write handle is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.write.borrow().is_some()
    }

    /// Re-opens the handles through the reconnector.
    ///
    /// # Errors
    ///
    /// [`Error::LostConnection`] without a reconnector, or
    /// [`Error::Connection`] if re-opening fails.
    pub fn reconnect(&self) -> Result<()> {
        let Some(reconnector) = &self.reconnector else {
            return Err(Error::LostConnection);
        };
        self.disconnect();
        let handles = reconnector().map_err(Error::Connection)?;
        self.set_handles(handles);
        debug!(connection = %self.name, "Reconnected");
        Ok(())
    }

    pub(crate) fn reconnect_if_missing_connection(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            self.reconnect()
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Runs a SELECT and returns its first row.
    ///
    /// # Errors
    ///
    /// Propagates statement failures.
    pub fn select_one(&self, sql: &str, bindings: &[SqlValue], use_read_connection: bool) -> Result<Option<Row>> {
        Ok(self.select(sql, bindings, use_read_connection)?.into_iter().next())
    }

    /// Runs a SELECT returning a single column and returns the first value.
    ///
    /// # Errors
    ///
    /// Fails if the query selects more than one column.
    pub fn scalar(&self, sql: &str, bindings: &[SqlValue], use_read_connection: bool) -> Result<SqlValue> {
        let Some(row) = self.select_one(sql, bindings, use_read_connection)? else {
            return Ok(SqlValue::Null);
        };
        if row.len() > 1 {
            return Err(Error::invalid_argument("the query selected more than one column"));
        }
        Ok(row.into_values().into_iter().next().unwrap_or(SqlValue::Null))
    }

    /// Runs SQL text without bindings or preparation.
    ///
    /// # Errors
    ///
    /// Propagates statement failures.
    pub fn unprepared(&self, sql: &str) -> Result<bool> {
        let ran = self.run(sql, &[], false, || true, |driver, sql, _| {
            driver.unprepared(sql)?;
            Ok(true)
        })?;
        self.mark_modified(true);
        Ok(ran)
    }

    /// Runs `sql` on the write handle outside the query log. Used for
    /// savepoints.
    pub(crate) fn exec_on_write(&self, sql: &str) -> Result<()> {
        if self.pretending.get() {
            return Ok(());
        }
        self.with_driver(false, |driver| driver.unprepared(sql))
            .map_err(|error| self.query_error(sql, &[], error))
    }

    /// Runs a statement through the grammar's binding preparation, the
    /// pretend switch, lost-connection handling and the query log.
    fn run<T>(
        &self,
        sql: &str,
        bindings: &[SqlValue],
        use_read_connection: bool,
        pretended: impl FnOnce() -> T,
        callback: impl Fn(&mut dyn Driver, &str, &[SqlValue]) -> DriverResult<T>,
    ) -> Result<T> {
        let bindings = self.prepare_bindings(bindings);
        let start = Instant::now();

        let result = if self.pretending.get() {
            pretended()
        } else {
            self.reconnect_if_missing_connection()?;
            match self.run_query_callback(sql, &bindings, use_read_connection, &callback) {
                Ok(result) => result,
                Err(error) => self.handle_query_exception(
                    error,
                    sql,
                    &bindings,
                    use_read_connection,
                    &callback,
                )?,
            }
        };

        self.log_query(sql, bindings, start.elapsed());
        Ok(result)
    }

    fn run_query_callback<T>(
        &self,
        sql: &str,
        bindings: &[SqlValue],
        use_read_connection: bool,
        callback: &impl Fn(&mut dyn Driver, &str, &[SqlValue]) -> DriverResult<T>,
    ) -> Result<T> {
        self.with_driver(use_read_connection, |driver| callback(driver, sql, bindings))
            .map_err(|error| self.query_error(sql, bindings, error))
    }

    /// Retries once after reconnecting when the connection was lost, but
    /// only outside a transaction.
    fn handle_query_exception<T>(
        &self,
        error: Error,
        sql: &str,
        bindings: &[SqlValue],
        use_read_connection: bool,
        callback: &impl Fn(&mut dyn Driver, &str, &[SqlValue]) -> DriverResult<T>,
    ) -> Result<T> {
        if self.transactions.get() >= 1 {
            return Err(error);
        }
        if !error.driver_error().is_some_and(detect::caused_by_lost_connection) {
            return Err(error);
        }
        warn!(connection = %self.name, error = %error, "Lost connection, reconnecting");
        self.reconnect()?;
        self.run_query_callback(sql, bindings, use_read_connection, callback)
    }

    /// Calls `f` with the replica when reads may use it, else the write
    /// handle.
    pub(crate) fn with_driver<T>(
        &self,
        use_read_connection: bool,
        f: impl FnOnce(&mut dyn Driver) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let mut slot = if use_read_connection && self.reads_from_replica() {
            self.read.borrow_mut()
        } else {
            self.write.borrow_mut()
        };
        match slot.as_deref_mut() {
            Some(driver) => f(driver),
            None => Err(DriverError::new("Lost connection: no open handle")),
        }
    }

    fn reads_from_replica(&self) -> bool {
        self.transactions.get() == 0
            && !self.read_on_write.get()
            && !(self.config.sticky && self.records_modified.get())
            && self.read.borrow().is_some()
    }

    /// Wraps a driver error with the statement, classifying constraint
    /// violations.
    pub(crate) fn query_error(&self, sql: &str, bindings: &[SqlValue], source: DriverError) -> Error {
        let exception = Box::new(QueryException {
            connection: self.config.details(&self.name),
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
            source,
        });
        match self.grammar.constraint_violation(&exception.source) {
            Some(kind) => Error::ConstraintViolation { kind, exception },
            None => Error::Query(exception),
        }
    }

    fn prepare_bindings(&self, bindings: &[SqlValue]) -> Vec<SqlValue> {
        bindings
            .iter()
            .cloned()
            .map(|value| self.grammar.prepare_binding(value))
            .collect()
    }

    // ------------------------------------------------------------------
    // Read/write split
    // ------------------------------------------------------------------

    /// Forces reads onto the write handle.
    pub fn use_write_connection_when_reading(&self, value: bool) {
        self.read_on_write.set(value);
    }

    /// Returns true once this connection has written.
    #[must_use]
    pub fn has_modified_records(&self) -> bool {
        self.records_modified.get()
    }

    /// Forgets previous writes, letting sticky connections read from the
    /// replica again.
    pub fn forget_record_modification_state(&self) {
        self.records_modified.set(false);
    }

    fn mark_modified(&self, modified: bool) {
        if modified && !self.pretending.get() {
            self.records_modified.set(true);
        }
    }

    // ------------------------------------------------------------------
    // Pretend mode and query log
    // ------------------------------------------------------------------

    /// Runs `callback` without touching the database and returns every
    /// statement it would have executed.
    ///
    /// Reads return no rows, statements report success and affecting
    /// statements report zero rows. The previous query log is restored
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns the callback's error.
    pub fn pretend(&self, callback: impl FnOnce(&Self) -> Result<()>) -> Result<Vec<LoggedQuery>> {
        let logging = self.logging_queries.replace(true);
        let previous = self.query_log.replace(Vec::new());
        let pretending = self.pretending.replace(true);

        let outcome = callback(self);

        self.pretending.set(pretending);
        self.logging_queries.set(logging);
        let log = self.query_log.replace(previous);
        outcome.map(|()| log)
    }

    /// Returns true inside [`Connection::pretend`].
    #[must_use]
    pub fn pretending(&self) -> bool {
        self.pretending.get()
    }

    /// Starts recording statements.
    pub fn enable_query_log(&self) {
        self.logging_queries.set(true);
    }

    /// Stops recording statements.
    pub fn disable_query_log(&self) {
        self.logging_queries.set(false);
    }

    /// Returns true while recording statements.
    #[must_use]
    pub fn logging(&self) -> bool {
        self.logging_queries.get()
    }

    /// Recorded statements.
    #[must_use]
    pub fn query_log(&self) -> Vec<LoggedQuery> {
        self.query_log.borrow().clone()
    }

    /// Clears the query log.
    pub fn flush_query_log(&self) {
        self.query_log.borrow_mut().clear();
    }

    fn log_query(&self, sql: &str, bindings: Vec<SqlValue>, elapsed: Duration) {
        let time_ms = elapsed.as_secs_f64() * 1000.0;
        debug!(
            connection = %self.name,
            sql = %sql,
            bindings = bindings.len(),
            elapsed_ms = time_ms,
            "Executed query"
        );
        if self.logging_queries.get() {
            self.query_log.borrow_mut().push(LoggedQuery {
                sql: sql.to_string(),
                bindings,
                time_ms,
            });
        }
    }
}

impl ConnectionInterface for Connection {
    fn name(&self) -> &str {
        &self.name
    }

    fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    fn processor(&self) -> &dyn Processor {
        self.processor.as_ref()
    }

    fn macros(&self) -> Option<&MacroRegistry> {
        self.macros.as_ref()
    }

    fn select(&self, sql: &str, bindings: &[SqlValue], use_read_connection: bool) -> Result<Vec<Row>> {
        self.run(sql, bindings, use_read_connection, Vec::new, |driver, sql, bindings| {
            driver.select(sql, bindings)
        })
    }

    fn statement(&self, sql: &str, bindings: &[SqlValue]) -> Result<bool> {
        let ran = self.run(sql, bindings, false, || true, |driver, sql, bindings| {
            driver.execute(sql, bindings)?;
            Ok(true)
        })?;
        self.mark_modified(true);
        Ok(ran)
    }

    fn affecting_statement(&self, sql: &str, bindings: &[SqlValue]) -> Result<u64> {
        let affected = self.run(sql, bindings, false, || 0, |driver, sql, bindings| {
            Ok(driver.execute(sql, bindings)?.rows_affected)
        })?;
        self.mark_modified(affected > 0);
        Ok(affected)
    }

    fn last_insert_id(&self, sequence: Option<&str>) -> Result<SqlValue> {
        if self.pretending.get() {
            return Ok(SqlValue::Null);
        }
        self.with_driver(false, |driver| driver.last_insert_id(sequence))
            .map_err(Error::Connection)
    }

    fn transaction_level(&self) -> u32 {
        self.transactions.get()
    }

    fn begin_transaction(&self) -> Result<()> {
        self.open_transaction()
    }

    fn commit(&self) -> Result<()> {
        self.commit_transaction()
    }

    fn rollback(&self) -> Result<()> {
        match self.transactions.get().checked_sub(1) {
            Some(level) => self.rollback_to(level),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("driver", &self.config.driver)
            .field("connected", &self.is_connected())
            .field("transactions", &self.transactions.get())
            .field("pretending", &self.pretending.get())
            .finish_non_exhaustive()
    }
}
