//! Named connections and the drivers that open them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use oxide_query::{Dialect, DriverError, MacroRegistry};
use tracing::debug;

use crate::config::{ConnectionConfig, DatabaseConfig};
use crate::connection::Connection;
use crate::driver::{Driver, DriverResult, Handles};
use crate::error::{DbError, Result};
use crate::sqlite::SqliteDriver;

/// Opens one physical handle from configuration.
pub type DriverFactory = Box<dyn Fn(&ConnectionConfig) -> DriverResult<Box<dyn Driver>>>;

/// Maps each dialect to the factory that opens its handles.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<Dialect, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the bundled SQLite driver.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Dialect::Sqlite, SqliteDriver::factory);
        registry
    }

    /// Registers `factory` for `dialect`, replacing any previous one.
    pub fn register<F>(&mut self, dialect: Dialect, factory: F)
    where
        F: Fn(&ConnectionConfig) -> DriverResult<Box<dyn Driver>> + 'static,
    {
        self.factories.insert(dialect, Box::new(factory));
    }

    /// Returns true if `dialect` has a factory.
    #[must_use]
    pub fn supports(&self, dialect: Dialect) -> bool {
        self.factories.contains_key(&dialect)
    }

    /// Opens the write handle and, if configured, the read handle.
    ///
    /// # Errors
    ///
    /// Fails if no factory is registered or a handle cannot be opened.
    pub fn connect(&self, config: &ConnectionConfig) -> DriverResult<Handles> {
        let factory = self
            .factories
            .get(&config.driver)
            .ok_or_else(|| DriverError::new(format!("Unsupported driver [{}]", config.driver)))?;
        let mut handles = Handles::new(factory(config)?);
        if let Some(read) = config.read_config() {
            handles = handles.with_read(factory(&read)?);
        }
        Ok(handles)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut drivers: Vec<&str> = self.factories.keys().map(|d| d.as_str()).collect();
        drivers.sort_unstable();
        f.debug_struct("DriverRegistry").field("drivers", &drivers).finish()
    }
}

/// Resolves and caches connections by name.
///
/// ```
/// use oxide_db::{ConnectionConfig, DatabaseConfig, DatabaseManager, DriverRegistry};
///
/// let config = DatabaseConfig::single("main", ConnectionConfig::sqlite_memory());
/// let manager = DatabaseManager::new(config, DriverRegistry::with_defaults());
/// let first = manager.connection(None).unwrap();
/// let again = manager.connection(Some("main")).unwrap();
/// assert!(std::rc::Rc::ptr_eq(&first, &again));
/// ```
pub struct DatabaseManager {
    config: DatabaseConfig,
    registry: Rc<DriverRegistry>,
    macros: Option<MacroRegistry>,
    connections: RefCell<HashMap<String, Rc<Connection>>>,
}

impl DatabaseManager {
    /// Creates a manager over `config`.
    #[must_use]
    pub fn new(config: DatabaseConfig, registry: DriverRegistry) -> Self {
        Self {
            config,
            registry: Rc::new(registry),
            macros: None,
            connections: RefCell::new(HashMap::new()),
        }
    }

    /// Builder macros given to every connection this manager creates.
    #[must_use]
    pub fn with_macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = Some(macros);
        self
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Name of the default connection.
    #[must_use]
    pub fn default_connection_name(&self) -> &str {
        &self.config.default
    }

    /// Returns the named connection (the default for `None`), opening it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Fails if the name is not configured, the driver is not registered or
    /// the database cannot be opened.
    pub fn connection(&self, name: Option<&str>) -> Result<Rc<Connection>> {
        let name = name.unwrap_or(&self.config.default);
        if let Some(connection) = self.connections.borrow().get(name) {
            return Ok(Rc::clone(connection));
        }

        let connection = Rc::new(self.make_connection(name)?);
        self.connections
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&connection));
        Ok(connection)
    }

    fn make_connection(&self, name: &str) -> Result<Connection> {
        let config = self.config.connection(name)?.clone();
        if !self.registry.supports(config.driver) {
            return Err(DbError::UnsupportedDriver(config.driver.to_string()));
        }

        let handles = self.registry.connect(&config)?;
        debug!(connection = %name, driver = %config.driver, "Opened connection");

        let registry = Rc::clone(&self.registry);
        let reconnect_config = config.clone();
        let mut connection = Connection::new(name, config, handles)
            .with_reconnector(Box::new(move || registry.connect(&reconnect_config)));
        if let Some(macros) = &self.macros {
            connection = connection.with_macros(macros.clone());
        }
        Ok(connection)
    }

    /// Re-opens the named connection's handles, creating it if needed.
    ///
    /// # Errors
    ///
    /// Propagates connection failures.
    pub fn reconnect(&self, name: Option<&str>) -> Result<Rc<Connection>> {
        let name = name.unwrap_or(&self.config.default);
        let cached = self.connections.borrow().get(name).cloned();
        match cached {
            Some(connection) => {
                connection.reconnect()?;
                Ok(connection)
            }
            None => self.connection(Some(name)),
        }
    }

    /// Closes the named connection's handles, keeping it cached.
    pub fn disconnect(&self, name: Option<&str>) {
        let name = name.unwrap_or(&self.config.default);
        if let Some(connection) = self.connections.borrow().get(name) {
            connection.disconnect();
        }
    }

    /// Disconnects and forgets the named connection.
    pub fn purge(&self, name: Option<&str>) {
        let name = name.unwrap_or(&self.config.default);
        if let Some(connection) = self.connections.borrow_mut().remove(name) {
            connection.disconnect();
        }
    }

    /// Names of the connections opened so far.
    #[must_use]
    pub fn connections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("default", &self.config.default)
            .field("open", &self.connections())
            .finish_non_exhaustive()
    }
}
