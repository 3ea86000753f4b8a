#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use oxide_db::{
    Connection, ConnectionConfig, DatabaseConfig, DatabaseManager, Driver, DriverRegistry,
    DriverResult, Execution, Handles, ReadConfig,
};
use oxide_query::{Dialect, DriverError, Row, SqlValue};

/// One call seen by a scripted driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub handle: &'static str,
    pub sql: String,
    pub bindings: Vec<SqlValue>,
}

/// Shared behaviour and history of every handle of one connection.
#[derive(Debug)]
pub struct Script {
    pub calls: Vec<Call>,
    pub failures: VecDeque<DriverError>,
    pub fail_on: Vec<(String, DriverError)>,
    pub rows: VecDeque<Vec<Row>>,
    pub affected: u64,
    pub reconnects: u32,
}

pub type Shared = Rc<RefCell<Script>>;

pub fn script() -> Shared {
    Rc::new(RefCell::new(Script {
        calls: Vec::new(),
        failures: VecDeque::new(),
        fail_on: Vec::new(),
        rows: VecDeque::new(),
        affected: 1,
        reconnects: 0,
    }))
}

/// Fails the next call, whatever it is.
pub fn fail_next(script: &Shared, error: DriverError) {
    script.borrow_mut().failures.push_back(error);
}

/// Fails the next call running exactly `sql`.
pub fn fail_on(script: &Shared, sql: &str, error: DriverError) {
    script.borrow_mut().fail_on.push((sql.to_string(), error));
}

pub fn push_rows(script: &Shared, rows: Vec<Row>) {
    script.borrow_mut().rows.push_back(rows);
}

pub fn sqls(script: &Shared) -> Vec<String> {
    script.borrow().calls.iter().map(|c| c.sql.clone()).collect()
}

pub fn handles_used(script: &Shared) -> Vec<&'static str> {
    script.borrow().calls.iter().map(|c| c.handle).collect()
}

pub fn reconnects(script: &Shared) -> u32 {
    script.borrow().reconnects
}

/// A driver that records calls and fails on demand.
pub struct ScriptedDriver {
    handle: &'static str,
    script: Shared,
}

impl ScriptedDriver {
    pub fn boxed(handle: &'static str, script: &Shared) -> Box<dyn Driver> {
        Box::new(Self {
            handle,
            script: Rc::clone(script),
        })
    }

    fn call(&self, sql: &str, bindings: &[SqlValue]) -> DriverResult<()> {
        let mut script = self.script.borrow_mut();
        script.calls.push(Call {
            handle: self.handle,
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        if let Some(index) = script.fail_on.iter().position(|(s, _)| s == sql) {
            return Err(script.fail_on.remove(index).1);
        }
        match script.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Driver for ScriptedDriver {
    fn select(&mut self, sql: &str, bindings: &[SqlValue]) -> DriverResult<Vec<Row>> {
        self.call(sql, bindings)?;
        Ok(self.script.borrow_mut().rows.pop_front().unwrap_or_default())
    }

    fn execute(&mut self, sql: &str, bindings: &[SqlValue]) -> DriverResult<Execution> {
        self.call(sql, bindings)?;
        Ok(Execution {
            rows_affected: self.script.borrow().affected,
            last_insert_id: Some(1),
        })
    }

    fn unprepared(&mut self, sql: &str) -> DriverResult<()> {
        self.call(sql, &[])
    }

    fn last_insert_id(&mut self, _sequence: Option<&str>) -> DriverResult<SqlValue> {
        Ok(SqlValue::Int(1))
    }
}

fn open(script: &Shared, with_read: bool) -> Handles {
    let handles = Handles::new(ScriptedDriver::boxed("write", script));
    if with_read {
        handles.with_read(ScriptedDriver::boxed("read", script))
    } else {
        handles
    }
}

/// A connection over scripted handles whose reconnector counts calls.
pub fn scripted(config: ConnectionConfig) -> (Connection, Shared) {
    let script = script();
    let with_read = config.read.is_some();
    let reconnect_script = Rc::clone(&script);
    let connection = Connection::new("main", config, open(&script, with_read)).with_reconnector(
        Box::new(move || {
            reconnect_script.borrow_mut().reconnects += 1;
            Ok(open(&reconnect_script, with_read))
        }),
    );
    (connection, script)
}

pub fn scripted_dialect(dialect: Dialect) -> (Connection, Shared) {
    scripted(ConnectionConfig::new(dialect).database("app"))
}

pub fn with_replica(sticky: bool) -> (Connection, Shared) {
    let config = ConnectionConfig::new(Dialect::Mysql)
        .database("app")
        .read(ReadConfig {
            host: Some("replica".into()),
            ..ReadConfig::default()
        })
        .sticky(sticky);
    scripted(config)
}

pub fn lost_connection() -> DriverError {
    DriverError::new("SQLSTATE[HY000]: General error: 2006 MySQL server has gone away")
}

pub fn deadlock() -> DriverError {
    DriverError::with_code("40001", "Deadlock found when trying to get lock; try restarting transaction")
}

/// A manager with one in-memory SQLite connection.
pub fn sqlite_manager() -> DatabaseManager {
    let config = DatabaseConfig::single("main", ConnectionConfig::sqlite_memory());
    DatabaseManager::new(config, DriverRegistry::with_defaults())
}

pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    Row::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
}
