#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use oxide_query::{
    ConnectionInterface, Dialect, Grammar, MacroRegistry, Processor, Result, Row, SqlValue,
};

/// One statement seen by the fake connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Logged {
    pub sql: String,
    pub bindings: Vec<SqlValue>,
    pub use_read_connection: bool,
}

/// Records every statement and answers SELECTs from a queue of canned rows.
pub struct FakeConnection {
    grammar: Box<dyn Grammar>,
    processor: Box<dyn Processor>,
    macros: Option<MacroRegistry>,
    responses: RefCell<VecDeque<Vec<Row>>>,
    log: RefCell<Vec<Logged>>,
    affected: Cell<u64>,
    level: Cell<u32>,
}

impl FakeConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            grammar: dialect.grammar(""),
            processor: dialect.processor(),
            macros: None,
            responses: RefCell::new(VecDeque::new()),
            log: RefCell::new(Vec::new()),
            affected: Cell::new(1),
            level: Cell::new(0),
        }
    }

    pub fn with_macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = Some(macros);
        self
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.responses.borrow_mut().push_back(rows);
    }

    pub fn set_affected(&self, affected: u64) {
        self.affected.set(affected);
    }

    pub fn log(&self) -> Vec<Logged> {
        self.log.borrow().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.borrow().iter().map(|l| l.sql.clone()).collect()
    }

    pub fn last(&self) -> Logged {
        self.log
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no statement was run"))
    }

    fn record(&self, sql: &str, bindings: &[SqlValue], use_read_connection: bool) {
        self.log.borrow_mut().push(Logged {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
            use_read_connection,
        });
    }
}

impl ConnectionInterface for FakeConnection {
    fn name(&self) -> &str {
        "fake"
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
        self.record(sql, bindings, use_read_connection);
        Ok(self.responses.borrow_mut().pop_front().unwrap_or_default())
    }

    fn statement(&self, sql: &str, bindings: &[SqlValue]) -> Result<bool> {
        self.record(sql, bindings, false);
        Ok(true)
    }

    fn affecting_statement(&self, sql: &str, bindings: &[SqlValue]) -> Result<u64> {
        self.record(sql, bindings, false);
        Ok(self.affected.get())
    }

    fn last_insert_id(&self, _sequence: Option<&str>) -> Result<SqlValue> {
        Ok(SqlValue::Int(42))
    }

    fn transaction_level(&self) -> u32 {
        self.level.get()
    }

    fn begin_transaction(&self) -> Result<()> {
        self.level.set(self.level.get() + 1);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.level.set(self.level.get().saturating_sub(1));
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.level.set(self.level.get().saturating_sub(1));
        Ok(())
    }
}

pub fn sqlite() -> FakeConnection {
    FakeConnection::new(Dialect::Sqlite)
}

pub fn mysql() -> FakeConnection {
    FakeConnection::new(Dialect::Mysql)
}

pub fn pgsql() -> FakeConnection {
    FakeConnection::new(Dialect::Pgsql)
}

pub fn sqlsrv() -> FakeConnection {
    FakeConnection::new(Dialect::Sqlsrv)
}

pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    Row::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
}

pub fn int(n: i64) -> SqlValue {
    SqlValue::Int(n)
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}
