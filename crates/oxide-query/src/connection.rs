//! The contract a builder needs from a connection.

use crate::error::Result;
use crate::expression::Expression;
use crate::grammar::Grammar;
use crate::processor::Processor;
use crate::query::{Builder, MacroRegistry};
use crate::value::{Row, SqlValue};

/// Executes compiled SQL on behalf of a [`Builder`].
///
/// Implemented by `oxide_db::Connection`; tests implement it with a
/// recording fake.
pub trait ConnectionInterface {
    /// Configured connection name.
    fn name(&self) -> &str;

    /// Grammar compiling this connection's SQL.
    fn grammar(&self) -> &dyn Grammar;

    /// Post-processor for results.
    fn processor(&self) -> &dyn Processor;

    /// Builder macros available on this connection.
    fn macros(&self) -> Option<&MacroRegistry> {
        None
    }

    /// Runs a SELECT. `use_read_connection` allows routing to a replica.
    fn select(&self, sql: &str, bindings: &[SqlValue], use_read_connection: bool)
        -> Result<Vec<Row>>;

    /// Runs a SELECT on the write handle.
    fn select_from_write_connection(&self, sql: &str, bindings: &[SqlValue]) -> Result<Vec<Row>> {
        self.select(sql, bindings, false)
    }

    /// Runs an INSERT.
    fn insert(&self, sql: &str, bindings: &[SqlValue]) -> Result<bool> {
        self.statement(sql, bindings)
    }

    /// Runs an UPDATE, returning affected rows.
    fn update(&self, sql: &str, bindings: &[SqlValue]) -> Result<u64> {
        self.affecting_statement(sql, bindings)
    }

    /// Runs a DELETE, returning affected rows.
    fn delete(&self, sql: &str, bindings: &[SqlValue]) -> Result<u64> {
        self.affecting_statement(sql, bindings)
    }

    /// Runs a statement.
    fn statement(&self, sql: &str, bindings: &[SqlValue]) -> Result<bool>;

    /// Runs a statement, returning affected rows.
    fn affecting_statement(&self, sql: &str, bindings: &[SqlValue]) -> Result<u64>;

    /// Id generated by the last insert on the write handle.
    fn last_insert_id(&self, sequence: Option<&str>) -> Result<SqlValue>;

    /// Current transaction nesting depth.
    fn transaction_level(&self) -> u32;

    /// Starts a transaction or savepoint.
    fn begin_transaction(&self) -> Result<()>;

    /// Commits the innermost level.
    fn commit(&self) -> Result<()>;

    /// Rolls back the innermost level.
    fn rollback(&self) -> Result<()>;

    /// Wraps raw SQL.
    fn raw(&self, value: &str) -> Expression {
        Expression::new(value)
    }

    /// A builder on this connection.
    fn query(&self) -> Builder<'_>
    where
        Self: Sized,
    {
        Builder::new(self)
    }

    /// A builder on this connection selecting from `table`.
    fn table(&self, table: &str) -> Builder<'_>
    where
        Self: Sized,
    {
        Builder::new(self).from(table)
    }
}
