//! The physical statement executor behind a connection.

use oxide_query::{DriverError, Row, SqlValue};

/// Result type for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Execution {
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Row id generated by an insert, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// Runs SQL with bound values on one physical connection.
///
/// Drivers are synchronous; async clients block on their own runtime.
/// Bindings arrive already prepared by the grammar.
pub trait Driver {
    /// Runs a query returning rows.
    fn select(&mut self, sql: &str, bindings: &[SqlValue]) -> DriverResult<Vec<Row>>;

    /// Runs a write statement.
    fn execute(&mut self, sql: &str, bindings: &[SqlValue]) -> DriverResult<Execution>;

    /// Runs SQL text without preparing it.
    fn unprepared(&mut self, sql: &str) -> DriverResult<()>;

    /// Id generated by the last insert.
    fn last_insert_id(&mut self, sequence: Option<&str>) -> DriverResult<SqlValue>;

    /// Starts a transaction.
    fn begin(&mut self) -> DriverResult<()> {
        self.unprepared("BEGIN")
    }

    /// Commits the open transaction.
    fn commit(&mut self) -> DriverResult<()> {
        self.unprepared("COMMIT")
    }

    /// Rolls back the open transaction.
    fn roll_back(&mut self) -> DriverResult<()> {
        self.unprepared("ROLLBACK")
    }
}

/// The write handle and an optional read replica.
pub struct Handles {
    /// Handle for writes and transactional reads.
    pub write: Box<dyn Driver>,
    /// Replica for plain reads.
    pub read: Option<Box<dyn Driver>>,
}

impl Handles {
    /// Write handle only.
    #[must_use]
    pub fn new(write: Box<dyn Driver>) -> Self {
        Self { write, read: None }
    }

    /// Adds a read handle.
    #[must_use]
    pub fn with_read(mut self, read: Box<dyn Driver>) -> Self {
        self.read = Some(read);
        self
    }
}

impl std::fmt::Debug for Handles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handles")
            .field("read", &self.read.is_some())
            .finish_non_exhaustive()
    }
}
