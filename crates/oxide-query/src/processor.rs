//! Result post-processing.

use std::fmt;

use crate::connection::ConnectionInterface;
use crate::error::Result;
use crate::query::state::QueryState;
use crate::value::{Row, SqlValue};

/// Turns raw driver results into builder results.
pub trait Processor: fmt::Debug {
    /// Post-processes SELECT rows.
    fn process_select(&self, _query: &QueryState, rows: Vec<Row>) -> Vec<Row> {
        rows
    }

    /// Runs an insert-get-id statement and returns the new id.
    fn process_insert_get_id(
        &self,
        connection: &dyn ConnectionInterface,
        sql: &str,
        bindings: &[SqlValue],
        sequence: Option<&str>,
    ) -> Result<SqlValue> {
        connection.insert(sql, bindings)?;
        let id = connection.last_insert_id(sequence)?;
        Ok(normalize_id(id))
    }
}

/// Reads the id from the driver's last-insert-id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProcessor;

impl DefaultProcessor {
    /// Creates a new processor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Processor for DefaultProcessor {}

/// Reads the id from the row the insert statement returns
/// (`RETURNING` or `SCOPE_IDENTITY()`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ReturningProcessor;

impl ReturningProcessor {
    /// Creates a new processor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Processor for ReturningProcessor {
    fn process_insert_get_id(
        &self,
        connection: &dyn ConnectionInterface,
        sql: &str,
        bindings: &[SqlValue],
        sequence: Option<&str>,
    ) -> Result<SqlValue> {
        let rows = connection.select_from_write_connection(sql, bindings)?;
        let column = sequence.unwrap_or("id");
        let id = rows
            .first()
            .and_then(|row| row.get(column).or_else(|| row.get_index(0)))
            .cloned()
            .unwrap_or(SqlValue::Null);
        Ok(normalize_id(id))
    }
}

/// Numeric text ids become integers.
fn normalize_id(id: SqlValue) -> SqlValue {
    match id {
        SqlValue::Text(text) => text
            .parse::<i64>()
            .map_or(SqlValue::Text(text), SqlValue::Int),
        #[allow(clippy::cast_possible_truncation)]
        SqlValue::Float(f) if f.fract() == 0.0 => SqlValue::Int(f as i64),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(SqlValue::Text("12".into())), SqlValue::Int(12));
        assert_eq!(normalize_id(SqlValue::Float(7.0)), SqlValue::Int(7));
        assert_eq!(
            normalize_id(SqlValue::Text("abc".into())),
            SqlValue::Text("abc".into())
        );
    }
}
