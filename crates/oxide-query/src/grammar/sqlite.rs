//! SQLite grammar.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    Grammar, Statement, UpsertColumn, bool_to_int, escape_with, hex, json_field_and_path,
    json_path, prepare_temporal, record_bindings, split_alias,
};
use crate::error::{ConstraintKind, DriverError};
use crate::query::state::{Column, Lock, QueryState};
use crate::query::where_clause::DatePart;
use crate::value::{Param, Record, SqlValue};

static CONSTRAINT_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(UNIQUE|PRIMARY KEY|FOREIGN KEY|NOT NULL|CHECK) constraint failed")
        .expect("valid regex")
});

/// SQLite grammar.
#[derive(Debug, Default, Clone)]
pub struct SqliteGrammar {
    table_prefix: String,
}

impl SqliteGrammar {
    /// Creates a grammar without a table prefix.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table_prefix: String::new(),
        }
    }

    /// Creates a grammar with a table prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
        }
    }

    /// `SELECT alias.rowid ...` restricted like `query`, for UPDATE and
    /// DELETE statements with joins or a limit.
    fn rowid_select(&self, query: &QueryState) -> String {
        let alias = query.from.as_ref().map_or("", |t| t.alias());
        let mut select = query.clone();
        select.columns = vec![Column::Name(format!("{alias}.rowid"))];
        self.compile_select(&select)
    }
}

impl Grammar for SqliteGrammar {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = json_field_and_path(value);
        format!("json_extract({}, {})", self.wrap_segments(field), json_path(&path))
    }

    fn where_date(&self, part: DatePart, column: &Column, operator: &str, value: &Param) -> String {
        let format = match part {
            DatePart::Date => "%Y-%m-%d",
            DatePart::Time => "%H:%M:%S",
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
        };
        format!(
            "strftime('{format}', {}) {} CAST({} AS TEXT)",
            self.wrap_column(column),
            self.operator(operator),
            self.parameter(value)
        )
    }

    /// SQLite requires a LIMIT before OFFSET.
    fn compile_offset(&self, query: &QueryState, offset: u64) -> String {
        if query.limit.is_some() {
            format!("OFFSET {offset}")
        } else {
            format!("LIMIT -1 OFFSET {offset}")
        }
    }

    fn compile_union_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    /// SQLite locks the whole database; row locks compile to nothing.
    fn compile_lock(&self, _query: &QueryState, _lock: &Lock) -> String {
        String::new()
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("SELECT * FROM ({sql})")
    }

    fn compile_insert_or_ignore(&self, query: &QueryState, values: &[Record]) -> crate::Result<String> {
        Ok(self
            .compile_insert(query, values)
            .replacen("INSERT", "INSERT OR IGNORE", 1))
    }

    fn compile_upsert(
        &self,
        query: &QueryState,
        values: &[Record],
        unique_by: &[String],
        update: &[UpsertColumn],
    ) -> crate::Result<String> {
        let unique = unique_by
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ");
        let columns = update
            .iter()
            .map(|column| match column {
                UpsertColumn::Excluded(name) => format!(
                    "{} = {}.{}",
                    self.wrap_value(name),
                    self.wrap_value("excluded"),
                    self.wrap_value(name)
                ),
                UpsertColumn::Set(name, value) => {
                    format!("{} = {}", self.wrap(name), self.parameter(value))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} ON CONFLICT ({unique}) DO UPDATE SET {columns}",
            self.compile_insert(query, values)
        ))
    }

    fn compile_update(&self, query: &QueryState, values: &Record) -> String {
        let table = self.query_table(query);
        let columns = self.compile_update_columns(query, values);
        if query.joins.is_empty() && query.limit.is_none() {
            let wheres = self.compile_wheres(query);
            return self.compile_update_without_joins(query, &table, &columns, &wheres);
        }
        format!(
            "UPDATE {table} SET {columns} WHERE {} IN ({})",
            self.wrap_value("rowid"),
            self.rowid_select(query)
        )
    }

    /// SQLite rejects qualified columns in SET.
    fn compile_update_columns(&self, _query: &QueryState, values: &Record) -> String {
        values
            .iter()
            .map(|(column, value)| {
                let name = column.rsplit('.').next().unwrap_or(column);
                format!("{} = {}", self.wrap(name), self.parameter(value))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn prepare_bindings_for_update(&self, query: &QueryState, values: &Record) -> Vec<SqlValue> {
        let mut prepared: Vec<SqlValue> = record_bindings(values).collect();
        prepared.extend(super::row_id_subselect_bindings(query));
        prepared
    }

    fn compile_delete(&self, query: &QueryState) -> String {
        let table = self.query_table(query);
        if query.joins.is_empty() && query.limit.is_none() {
            let wheres = self.compile_wheres(query);
            return self.compile_delete_without_joins(query, &table, &wheres);
        }
        format!(
            "DELETE FROM {table} WHERE {} IN ({})",
            self.wrap_value("rowid"),
            self.rowid_select(query)
        )
    }

    fn prepare_bindings_for_delete(&self, query: &QueryState) -> Vec<SqlValue> {
        super::row_id_subselect_bindings(query)
    }

    fn compile_sequence_exists(&self) -> Option<String> {
        Some(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE name = 'sqlite_sequence') AS \"exists\""
                .to_string(),
        )
    }

    /// Clears the table and resets its autoincrement sequence.
    fn compile_truncate(&self, query: &QueryState, reset_sequence: bool) -> Vec<Statement> {
        let delete = (format!("DELETE FROM {}", self.query_table(query)), Vec::new());
        if !reset_sequence {
            return vec![delete];
        }
        let name = query.from.as_ref().map_or("", |t| t.as_str());
        let name = split_alias(name).map_or(name, |(table, _)| table);
        vec![
            (
                "DELETE FROM sqlite_sequence WHERE name = ?".to_string(),
                vec![SqlValue::Text(format!("{}{name}", self.table_prefix))],
            ),
            delete,
        ]
    }

    fn prepare_binding(&self, value: SqlValue) -> SqlValue {
        bool_to_int(prepare_temporal(value, self.date_format()))
    }

    fn escape(&self, value: &SqlValue) -> String {
        escape_with(&self.prepare_binding(value.clone()), |bytes| {
            format!("X'{}'", hex(bytes))
        })
    }

    fn constraint_violation(&self, error: &DriverError) -> Option<ConstraintKind> {
        match error.code.as_deref() {
            Some("2067" | "1555") => return Some(ConstraintKind::Unique),
            Some("787") => return Some(ConstraintKind::ForeignKey),
            Some("1299") => return Some(ConstraintKind::NotNull),
            Some("275") => return Some(ConstraintKind::Check),
            _ => {}
        }
        let kind = CONSTRAINT_FAILED.captures(&error.message).map(|caps| match &caps[1] {
            "UNIQUE" | "PRIMARY KEY" => ConstraintKind::Unique,
            "FOREIGN KEY" => ConstraintKind::ForeignKey,
            "NOT NULL" => ConstraintKind::NotNull,
            _ => ConstraintKind::Check,
        });
        kind.or_else(|| error.has_code("19").then_some(ConstraintKind::Other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_messages() {
        let grammar = SqliteGrammar::new();
        let unique = DriverError::new("UNIQUE constraint failed: users.email");
        assert_eq!(grammar.constraint_violation(&unique), Some(ConstraintKind::Unique));
        let fk = DriverError::with_code("787", "FOREIGN KEY constraint failed");
        assert_eq!(grammar.constraint_violation(&fk), Some(ConstraintKind::ForeignKey));
        let missing = DriverError::new("no such table: users");
        assert_eq!(grammar.constraint_violation(&missing), None);
    }

    #[test]
    fn test_json_extract() {
        assert_eq!(
            SqliteGrammar::new().wrap("options->language"),
            "json_extract(\"options\", '$.\"language\"')"
        );
    }
}
