//! SQL Server grammar.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    Grammar, UpsertColumn, bool_to_int, escape_with, hex, json_field_and_path, json_path,
    prepare_temporal, record_bindings,
};
use crate::error::{ConstraintKind, DriverError};
use crate::query::bindings::BindingSlot;
use crate::query::state::{Column, Lock, QueryState, TableRef};
use crate::query::where_clause::DatePart;
use crate::value::{Param, Record, SqlValue};

const OPERATORS: &[&str] = &["&=", "|=", "^="];

static DUPLICATE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(cannot insert duplicate key row in object|violation of (unique key|primary key) constraint)")
        .expect("valid regex")
});

static CONFLICTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)conflicted with the (foreign key|reference|check) constraint")
        .expect("valid regex")
});

/// SQL Server grammar.
#[derive(Debug, Default, Clone)]
pub struct SqlServerGrammar {
    table_prefix: String,
}

impl SqlServerGrammar {
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
}

impl Grammar for SqlServerGrammar {
    fn name(&self) -> &'static str {
        "sqlsrv"
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('[', ']')
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn date_format(&self) -> &'static str {
        "%Y-%m-%d %H:%M:%S%.3f"
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = json_field_and_path(value);
        format!("JSON_VALUE({}, {})", self.wrap_segments(field), json_path(&path))
    }

    /// A limit without an offset becomes `TOP n`.
    fn compile_columns(&self, query: &QueryState, columns: &[Column]) -> String {
        if query.aggregate.is_some() {
            return String::new();
        }
        let mut select = String::from(if query.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        });
        if let (Some(limit), None) = (query.limit, query.offset) {
            select.push_str(&format!(" TOP {limit}"));
        }
        if columns.is_empty() {
            format!("{select} *")
        } else {
            format!("{select} {}", self.columnize(columns))
        }
    }

    /// Locks are table hints on the FROM target.
    fn compile_from(&self, query: &QueryState, table: &TableRef) -> String {
        let from = format!("FROM {}", self.wrap_table_ref(table));
        match &query.lock {
            None => from,
            Some(Lock::Update) => format!("{from} WITH (ROWLOCK, UPDLOCK, HOLDLOCK)"),
            Some(Lock::Shared) => format!("{from} WITH (ROWLOCK, HOLDLOCK)"),
            Some(Lock::Raw(sql)) => format!("{from} {sql}"),
        }
    }

    fn compile_lock(&self, _query: &QueryState, _lock: &Lock) -> String {
        String::new()
    }

    /// OFFSET/FETCH requires an ORDER BY.
    fn compile_select_orders(&self, query: &QueryState) -> String {
        if query.orders.is_empty() && query.offset.is_some() {
            return "ORDER BY (SELECT 0)".to_string();
        }
        self.compile_orders(query, &query.orders)
    }

    /// Emitted by `TOP` or together with the offset.
    fn compile_limit(&self, _query: &QueryState, _limit: u64) -> String {
        String::new()
    }

    fn compile_offset(&self, query: &QueryState, offset: u64) -> String {
        match query.limit {
            Some(limit) => format!("OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY"),
            None => format!("OFFSET {offset} ROWS"),
        }
    }

    fn compile_union_orders(&self, query: &QueryState) -> String {
        if query.union_orders.is_empty() && (query.union_limit.is_some() || query.union_offset.is_some()) {
            return "ORDER BY (SELECT 0)".to_string();
        }
        self.compile_orders(query, &query.union_orders)
    }

    /// A union has no `TOP`, so any limit goes through OFFSET/FETCH.
    fn compile_union_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), offset) => format!(
                "OFFSET {} ROWS FETCH NEXT {limit} ROWS ONLY",
                offset.unwrap_or(0)
            ),
            (None, Some(offset)) => format!("OFFSET {offset} ROWS"),
            (None, None) => String::new(),
        }
    }

    fn compile_random(&self, _seed: &str) -> String {
        "NEWID()".to_string()
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("SELECT * FROM ({sql}) AS {}", self.wrap_table("temp_table"))
    }

    fn where_date(&self, part: DatePart, column: &Column, operator: &str, value: &Param) -> String {
        let column = self.wrap_column(column);
        let lhs = match part {
            DatePart::Date => format!("CAST({column} AS DATE)"),
            DatePart::Time => format!("CAST({column} AS TIME)"),
            DatePart::Day | DatePart::Month | DatePart::Year => {
                format!("{}({column})", part.as_str().to_ascii_uppercase())
            }
        };
        format!("{lhs} {} {}", self.operator(operator), self.parameter(value))
    }

    fn compile_exists(&self, query: &QueryState) -> String {
        format!(
            "SELECT CASE WHEN EXISTS({}) THEN 1 ELSE 0 END AS {}",
            self.compile_select(query),
            self.wrap_value("exists")
        )
    }

    fn compile_insert_get_id(&self, query: &QueryState, values: &Record, sequence: Option<&str>) -> String {
        format!(
            "SET NOCOUNT ON;{};SELECT SCOPE_IDENTITY() AS {}",
            self.compile_insert(query, std::slice::from_ref(values)),
            self.wrap(sequence.unwrap_or("id"))
        )
    }

    fn compile_upsert(
        &self,
        query: &QueryState,
        values: &[Record],
        unique_by: &[String],
        update: &[UpsertColumn],
    ) -> crate::Result<String> {
        let table = query.from.as_ref().map_or("", TableRef::as_str);
        let columns = values.first().map_or_else(String::new, |row| {
            row.iter()
                .map(|(column, _)| self.wrap(column))
                .collect::<Vec<_>>()
                .join(", ")
        });
        let parameters = values
            .iter()
            .map(|row| format!("({})", self.parameterize_record(row)))
            .collect::<Vec<_>>()
            .join(", ");
        let on = unique_by
            .iter()
            .map(|column| {
                format!(
                    "{} = {}",
                    self.wrap(&format!("merge_source.{column}")),
                    self.wrap(&format!("{table}.{column}"))
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let mut sql = format!(
            "MERGE {} USING (VALUES {parameters}) {} ({columns}) ON {on} ",
            self.query_table(query),
            self.wrap_table("merge_source")
        );
        if !update.is_empty() {
            let assignments = update
                .iter()
                .map(|column| match column {
                    UpsertColumn::Excluded(name) => format!(
                        "{} = {}",
                        self.wrap(name),
                        self.wrap(&format!("merge_source.{name}"))
                    ),
                    UpsertColumn::Set(name, value) => {
                        format!("{} = {}", self.wrap(name), self.parameter(value))
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!("WHEN MATCHED THEN UPDATE SET {assignments} "));
        }
        sql.push_str(&format!(
            "WHEN NOT MATCHED THEN INSERT ({columns}) VALUES ({columns});"
        ));
        Ok(sql)
    }

    fn compile_update_with_joins(&self, query: &QueryState, table: &str, columns: &str, wheres: &str) -> String {
        let alias = query.from.as_ref().map_or("", TableRef::alias);
        let joins = self.compile_joins(query, &query.joins);
        super::concatenate(&[
            format!("UPDATE {} SET {columns} FROM {table} {joins}", self.wrap(alias)),
            wheres.to_string(),
        ])
    }

    fn prepare_bindings_for_update(&self, query: &QueryState, values: &Record) -> Vec<SqlValue> {
        let mut prepared: Vec<SqlValue> = record_bindings(values).collect();
        prepared.extend(
            query
                .bindings
                .flatten_except(&[BindingSlot::Select, BindingSlot::Order]),
        );
        prepared
    }

    fn compile_delete_without_joins(&self, query: &QueryState, table: &str, wheres: &str) -> String {
        let head = match query.limit {
            Some(limit) => format!("DELETE TOP ({limit}) FROM {table}"),
            None => format!("DELETE FROM {table}"),
        };
        super::concatenate(&[head, wheres.to_string()])
    }

    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {name}")
    }

    fn compile_savepoint_rollback(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {name}")
    }

    fn prepare_binding(&self, value: SqlValue) -> SqlValue {
        bool_to_int(prepare_temporal(value, self.date_format()))
    }

    fn escape(&self, value: &SqlValue) -> String {
        escape_with(&self.prepare_binding(value.clone()), |bytes| {
            format!("0x{}", hex(bytes))
        })
    }

    fn constraint_violation(&self, error: &DriverError) -> Option<ConstraintKind> {
        match error.code.as_deref() {
            Some("2627" | "2601") => return Some(ConstraintKind::Unique),
            Some("515") => return Some(ConstraintKind::NotNull),
            _ => {}
        }
        if DUPLICATE_KEY.is_match(&error.message) {
            return Some(ConstraintKind::Unique);
        }
        if let Some(caps) = CONFLICTED.captures(&error.message) {
            return Some(if caps[1].eq_ignore_ascii_case("check") {
                ConstraintKind::Check
            } else {
                ConstraintKind::ForeignKey
            });
        }
        if error.message.contains("Cannot insert the value NULL") {
            return Some(ConstraintKind::NotNull);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brackets_are_escaped() {
        let grammar = SqlServerGrammar::new();
        assert_eq!(grammar.wrap("users.name"), "[users].[name]");
        assert_eq!(grammar.wrap_value("a]b"), "[a]]b]");
    }

    #[test]
    fn test_duplicate_key_message_is_unique_violation() {
        let grammar = SqlServerGrammar::new();
        let error = DriverError::new(
            "Cannot insert duplicate key row in object 'dbo.users' with unique index 'users_email_unique'.",
        );
        assert_eq!(grammar.constraint_violation(&error), Some(ConstraintKind::Unique));
        let fk = DriverError::with_code(
            "547",
            "The INSERT statement conflicted with the FOREIGN KEY constraint \"fk\".",
        );
        assert_eq!(grammar.constraint_violation(&fk), Some(ConstraintKind::ForeignKey));
    }

    #[test]
    fn test_savepoint_syntax() {
        let grammar = SqlServerGrammar::new();
        assert_eq!(grammar.compile_savepoint("trans2"), "SAVE TRANSACTION trans2");
        assert_eq!(
            grammar.compile_savepoint_rollback("trans2"),
            "ROLLBACK TRANSACTION trans2"
        );
    }
}
