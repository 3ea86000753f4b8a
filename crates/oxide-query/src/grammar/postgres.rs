//! PostgreSQL grammar.

use super::{Grammar, UpsertColumn, json_field_and_path, prepare_temporal};
use crate::query::state::{Column, QueryState};
use crate::query::where_clause::DatePart;
use crate::value::{Param, Record, SqlValue};

/// Operators spelled with `?` (`?`, `?|`, `?&`, `@?`) are left out since
/// `?` is the binding placeholder. `jsonb_exists` and friends cover them
/// through `where_raw`.
const OPERATORS: &[&str] = &[
    "between",
    "#",
    "<<=",
    ">>=",
    "&&",
    "@>",
    "<@",
    "||",
    "-",
    "@@",
    "#-",
    "is distinct from",
    "is not distinct from",
];

/// PostgreSQL grammar.
#[derive(Debug, Default, Clone)]
pub struct PostgresGrammar {
    table_prefix: String,
}

impl PostgresGrammar {
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

    /// `SELECT alias.ctid ...` restricted like `query`, for UPDATE and
    /// DELETE statements that Postgres cannot join or limit directly.
    fn ctid_select(&self, query: &QueryState) -> String {
        let alias = query.from.as_ref().map_or("", |t| t.alias());
        let mut select = query.clone();
        select.columns = vec![Column::Name(format!("{alias}.ctid"))];
        self.compile_select(&select)
    }
}

impl Grammar for PostgresGrammar {
    fn name(&self) -> &'static str {
        "pgsql"
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = json_field_and_path(value);
        let mut sql = self.wrap_segments(field);
        let last = path.len().saturating_sub(1);
        for (i, segment) in path.iter().enumerate() {
            let arrow = if i == last { "->>" } else { "->" };
            if segment.parse::<i64>().is_ok() {
                sql.push_str(&format!("{arrow}{segment}"));
            } else {
                sql.push_str(&format!("{arrow}'{segment}'"));
            }
        }
        sql
    }

    fn where_basic(&self, column: &Column, operator: &str, value: &Param) -> String {
        let column = self.wrap_column(column);
        let column = if operator.contains("like") {
            format!("{column}::text")
        } else {
            column
        };
        format!("{column} {} {}", self.operator(operator), self.parameter(value))
    }

    fn where_date(&self, part: DatePart, column: &Column, operator: &str, value: &Param) -> String {
        let column = self.wrap_column(column);
        let lhs = match part {
            DatePart::Date => format!("{column}::date"),
            DatePart::Time => format!("{column}::time"),
            DatePart::Day | DatePart::Month | DatePart::Year => {
                format!("EXTRACT({} FROM {column})", part.as_str().to_ascii_uppercase())
            }
        };
        format!("{lhs} {} {}", self.operator(operator), self.parameter(value))
    }

    fn compile_insert_or_ignore(&self, query: &QueryState, values: &[Record]) -> crate::Result<String> {
        Ok(format!("{} ON CONFLICT DO NOTHING", self.compile_insert(query, values)))
    }

    fn compile_insert_get_id(&self, query: &QueryState, values: &Record, sequence: Option<&str>) -> String {
        format!(
            "{} RETURNING {}",
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
                    self.wrap(name),
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
            self.wrap_value("ctid"),
            self.ctid_select(query)
        )
    }

    /// Postgres rejects qualified columns in SET.
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
        let mut prepared: Vec<SqlValue> = super::record_bindings(values).collect();
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
            self.wrap_value("ctid"),
            self.ctid_select(query)
        )
    }

    fn prepare_bindings_for_delete(&self, query: &QueryState) -> Vec<SqlValue> {
        super::row_id_subselect_bindings(query)
    }

    fn compile_truncate(&self, query: &QueryState, _reset_sequence: bool) -> Vec<super::Statement> {
        vec![(
            format!("TRUNCATE {} RESTART IDENTITY CASCADE", self.query_table(query)),
            Vec::new(),
        )]
    }

    fn prepare_binding(&self, value: SqlValue) -> SqlValue {
        prepare_temporal(value, self.date_format())
    }

    fn escape(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Blob(bytes) => format!("'\\x{}'::bytea", super::hex_lower(bytes)),
            other => self.prepare_binding(other.clone()).to_sql_inline(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_selector_uses_arrow_operators() {
        let grammar = PostgresGrammar::new();
        assert_eq!(grammar.wrap("meta->tags->0"), "\"meta\"->'tags'->>0");
        assert_eq!(grammar.wrap("meta->lang"), "\"meta\"->>'lang'");
    }

    #[test]
    fn test_like_casts_to_text() {
        let grammar = PostgresGrammar::new();
        assert_eq!(
            grammar.where_basic(&Column::from("id"), "ilike", &Param::from("1%")),
            "\"id\"::text ILIKE ?"
        );
    }

    #[test]
    fn test_escape_keeps_native_booleans() {
        let grammar = PostgresGrammar::new();
        assert_eq!(grammar.escape(&SqlValue::Bool(false)), "false");
        assert_eq!(grammar.escape(&SqlValue::Blob(vec![1, 2])), "'\\x0102'::bytea");
        assert_eq!(grammar.prepare_binding(SqlValue::Bool(true)), SqlValue::Bool(true));
    }
}
