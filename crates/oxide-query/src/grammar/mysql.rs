//! MySQL and MariaDB grammars.
//!
//! MariaDB shares nearly all of MySQL's syntax. Both grammars delegate to
//! the free functions below, each passing itself so that nested calls
//! still dispatch to the concrete dialect.

use super::{
    Grammar, UpsertColumn, bool_to_int, concatenate, escape_with, hex_lower, json_field_and_path,
    json_path, prepare_temporal, record_bindings,
};
use crate::error::{ConstraintKind, DriverError, Result};
use crate::query::bindings::BindingSlot;
use crate::query::state::{Column, Lock, QueryState};
use crate::query::where_clause::DatePart;
use crate::value::{Param, Record, SqlValue};

const OPERATORS: &[&str] = &["sounds like"];

/// Largest LIMIT MySQL accepts; used when only an offset is set.
const MAX_LIMIT: &str = "18446744073709551615";

/// MySQL grammar.
#[derive(Debug, Default, Clone)]
pub struct MySqlGrammar {
    table_prefix: String,
}

impl MySqlGrammar {
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

/// MariaDB grammar: MySQL with `JSON_VALUE` selectors.
#[derive(Debug, Default, Clone)]
pub struct MariaDbGrammar {
    table_prefix: String,
}

impl MariaDbGrammar {
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

impl Grammar for MySqlGrammar {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('`', '`')
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = json_field_and_path(value);
        format!(
            "JSON_UNQUOTE(JSON_EXTRACT({}, {}))",
            self.wrap_segments(field),
            json_path(&path)
        )
    }

    fn where_date(&self, part: DatePart, column: &Column, operator: &str, value: &Param) -> String {
        where_date(self, part, column, operator, value)
    }

    fn compile_random(&self, seed: &str) -> String {
        compile_random(seed)
    }

    fn compile_offset(&self, query: &QueryState, offset: u64) -> String {
        compile_offset(query, offset)
    }

    fn compile_union_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        compile_union_limit(limit, offset)
    }

    fn compile_lock(&self, _query: &QueryState, lock: &Lock) -> String {
        compile_lock(lock)
    }

    fn compile_insert(&self, query: &QueryState, values: &[Record]) -> String {
        compile_insert(self, query, values)
    }

    fn compile_insert_or_ignore(&self, query: &QueryState, values: &[Record]) -> Result<String> {
        Ok(compile_insert_or_ignore(self, query, values))
    }

    fn compile_upsert(
        &self,
        query: &QueryState,
        values: &[Record],
        _unique_by: &[String],
        update: &[UpsertColumn],
    ) -> Result<String> {
        Ok(compile_upsert(self, query, values, update))
    }

    fn compile_update_without_joins(&self, query: &QueryState, table: &str, columns: &str, wheres: &str) -> String {
        compile_update_without_joins(self, query, table, columns, wheres)
    }

    fn compile_delete_without_joins(&self, query: &QueryState, table: &str, wheres: &str) -> String {
        compile_delete_without_joins(self, query, table, wheres)
    }

    fn prepare_bindings_for_update(&self, query: &QueryState, values: &Record) -> Vec<SqlValue> {
        prepare_bindings_for_update(query, values)
    }

    fn prepare_bindings_for_delete(&self, query: &QueryState) -> Vec<SqlValue> {
        prepare_bindings_for_delete(query)
    }

    fn prepare_binding(&self, value: SqlValue) -> SqlValue {
        bool_to_int(prepare_temporal(value, self.date_format()))
    }

    fn escape(&self, value: &SqlValue) -> String {
        escape(&self.prepare_binding(value.clone()))
    }

    fn constraint_violation(&self, error: &DriverError) -> Option<ConstraintKind> {
        constraint_violation(error)
    }
}

impl Grammar for MariaDbGrammar {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('`', '`')
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = json_field_and_path(value);
        format!("JSON_VALUE({}, {})", self.wrap_segments(field), json_path(&path))
    }

    fn where_date(&self, part: DatePart, column: &Column, operator: &str, value: &Param) -> String {
        where_date(self, part, column, operator, value)
    }

    fn compile_random(&self, seed: &str) -> String {
        compile_random(seed)
    }

    fn compile_offset(&self, query: &QueryState, offset: u64) -> String {
        compile_offset(query, offset)
    }

    fn compile_union_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        compile_union_limit(limit, offset)
    }

    fn compile_lock(&self, _query: &QueryState, lock: &Lock) -> String {
        compile_lock(lock)
    }

    fn compile_insert(&self, query: &QueryState, values: &[Record]) -> String {
        compile_insert(self, query, values)
    }

    fn compile_insert_or_ignore(&self, query: &QueryState, values: &[Record]) -> Result<String> {
        Ok(compile_insert_or_ignore(self, query, values))
    }

    fn compile_upsert(
        &self,
        query: &QueryState,
        values: &[Record],
        _unique_by: &[String],
        update: &[UpsertColumn],
    ) -> Result<String> {
        Ok(compile_upsert(self, query, values, update))
    }

    fn compile_update_without_joins(&self, query: &QueryState, table: &str, columns: &str, wheres: &str) -> String {
        compile_update_without_joins(self, query, table, columns, wheres)
    }

    fn compile_delete_without_joins(&self, query: &QueryState, table: &str, wheres: &str) -> String {
        compile_delete_without_joins(self, query, table, wheres)
    }

    fn prepare_bindings_for_update(&self, query: &QueryState, values: &Record) -> Vec<SqlValue> {
        prepare_bindings_for_update(query, values)
    }

    fn prepare_bindings_for_delete(&self, query: &QueryState) -> Vec<SqlValue> {
        prepare_bindings_for_delete(query)
    }

    fn prepare_binding(&self, value: SqlValue) -> SqlValue {
        bool_to_int(prepare_temporal(value, self.date_format()))
    }

    fn escape(&self, value: &SqlValue) -> String {
        escape(&self.prepare_binding(value.clone()))
    }

    fn constraint_violation(&self, error: &DriverError) -> Option<ConstraintKind> {
        constraint_violation(error)
    }
}

fn where_date<G: Grammar + ?Sized>(
    grammar: &G,
    part: DatePart,
    column: &Column,
    operator: &str,
    value: &Param,
) -> String {
    format!(
        "{}({}) {} {}",
        part.as_str().to_ascii_uppercase(),
        grammar.wrap_column(column),
        grammar.operator(operator),
        grammar.parameter(value)
    )
}

fn compile_random(seed: &str) -> String {
    format!("RAND({seed})")
}

fn compile_offset(query: &QueryState, offset: u64) -> String {
    if query.limit.is_some() {
        format!("OFFSET {offset}")
    } else {
        format!("LIMIT {MAX_LIMIT} OFFSET {offset}")
    }
}

fn compile_union_limit(limit: Option<u64>, offset: Option<u64>) -> String {
    match (limit, offset) {
        (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
        (Some(limit), None) => format!("LIMIT {limit}"),
        (None, Some(offset)) => format!("LIMIT {MAX_LIMIT} OFFSET {offset}"),
        (None, None) => String::new(),
    }
}

fn compile_lock(lock: &Lock) -> String {
    match lock {
        Lock::Update => "FOR UPDATE".to_string(),
        Lock::Shared => "LOCK IN SHARE MODE".to_string(),
        Lock::Raw(sql) => sql.clone(),
    }
}

fn compile_insert<G: Grammar + ?Sized>(grammar: &G, query: &QueryState, values: &[Record]) -> String {
    if values.first().is_none_or(Vec::is_empty) {
        return format!("INSERT INTO {} () VALUES ()", grammar.query_table(query));
    }
    super::standard_insert(grammar, query, values)
}

fn compile_insert_or_ignore<G: Grammar + ?Sized>(grammar: &G, query: &QueryState, values: &[Record]) -> String {
    let sql = grammar.compile_insert(query, values);
    sql.replacen("INSERT", "INSERT IGNORE", 1)
}

fn compile_upsert<G: Grammar + ?Sized>(
    grammar: &G,
    query: &QueryState,
    values: &[Record],
    update: &[UpsertColumn],
) -> String {
    let columns = update
        .iter()
        .map(|column| match column {
            UpsertColumn::Excluded(name) => {
                let wrapped = grammar.wrap(name);
                format!("{wrapped} = VALUES({wrapped})")
            }
            UpsertColumn::Set(name, value) => {
                format!("{} = {}", grammar.wrap(name), grammar.parameter(value))
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} ON DUPLICATE KEY UPDATE {columns}",
        grammar.compile_insert(query, values)
    )
}

fn compile_update_without_joins<G: Grammar + ?Sized>(
    grammar: &G,
    query: &QueryState,
    table: &str,
    columns: &str,
    wheres: &str,
) -> String {
    concatenate(&[
        format!("UPDATE {table} SET {columns}"),
        wheres.to_string(),
        grammar.compile_orders(query, &query.orders),
        query.limit.map(|l| grammar.compile_limit(query, l)).unwrap_or_default(),
    ])
}

fn compile_delete_without_joins<G: Grammar + ?Sized>(
    grammar: &G,
    query: &QueryState,
    table: &str,
    wheres: &str,
) -> String {
    concatenate(&[
        format!("DELETE FROM {table}"),
        wheres.to_string(),
        grammar.compile_orders(query, &query.orders),
        query.limit.map(|l| grammar.compile_limit(query, l)).unwrap_or_default(),
    ])
}

/// Slots a write skips besides `skipped`. Only the single-table form
/// compiles ORDER BY.
fn write_skipped_slots(query: &QueryState, skipped: &[BindingSlot]) -> Vec<BindingSlot> {
    let mut slots = vec![BindingSlot::Select];
    slots.extend_from_slice(skipped);
    if !query.joins.is_empty() {
        slots.push(BindingSlot::Order);
    }
    slots
}

/// Joins precede SET in a MySQL UPDATE, so their bindings come first.
fn prepare_bindings_for_update(query: &QueryState, values: &Record) -> Vec<SqlValue> {
    let mut prepared = query.bindings.slot(BindingSlot::Join).to_vec();
    prepared.extend(record_bindings(values));
    prepared.extend(
        query
            .bindings
            .flatten_except(&write_skipped_slots(query, &[BindingSlot::Join])),
    );
    prepared
}

fn prepare_bindings_for_delete(query: &QueryState) -> Vec<SqlValue> {
    query.bindings.flatten_except(&write_skipped_slots(query, &[]))
}

fn escape(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(text) => {
            format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
        }
        other => escape_with(other, |bytes| format!("x'{}'", hex_lower(bytes))),
    }
}

fn constraint_violation(error: &DriverError) -> Option<ConstraintKind> {
    let message = error.message.to_ascii_lowercase();
    let code = error.code.as_deref().unwrap_or_default();
    if code == "1062" || message.contains("duplicate entry") {
        Some(ConstraintKind::Unique)
    } else if matches!(code, "1451" | "1452") || message.contains("foreign key constraint fails") {
        Some(ConstraintKind::ForeignKey)
    } else if code == "1048" || message.contains("cannot be null") {
        Some(ConstraintKind::NotNull)
    } else if code == "3819" || message.contains("check constraint") {
        Some(ConstraintKind::Check)
    } else if code == "23000" {
        Some(ConstraintKind::Other)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_quotes_with_backticks() {
        let grammar = MySqlGrammar::new();
        assert_eq!(grammar.wrap("users.name"), "`users`.`name`");
        assert_eq!(grammar.wrap_value("a`b"), "`a``b`");
    }

    #[test]
    fn test_json_selectors_differ_between_mysql_and_mariadb() {
        assert_eq!(
            MySqlGrammar::new().wrap("meta->lang"),
            "JSON_UNQUOTE(JSON_EXTRACT(`meta`, '$.\"lang\"'))"
        );
        assert_eq!(
            MariaDbGrammar::new().wrap("meta->lang"),
            "JSON_VALUE(`meta`, '$.\"lang\"')"
        );
    }

    #[test]
    fn test_escape_backslashes_and_booleans() {
        let grammar = MySqlGrammar::new();
        assert_eq!(grammar.escape(&SqlValue::Text("a\\'b".into())), "'a\\\\''b'");
        assert_eq!(grammar.escape(&SqlValue::Bool(true)), "1");
        assert_eq!(grammar.escape(&SqlValue::Blob(vec![0xAB])), "x'ab'");
    }

    #[test]
    fn test_constraint_violation_classification() {
        let duplicate = DriverError::with_code("23000", "Duplicate entry 'a' for key 'users_email_unique'");
        assert_eq!(constraint_violation(&duplicate), Some(ConstraintKind::Unique));
        let fk = DriverError::with_code("1452", "Cannot add or update a child row");
        assert_eq!(constraint_violation(&fk), Some(ConstraintKind::ForeignKey));
        let other = DriverError::with_code("1146", "Table 'x' doesn't exist");
        assert_eq!(constraint_violation(&other), None);
    }
}
