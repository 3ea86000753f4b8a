//! SQL grammars.
//!
//! [`Grammar`] compiles [`QueryState`] into SQL. Its provided methods are
//! the standard dialect; each database overrides the pieces where its
//! syntax differs. Compilation never mutates the query and keeps the
//! placeholder order aligned with the binding slots.

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;
mod standard;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use mysql::{MariaDbGrammar, MySqlGrammar};
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;
pub use sqlserver::SqlServerGrammar;
pub use standard::StandardGrammar;

use crate::error::{ConstraintKind, DriverError, Error, Result};
use crate::processor::{DefaultProcessor, Processor, ReturningProcessor};
use crate::query::bindings::BindingSlot;
use crate::query::state::{
    Aggregate, Column, Join, Lock, Order, QueryState, Subquery, TableRef, Union,
};
use crate::query::where_clause::{DatePart, HavingNode, InSource, WhereNode};
use crate::value::{Param, Record, SqlValue, hex, quote_string};

/// Column assignment used when an upsert finds an existing row.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertColumn {
    /// Copy the incoming value of this column.
    Excluded(String),
    /// Assign a value.
    Set(String, Param),
}

impl From<&str> for UpsertColumn {
    fn from(column: &str) -> Self {
        Self::Excluded(column.to_string())
    }
}

/// A compiled statement with its bindings.
pub type Statement = (String, Vec<SqlValue>);

/// Trait for dialect-specific SQL compilation.
pub trait Grammar {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Prefix applied to every table name.
    fn table_prefix(&self) -> &str;

    /// Opening and closing identifier quote characters.
    fn identifier_quotes(&self) -> (char, char) {
        ('"', '"')
    }

    /// Operators accepted beyond the generic set.
    fn operators(&self) -> &'static [&'static str] {
        &[]
    }

    /// `chrono` format string for timestamps.
    fn date_format(&self) -> &'static str {
        "%Y-%m-%d %H:%M:%S"
    }

    /// Whether nested transactions can use savepoints.
    fn supports_savepoints(&self) -> bool {
        true
    }

    // ------------------------------------------------------------------
    // Wrapping
    // ------------------------------------------------------------------

    /// Quotes an identifier, handling `as` aliases, dotted segments and
    /// JSON selectors.
    fn wrap(&self, value: &str) -> String {
        if let Some((column, alias)) = split_alias(value) {
            return format!("{} AS {}", self.wrap(column), self.wrap_value(alias));
        }
        if value.contains("->") {
            return self.wrap_json_selector(value);
        }
        self.wrap_segments(value)
    }

    /// Quotes each dot-separated segment; the first of several is a table.
    fn wrap_segments(&self, value: &str) -> String {
        let segments: Vec<&str> = value.split('.').collect();
        let last = segments.len() - 1;
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i == 0 && last > 0 {
                    self.wrap_table(segment)
                } else {
                    self.wrap_value(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quotes a single segment; `*` is left alone.
    fn wrap_value(&self, value: &str) -> String {
        if value == "*" {
            return value.to_string();
        }
        let (open, close) = self.identifier_quotes();
        let escaped = value.replace(close, &format!("{close}{close}"));
        format!("{open}{escaped}{close}")
    }

    /// Quotes a table name, applying the table prefix.
    fn wrap_table(&self, table: &str) -> String {
        let prefix = self.table_prefix();
        if let Some((name, alias)) = split_alias(table) {
            return format!(
                "{} AS {}",
                self.wrap_table(name),
                self.wrap_value(&format!("{prefix}{alias}"))
            );
        }
        match table.rsplit_once('.') {
            Some((schema, name)) => format!(
                "{}.{}",
                self.wrap_value(schema),
                self.wrap_value(&format!("{prefix}{name}"))
            ),
            None => self.wrap_value(&format!("{prefix}{table}")),
        }
    }

    /// Quotes a `column->path` selector. The standard dialect has no JSON
    /// operators and quotes the selector literally.
    fn wrap_json_selector(&self, value: &str) -> String {
        self.wrap_segments(value)
    }

    /// Quotes a column; raw expressions pass through.
    fn wrap_column(&self, column: &Column) -> String {
        match column {
            Column::Name(name) => self.wrap(name),
            Column::Raw(expression) => expression.value().to_string(),
        }
    }

    /// Quotes a FROM/JOIN target; raw expressions pass through.
    fn wrap_table_ref(&self, table: &TableRef) -> String {
        match table {
            TableRef::Name(name) => self.wrap_table(name),
            TableRef::Raw(expression) => expression.value().to_string(),
        }
    }

    /// Comma-separated quoted columns.
    fn columnize(&self, columns: &[Column]) -> String {
        columns
            .iter()
            .map(|c| self.wrap_column(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `?` for bound values, the SQL text for expressions.
    fn parameter(&self, value: &Param) -> String {
        match value {
            Param::Value(_) => "?".to_string(),
            Param::Raw(expression) => expression.value().to_string(),
        }
    }

    /// Comma-separated parameters.
    fn parameterize(&self, values: &[Param]) -> String {
        values
            .iter()
            .map(|v| self.parameter(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Wrapped FROM target of a query, empty if unset.
    fn query_table(&self, query: &QueryState) -> String {
        query
            .from
            .as_ref()
            .map_or_else(String::new, |table| self.wrap_table_ref(table))
    }

    /// Uppercased operator for output.
    fn operator(&self, operator: &str) -> String {
        operator.to_ascii_uppercase()
    }

    // ------------------------------------------------------------------
    // SELECT
    // ------------------------------------------------------------------

    /// Compiles a SELECT, including unions.
    fn compile_select(&self, query: &QueryState) -> String {
        if !query.unions.is_empty() && query.aggregate.is_some() {
            return self.compile_union_aggregate(query);
        }
        let sql = concatenate(&self.compile_components(query));
        if query.unions.is_empty() {
            sql
        } else {
            format!("{} {}", self.wrap_union(&sql), self.compile_unions(query))
        }
    }

    /// Components in fixed order: aggregate, columns, from, joins, wheres,
    /// groups, havings, orders, limit, offset, lock.
    fn compile_components(&self, query: &QueryState) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(aggregate) = &query.aggregate {
            parts.push(self.compile_aggregate(query, aggregate));
        }
        parts.push(self.compile_columns(query, &query.columns));
        if let Some(table) = &query.from {
            parts.push(self.compile_from(query, table));
        }
        if !query.joins.is_empty() {
            parts.push(self.compile_joins(query, &query.joins));
        }
        parts.push(self.compile_wheres(query));
        if !query.groups.is_empty() {
            parts.push(self.compile_groups(query, &query.groups));
        }
        if !query.havings.is_empty() {
            parts.push(self.compile_havings(query));
        }
        parts.push(self.compile_select_orders(query));
        if let Some(limit) = query.limit {
            parts.push(self.compile_limit(query, limit));
        }
        if let Some(offset) = query.offset {
            parts.push(self.compile_offset(query, offset));
        }
        if let Some(lock) = &query.lock {
            parts.push(self.compile_lock(query, lock));
        }
        parts
    }

    /// `SELECT FN(cols) AS aggregate`.
    fn compile_aggregate(&self, query: &QueryState, aggregate: &Aggregate) -> String {
        let mut column = if aggregate.columns.is_empty() {
            "*".to_string()
        } else {
            self.columnize(&aggregate.columns)
        };
        if query.distinct && column != "*" {
            column = format!("DISTINCT {column}");
        }
        format!("SELECT {}({column}) AS aggregate", aggregate.function.as_sql())
    }

    /// Select list; empty when an aggregate replaces it.
    fn compile_columns(&self, query: &QueryState, columns: &[Column]) -> String {
        if query.aggregate.is_some() {
            return String::new();
        }
        let select = if query.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        };
        if columns.is_empty() {
            format!("{select} *")
        } else {
            format!("{select} {}", self.columnize(columns))
        }
    }

    /// `FROM table`.
    fn compile_from(&self, _query: &QueryState, table: &TableRef) -> String {
        format!("FROM {}", self.wrap_table_ref(table))
    }

    /// All joins.
    fn compile_joins(&self, query: &QueryState, joins: &[Join]) -> String {
        joins
            .iter()
            .map(|join| self.compile_join(query, join))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `KIND JOIN table ON ...`.
    fn compile_join(&self, _query: &QueryState, join: &Join) -> String {
        let table = self.wrap_table_ref(&join.table);
        let kind = join.kind.keyword();
        if join.wheres.is_empty() {
            return format!("{kind} JOIN {table}");
        }
        format!("{kind} JOIN {table} ON {}", self.compile_where_nodes(&join.wheres))
    }

    /// `WHERE ...`, or empty.
    fn compile_wheres(&self, query: &QueryState) -> String {
        if query.wheres.is_empty() {
            return String::new();
        }
        format!("WHERE {}", self.compile_where_nodes(&query.wheres))
    }

    /// Predicates joined by their booleans, leading boolean removed.
    fn compile_where_nodes(&self, wheres: &[WhereNode]) -> String {
        let sql = wheres
            .iter()
            .map(|node| format!("{} {}", node.boolean().keyword(), self.compile_where(node)))
            .collect::<Vec<_>>()
            .join(" ");
        remove_leading_boolean(&sql).to_string()
    }

    /// One predicate.
    fn compile_where(&self, node: &WhereNode) -> String {
        match node {
            WhereNode::Raw { sql, .. } => sql.clone(),
            WhereNode::Basic {
                column,
                operator,
                value,
                ..
            } => self.where_basic(column, operator, value),
            WhereNode::Column {
                first,
                operator,
                second,
                ..
            } => format!(
                "{} {} {}",
                self.wrap_column(first),
                self.operator(operator),
                self.wrap_column(second)
            ),
            WhereNode::Nested { query, .. } => {
                format!("({})", self.compile_where_nodes(&query.wheres))
            }
            WhereNode::Sub {
                column,
                operator,
                query,
                ..
            } => format!(
                "{} {} ({})",
                self.wrap_column(column),
                self.operator(operator),
                self.compile_subquery(query)
            ),
            WhereNode::In {
                column,
                source,
                negated,
                ..
            } => self.where_in(column, source, *negated),
            WhereNode::Null {
                column, negated, ..
            } => {
                let not = if *negated { " NOT" } else { "" };
                format!("{} IS{not} NULL", self.wrap_column(column))
            }
            WhereNode::Between {
                column,
                low,
                high,
                negated,
                ..
            } => {
                let not = if *negated { "NOT " } else { "" };
                format!(
                    "{} {not}BETWEEN {} AND {}",
                    self.wrap_column(column),
                    self.parameter(low),
                    self.parameter(high)
                )
            }
            WhereNode::BetweenColumns {
                column,
                low,
                high,
                negated,
                ..
            } => {
                let not = if *negated { "NOT " } else { "" };
                format!(
                    "{} {not}BETWEEN {} AND {}",
                    self.wrap_column(column),
                    self.wrap_column(low),
                    self.wrap_column(high)
                )
            }
            WhereNode::Exists { query, negated, .. } => {
                let not = if *negated { "NOT " } else { "" };
                format!("{not}EXISTS ({})", self.compile_subquery(query))
            }
            WhereNode::Date {
                part,
                column,
                operator,
                value,
                ..
            } => self.where_date(*part, column, operator, value),
        }
    }

    /// `column operator ?`.
    fn where_basic(&self, column: &Column, operator: &str, value: &Param) -> String {
        format!(
            "{} {} {}",
            self.wrap_column(column),
            self.operator(operator),
            self.parameter(value)
        )
    }

    /// `column [NOT] IN (...)`; an empty list is always false (`0 = 1`),
    /// an empty NOT IN always true (`1 = 1`).
    fn where_in(&self, column: &Column, source: &InSource, negated: bool) -> String {
        let keyword = if negated { "NOT IN" } else { "IN" };
        match source {
            InSource::Values(values) if values.is_empty() => {
                if negated { "1 = 1" } else { "0 = 1" }.to_string()
            }
            InSource::Values(values) => format!(
                "{} {keyword} ({})",
                self.wrap_column(column),
                self.parameterize(values)
            ),
            InSource::Query(query) => format!(
                "{} {keyword} ({})",
                self.wrap_column(column),
                self.compile_subquery(query)
            ),
        }
    }

    /// Date-component comparison.
    fn where_date(&self, part: DatePart, column: &Column, operator: &str, value: &Param) -> String {
        let column = self.wrap_column(column);
        let lhs = match part {
            DatePart::Date => format!("CAST({column} AS DATE)"),
            DatePart::Time => format!("CAST({column} AS TIME)"),
            DatePart::Day | DatePart::Month | DatePart::Year => {
                format!("EXTRACT({} FROM {column})", part.as_str().to_ascii_uppercase())
            }
        };
        format!("{lhs} {} {}", self.operator(operator), self.parameter(value))
    }

    /// SQL for a subquery in an expression position.
    fn compile_subquery(&self, query: &Subquery) -> String {
        match query {
            Subquery::Query(query) => self.compile_select(query),
            Subquery::Raw { sql, .. } => sql.clone(),
        }
    }

    /// `GROUP BY ...`.
    fn compile_groups(&self, _query: &QueryState, groups: &[Column]) -> String {
        format!("GROUP BY {}", self.columnize(groups))
    }

    /// `HAVING ...`.
    fn compile_havings(&self, query: &QueryState) -> String {
        format!("HAVING {}", self.compile_having_nodes(&query.havings))
    }

    /// Having predicates joined by their booleans.
    fn compile_having_nodes(&self, havings: &[HavingNode]) -> String {
        let sql = havings
            .iter()
            .map(|node| format!("{} {}", node.boolean().keyword(), self.compile_having(node)))
            .collect::<Vec<_>>()
            .join(" ");
        remove_leading_boolean(&sql).to_string()
    }

    /// One having predicate.
    fn compile_having(&self, node: &HavingNode) -> String {
        match node {
            HavingNode::Raw { sql, .. } => sql.clone(),
            HavingNode::Basic {
                column,
                operator,
                value,
                ..
            } => self.where_basic(column, operator, value),
            HavingNode::Nested { query, .. } => {
                format!("({})", self.compile_having_nodes(&query.havings))
            }
            HavingNode::Between {
                column,
                low,
                high,
                negated,
                ..
            } => {
                let not = if *negated { "NOT " } else { "" };
                format!(
                    "{} {not}BETWEEN {} AND {}",
                    self.wrap_column(column),
                    self.parameter(low),
                    self.parameter(high)
                )
            }
            HavingNode::Null {
                column, negated, ..
            } => {
                let not = if *negated { " NOT" } else { "" };
                format!("{} IS{not} NULL", self.wrap_column(column))
            }
        }
    }

    /// ORDER BY component of a SELECT.
    fn compile_select_orders(&self, query: &QueryState) -> String {
        self.compile_orders(query, &query.orders)
    }

    /// `ORDER BY ...`, or empty.
    fn compile_orders(&self, _query: &QueryState, orders: &[Order]) -> String {
        if orders.is_empty() {
            return String::new();
        }
        let list = orders
            .iter()
            .map(|order| match order {
                Order::Column { column, direction } => {
                    format!("{} {}", self.wrap_column(column), direction.keyword())
                }
                Order::Raw(sql) => sql.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("ORDER BY {list}")
    }

    /// Random ordering expression.
    fn compile_random(&self, _seed: &str) -> String {
        "RANDOM()".to_string()
    }

    /// `LIMIT n`.
    fn compile_limit(&self, _query: &QueryState, limit: u64) -> String {
        format!("LIMIT {limit}")
    }

    /// `OFFSET n`.
    fn compile_offset(&self, _query: &QueryState, offset: u64) -> String {
        format!("OFFSET {offset}")
    }

    /// Lock clause.
    fn compile_lock(&self, _query: &QueryState, lock: &Lock) -> String {
        match lock {
            Lock::Update => "FOR UPDATE".to_string(),
            Lock::Shared => "FOR SHARE".to_string(),
            Lock::Raw(sql) => sql.clone(),
        }
    }

    /// Union tail: each union, then union orders, limit and offset.
    fn compile_unions(&self, query: &QueryState) -> String {
        let mut parts: Vec<String> = query.unions.iter().map(|u| self.compile_union(u)).collect();
        parts.push(self.compile_union_orders(query));
        parts.push(self.compile_union_limit(query.union_limit, query.union_offset));
        concatenate(&parts)
    }

    /// ORDER BY applied to the whole union.
    fn compile_union_orders(&self, query: &QueryState) -> String {
        self.compile_orders(query, &query.union_orders)
    }

    /// LIMIT and OFFSET applied to the whole union.
    fn compile_union_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        concatenate(&[
            limit.map(|limit| format!("LIMIT {limit}")).unwrap_or_default(),
            offset.map(|offset| format!("OFFSET {offset}")).unwrap_or_default(),
        ])
    }

    /// `UNION [ALL] (select)`.
    fn compile_union(&self, union: &Union) -> String {
        let keyword = if union.all { "UNION ALL" } else { "UNION" };
        format!("{keyword} {}", self.wrap_union(&self.compile_select(&union.query)))
    }

    /// Wraps one side of a union.
    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    /// Aggregate over a union, computed on a derived table.
    fn compile_union_aggregate(&self, query: &QueryState) -> String {
        let mut inner = query.clone();
        let Some(aggregate) = inner.aggregate.take() else {
            return self.compile_select(query);
        };
        format!(
            "{} FROM ({}) AS {}",
            self.compile_aggregate(&inner, &aggregate),
            self.compile_select(&inner),
            self.wrap_table("temp_table")
        )
    }

    /// Existence check over a query.
    fn compile_exists(&self, query: &QueryState) -> String {
        format!(
            "SELECT EXISTS({}) AS {}",
            self.compile_select(query),
            self.wrap_value("exists")
        )
    }

    // ------------------------------------------------------------------
    // INSERT / UPDATE / DELETE
    // ------------------------------------------------------------------

    /// Multi-row INSERT. Rows must share the first row's columns.
    fn compile_insert(&self, query: &QueryState, values: &[Record]) -> String {
        standard_insert(self, query, values)
    }

    /// Parameters of one record.
    fn parameterize_record(&self, record: &Record) -> String {
        record
            .iter()
            .map(|(_, value)| self.parameter(value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// INSERT that skips conflicting rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] where the dialect has no such syntax.
    fn compile_insert_or_ignore(&self, _query: &QueryState, _values: &[Record]) -> Result<String> {
        Err(Error::Unsupported {
            driver: self.name(),
            feature: "insert or ignore queries",
        })
    }

    /// INSERT returning the generated id.
    fn compile_insert_get_id(&self, query: &QueryState, values: &Record, _sequence: Option<&str>) -> String {
        self.compile_insert(query, std::slice::from_ref(values))
    }

    /// `INSERT INTO table (cols) select`.
    fn compile_insert_using(&self, query: &QueryState, columns: &[Column], sql: &str) -> String {
        let table = self.query_table(query);
        if columns.is_empty() {
            return format!("INSERT INTO {table} {sql}");
        }
        format!("INSERT INTO {table} ({}) {sql}", self.columnize(columns))
    }

    /// INSERT that updates rows conflicting on `unique_by`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] where the dialect has no such syntax.
    fn compile_upsert(
        &self,
        _query: &QueryState,
        _values: &[Record],
        _unique_by: &[String],
        _update: &[UpsertColumn],
    ) -> Result<String> {
        Err(Error::Unsupported {
            driver: self.name(),
            feature: "upserts",
        })
    }

    /// UPDATE, dispatching on the presence of joins.
    fn compile_update(&self, query: &QueryState, values: &Record) -> String {
        let table = self.query_table(query);
        let columns = self.compile_update_columns(query, values);
        let wheres = self.compile_wheres(query);
        if query.joins.is_empty() {
            self.compile_update_without_joins(query, &table, &columns, &wheres)
        } else {
            self.compile_update_with_joins(query, &table, &columns, &wheres)
        }
    }

    /// `col = ?, ...`.
    fn compile_update_columns(&self, _query: &QueryState, values: &Record) -> String {
        values
            .iter()
            .map(|(column, value)| format!("{} = {}", self.wrap(column), self.parameter(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `UPDATE table SET ... WHERE ...`. Limit and orders are not compiled.
    fn compile_update_without_joins(&self, _query: &QueryState, table: &str, columns: &str, wheres: &str) -> String {
        concatenate(&[format!("UPDATE {table} SET {columns}"), wheres.to_string()])
    }

    /// `UPDATE table joins SET ... WHERE ...`.
    fn compile_update_with_joins(&self, query: &QueryState, table: &str, columns: &str, wheres: &str) -> String {
        let joins = self.compile_joins(query, &query.joins);
        concatenate(&[
            format!("UPDATE {table} {joins} SET {columns}"),
            wheres.to_string(),
        ])
    }

    /// Bindings for an UPDATE: join, values, then the rest except select.
    /// Raw order bindings are dropped since this UPDATE has no ORDER BY.
    fn prepare_bindings_for_update(&self, query: &QueryState, values: &Record) -> Vec<SqlValue> {
        let bindings = &query.bindings;
        let mut prepared = bindings.slot(BindingSlot::Join).to_vec();
        prepared.extend(record_bindings(values));
        prepared.extend(bindings.flatten_except(&[
            BindingSlot::Select,
            BindingSlot::Join,
            BindingSlot::Order,
        ]));
        prepared
    }

    /// DELETE, dispatching on the presence of joins.
    fn compile_delete(&self, query: &QueryState) -> String {
        let table = self.query_table(query);
        let wheres = self.compile_wheres(query);
        if query.joins.is_empty() {
            self.compile_delete_without_joins(query, &table, &wheres)
        } else {
            self.compile_delete_with_joins(query, &table, &wheres)
        }
    }

    /// `DELETE FROM table WHERE ...`. Limit and orders are not compiled.
    fn compile_delete_without_joins(&self, _query: &QueryState, table: &str, wheres: &str) -> String {
        concatenate(&[format!("DELETE FROM {table}"), wheres.to_string()])
    }

    /// `DELETE alias FROM table joins WHERE ...`.
    fn compile_delete_with_joins(&self, query: &QueryState, table: &str, wheres: &str) -> String {
        let alias = query.from.as_ref().map_or("", TableRef::alias);
        let joins = self.compile_joins(query, &query.joins);
        concatenate(&[
            format!("DELETE {} FROM {table} {joins}", self.wrap(alias)),
            wheres.to_string(),
        ])
    }

    /// Bindings for a DELETE: everything except select and the raw order
    /// bindings this DELETE never compiles.
    fn prepare_bindings_for_delete(&self, query: &QueryState) -> Vec<SqlValue> {
        query
            .bindings
            .flatten_except(&[BindingSlot::Select, BindingSlot::Order])
    }

    /// Query telling whether the autoincrement sequence table exists, for
    /// dialects whose truncate resets it.
    fn compile_sequence_exists(&self) -> Option<String> {
        None
    }

    /// Statements emptying the table. `reset_sequence` is false when
    /// [`Grammar::compile_sequence_exists`] found no sequence table.
    fn compile_truncate(&self, query: &QueryState, _reset_sequence: bool) -> Vec<Statement> {
        vec![(format!("TRUNCATE TABLE {}", self.query_table(query)), Vec::new())]
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Creates a savepoint.
    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    /// Rolls back to a savepoint.
    fn compile_savepoint_rollback(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Converts a binding to what the driver should receive.
    fn prepare_binding(&self, value: SqlValue) -> SqlValue {
        prepare_temporal(value, self.date_format())
    }

    /// Inline literal for a value, for debugging output only.
    fn escape(&self, value: &SqlValue) -> String {
        self.prepare_binding(value.clone()).to_sql_inline()
    }

    /// Replaces each `?` outside string literals with its escaped binding.
    fn substitute_bindings(&self, sql: &str, bindings: &[SqlValue]) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut values = bindings.iter();
        let mut in_string = false;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    in_string = !in_string;
                    out.push(ch);
                }
                '?' if !in_string => match values.next() {
                    Some(value) => out.push_str(&self.escape(value)),
                    None => out.push(ch),
                },
                _ => out.push(ch),
            }
        }
        out
    }

    /// Classifies an integrity constraint violation, if `error` is one.
    /// The default reads SQLSTATE class 23.
    fn constraint_violation(&self, error: &DriverError) -> Option<ConstraintKind> {
        sqlstate_constraint(error.code.as_deref()?)
    }
}

/// Known dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ANSI-leaning defaults.
    Standard,
    /// MySQL.
    Mysql,
    /// MariaDB.
    Mariadb,
    /// PostgreSQL.
    Pgsql,
    /// SQLite.
    Sqlite,
    /// SQL Server.
    Sqlsrv,
}

impl Dialect {
    /// Grammar for this dialect with a table prefix.
    #[must_use]
    pub fn grammar(self, prefix: &str) -> Box<dyn Grammar> {
        match self {
            Self::Standard => Box::new(StandardGrammar::with_prefix(prefix)),
            Self::Mysql => Box::new(MySqlGrammar::with_prefix(prefix)),
            Self::Mariadb => Box::new(MariaDbGrammar::with_prefix(prefix)),
            Self::Pgsql => Box::new(PostgresGrammar::with_prefix(prefix)),
            Self::Sqlite => Box::new(SqliteGrammar::with_prefix(prefix)),
            Self::Sqlsrv => Box::new(SqlServerGrammar::with_prefix(prefix)),
        }
    }

    /// Result processor for this dialect.
    #[must_use]
    pub fn processor(self) -> Box<dyn Processor> {
        match self {
            Self::Pgsql | Self::Sqlsrv => Box::new(ReturningProcessor::new()),
            _ => Box::new(DefaultProcessor::new()),
        }
    }

    /// Config name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
            Self::Pgsql => "pgsql",
            Self::Sqlite => "sqlite",
            Self::Sqlsrv => "sqlsrv",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "mysql" => Ok(Self::Mysql),
            "mariadb" => Ok(Self::Mariadb),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Pgsql),
            "sqlite" => Ok(Self::Sqlite),
            "sqlsrv" | "sqlserver" | "mssql" => Ok(Self::Sqlsrv),
            other => Err(Error::invalid_argument(format!("unsupported driver [{other}]"))),
        }
    }
}

/// `INSERT INTO table (cols) VALUES (...), (...)`, or `DEFAULT VALUES`
/// for an empty row.
pub(crate) fn standard_insert<G: Grammar + ?Sized>(grammar: &G, query: &QueryState, values: &[Record]) -> String {
    let table = grammar.query_table(query);
    let Some(first) = values.first().filter(|row| !row.is_empty()) else {
        return format!("INSERT INTO {table} DEFAULT VALUES");
    };
    let columns = first
        .iter()
        .map(|(column, _)| grammar.wrap(column))
        .collect::<Vec<_>>()
        .join(", ");
    let rows = values
        .iter()
        .map(|row| format!("({})", grammar.parameterize_record(row)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {table} ({columns}) VALUES {rows}")
}

/// Splits `expr as alias` (case-insensitive `as`).
#[must_use]
pub fn split_alias(value: &str) -> Option<(&str, &str)> {
    let index = value.to_ascii_lowercase().find(" as ")?;
    Some((value[..index].trim(), value[index + 4..].trim()))
}

/// Strips the leading `AND `/`OR ` of a compiled predicate list.
#[must_use]
pub fn remove_leading_boolean(sql: &str) -> &str {
    sql.strip_prefix("AND ")
        .or_else(|| sql.strip_prefix("OR "))
        .unwrap_or(sql)
}

/// Joins non-empty parts with single spaces.
#[must_use]
pub fn concatenate(parts: &[String]) -> String {
    parts
        .iter()
        .map(String::as_str)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bindings of an UPDATE or DELETE that is rewritten as
/// `<row id> IN (SELECT ...)` once it has joins or a limit. Raw order
/// bindings belong to that subselect only.
pub(crate) fn row_id_subselect_bindings(query: &QueryState) -> Vec<SqlValue> {
    if query.joins.is_empty() && query.limit.is_none() {
        query
            .bindings
            .flatten_except(&[BindingSlot::Select, BindingSlot::Order])
    } else {
        query.bindings.flatten_except(&[BindingSlot::Select])
    }
}

/// Bound values of a record, in column order.
pub(crate) fn record_bindings(values: &Record) -> impl Iterator<Item = SqlValue> + '_ {
    values.iter().filter_map(|(_, value)| value.as_value().cloned())
}

/// Formats temporal values as text in `format`.
pub(crate) fn prepare_temporal(value: SqlValue, format: &str) -> SqlValue {
    match value {
        SqlValue::Timestamp(ts) => SqlValue::Text(ts.format(format).to_string()),
        SqlValue::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => SqlValue::Text(t.format("%H:%M:%S").to_string()),
        other => other,
    }
}

/// Booleans as `1`/`0` for dialects without a boolean type.
pub(crate) fn bool_to_int(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Bool(b) => SqlValue::Int(i64::from(b)),
        other => other,
    }
}

/// Inline literal with integer booleans and a custom blob form.
pub(crate) fn escape_with(value: &SqlValue, blob: impl Fn(&[u8]) -> String) -> String {
    match value {
        SqlValue::Bool(b) => i64::from(*b).to_string(),
        SqlValue::Blob(bytes) => blob(bytes),
        SqlValue::Text(text) => quote_string(text),
        other => other.to_sql_inline(),
    }
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    hex(bytes).to_ascii_lowercase()
}

/// SQLSTATE class 23 classification.
pub(crate) fn sqlstate_constraint(code: &str) -> Option<ConstraintKind> {
    match code {
        "23505" => Some(ConstraintKind::Unique),
        "23503" => Some(ConstraintKind::ForeignKey),
        "23502" => Some(ConstraintKind::NotNull),
        "23514" => Some(ConstraintKind::Check),
        c if c.starts_with("23") && c.len() == 5 => Some(ConstraintKind::Other),
        _ => None,
    }
}

/// Splits `column->a->b` into the column and its path segments.
pub(crate) fn json_field_and_path(value: &str) -> (&str, Vec<&str>) {
    let mut parts = value.split("->");
    let field = parts.next().unwrap_or_default();
    (field, parts.map(|p| p.trim_matches(|c| c == '\'' || c == '"')).collect())
}

/// `'$."a"."b"'` JSON path literal.
pub(crate) fn json_path(segments: &[&str]) -> String {
    let path = segments
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(".");
    format!("'$.{path}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_alias_is_case_insensitive() {
        assert_eq!(split_alias("users.name AS n"), Some(("users.name", "n")));
        assert_eq!(split_alias("users.name as n"), Some(("users.name", "n")));
        assert_eq!(split_alias("alias"), None);
    }

    #[test]
    fn test_remove_leading_boolean() {
        assert_eq!(remove_leading_boolean("AND a = ? OR b = ?"), "a = ? OR b = ?");
        assert_eq!(remove_leading_boolean("OR a = ?"), "a = ?");
        assert_eq!(remove_leading_boolean("a = ?"), "a = ?");
    }

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(sqlstate_constraint("23505"), Some(ConstraintKind::Unique));
        assert_eq!(sqlstate_constraint("23000"), Some(ConstraintKind::Other));
        assert_eq!(sqlstate_constraint("42P01"), None);
    }

    #[test]
    fn test_json_field_and_path() {
        let (field, path) = json_field_and_path("meta->address->'city'");
        assert_eq!(field, "meta");
        assert_eq!(path, vec!["address", "city"]);
        assert_eq!(json_path(&path), "'$.\"address\".\"city\"'");
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgres".parse::<Dialect>(), Ok(Dialect::Pgsql));
        assert_eq!("SQLSRV".parse::<Dialect>(), Ok(Dialect::Sqlsrv));
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
