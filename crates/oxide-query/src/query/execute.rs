//! Terminal operations: compile, run on the connection, shape the result.

use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::grammar::{UpsertColumn, record_bindings, split_alias};
use crate::query::Builder;
use crate::query::bindings::BindingSlot;
use crate::query::conditions::Conditions;
use crate::query::pagination::{LengthAwarePaginator, Paginator};
use crate::query::state::{Aggregate, AggregateFunction, Column, Component, TableRef};
use crate::query::subquery::IntoSubquery;
use crate::value::{Param, Record, Row, SqlValue, ToSqlValue};

impl Builder<'_> {
    // --- reads ---

    /// Runs the SELECT.
    ///
    /// # Errors
    ///
    /// Returns a recorded usage error or the connection's error.
    pub fn get(&self) -> Result<Vec<Row>> {
        let sql = self.to_sql()?;
        let rows = self
            .connection
            .select(&sql, &self.get_bindings(), !self.use_write_connection)?;
        Ok(self.connection.processor().process_select(&self.state, rows))
    }

    /// First row, on a copy limited to one.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn first(&self) -> Result<Option<Row>> {
        Ok(self.clone().set_limit(1).get()?.into_iter().next())
    }

    /// Row whose `id` equals `id`.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn find(&self, id: impl Into<Param>) -> Result<Option<Row>> {
        self.clone().where_eq("id", id).first()
    }

    /// One column of the first row.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn value(&self, column: &str) -> Result<Option<SqlValue>> {
        let row = self.clone().select([column]).first()?;
        Ok(row.and_then(|row| row.get_index(0).cloned()))
    }

    /// Values of one column across all rows.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn pluck(&self, column: &str) -> Result<Vec<SqlValue>> {
        let query = if self.state.columns.is_empty() {
            self.clone().select([column])
        } else {
            self.clone()
        };
        let name = result_column_name(column);
        Ok(query
            .get()?
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(SqlValue::Null))
            .collect())
    }

    /// `(key, value)` pairs of two columns across all rows.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn pluck_with_keys(&self, column: &str, key: &str) -> Result<Vec<(SqlValue, SqlValue)>> {
        let query = if self.state.columns.is_empty() {
            self.clone().select([column, key])
        } else {
            self.clone()
        };
        let (value_name, key_name) = (result_column_name(column), result_column_name(key));
        Ok(query
            .get()?
            .iter()
            .map(|row| {
                let key = row.get(key_name).cloned().unwrap_or(SqlValue::Null);
                let value = row.get(value_name).cloned().unwrap_or(SqlValue::Null);
                (key, value)
            })
            .collect())
    }

    /// Returns true if any row matches.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn exists(&self) -> Result<bool> {
        self.check()?;
        let sql = self.grammar().compile_exists(&self.state);
        let rows = self
            .connection
            .select(&sql, &self.get_bindings(), !self.use_write_connection)?;
        Ok(rows
            .first()
            .and_then(|row| row.get("exists").or_else(|| row.get_index(0)))
            .is_some_and(SqlValue::as_bool))
    }

    /// Returns true if no row matches.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn doesnt_exist(&self) -> Result<bool> {
        self.exists().map(|exists| !exists)
    }

    /// Processes matching rows in pages of `count`, in order.
    ///
    /// `f` receives each page and its 1-based number; returning `false`
    /// stops early, which is reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] without an ORDER BY, otherwise
    /// see [`get`](Self::get).
    pub fn chunk(&self, count: u64, mut f: impl FnMut(Vec<Row>, u64) -> bool) -> Result<bool> {
        if self.state.orders.is_empty() && self.state.union_orders.is_empty() {
            return Err(Error::invalid_argument(
                "an order by clause is required when chunking",
            ));
        }
        let mut page = 1;
        loop {
            let rows = self.clone().for_page(page, count).get()?;
            let fetched = rows.len();
            if fetched == 0 {
                return Ok(true);
            }
            if !f(rows, page) {
                return Ok(false);
            }
            if (fetched as u64) < count {
                return Ok(true);
            }
            page += 1;
        }
    }

    // --- aggregates ---

    /// Runs `function(columns)` on a copy of the query.
    ///
    /// The select list is dropped unless the query has unions; ORDER BY is
    /// dropped when there is no GROUP BY. The builder itself is unchanged.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn aggregate(&self, function: AggregateFunction, columns: &[&str]) -> Result<Option<SqlValue>> {
        let query = if self.state.unions.is_empty() {
            self.clone_without(&[Component::Columns])
                .clone_without_bindings(&[BindingSlot::Select])
        } else {
            self.clone()
        };
        let rows = query.with_aggregate(function, columns).get()?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get("aggregate").cloned())
            .filter(|value| !value.is_null()))
    }

    fn with_aggregate(mut self, function: AggregateFunction, columns: &[&str]) -> Self {
        self.state.aggregate = Some(Aggregate {
            function,
            columns: columns.iter().map(|c| Column::from(*c)).collect(),
        });
        if self.state.groups.is_empty() {
            self.state.orders.clear();
            self.state.bindings.clear(BindingSlot::Order);
        }
        self
    }

    /// `COUNT(*)`.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn count(&self) -> Result<i64> {
        Ok(self
            .aggregate(AggregateFunction::Count, &[])?
            .and_then(|value| value.as_i64())
            .unwrap_or(0))
    }

    /// `MIN(column)`; `None` when no rows match.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn min(&self, column: &str) -> Result<Option<SqlValue>> {
        self.aggregate(AggregateFunction::Min, &[column])
    }

    /// `MAX(column)`; `None` when no rows match.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn max(&self, column: &str) -> Result<Option<SqlValue>> {
        self.aggregate(AggregateFunction::Max, &[column])
    }

    /// `SUM(column)`; zero when no rows match.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn sum(&self, column: &str) -> Result<SqlValue> {
        Ok(self
            .aggregate(AggregateFunction::Sum, &[column])?
            .unwrap_or(SqlValue::Int(0)))
    }

    /// `AVG(column)`; `None` when no rows match.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn avg(&self, column: &str) -> Result<Option<f64>> {
        Ok(self
            .aggregate(AggregateFunction::Avg, &[column])?
            .and_then(|value| value.as_f64()))
    }

    // --- pagination ---

    /// A page of results with the total count.
    ///
    /// `total` skips the count query when already known. A zero total
    /// skips the page query. Pages below 1 are treated as 1.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn paginate(&self, per_page: u64, page: u64, total: Option<u64>) -> Result<LengthAwarePaginator> {
        let page = page.max(1);
        let total = match total {
            Some(total) => total,
            None => self.get_count_for_pagination()?,
        };
        let items = if total > 0 {
            self.clone().for_page(page, per_page).get()?
        } else {
            Vec::new()
        };
        Ok(LengthAwarePaginator::new(items, total, per_page, page))
    }

    /// A page of results without a count query.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn simple_paginate(&self, per_page: u64, page: u64) -> Result<Paginator> {
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(per_page);
        let items = self
            .clone()
            .set_offset(offset)
            .set_limit(per_page.saturating_add(1))
            .get()?;
        Ok(Paginator::new(items, per_page, page))
    }

    /// Number of rows the query would return without LIMIT/OFFSET.
    ///
    /// Grouped queries are counted as a derived table so each group counts
    /// once.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn get_count_for_pagination(&self) -> Result<u64> {
        let query = if self.state.groups.is_empty() && self.state.havings.is_empty() {
            let without: &[Component] = if self.state.unions.is_empty() {
                &[Component::Columns, Component::Orders, Component::Limit, Component::Offset]
            } else {
                &[Component::Orders, Component::Limit, Component::Offset]
            };
            let slots: &[BindingSlot] = if self.state.unions.is_empty() {
                &[BindingSlot::Select, BindingSlot::Order]
            } else {
                &[BindingSlot::Order]
            };
            self.clone_without(without).clone_without_bindings(slots)
        } else {
            let mut inner = self
                .clone_without(&[Component::Orders, Component::Limit, Component::Offset])
                .clone_without_bindings(&[BindingSlot::Order]);
            if inner.state.columns.is_empty() && !inner.state.joins.is_empty() {
                if let Some(TableRef::Name(table)) = &self.state.from {
                    let table = split_alias(table).map_or(table.as_str(), |(_, alias)| alias);
                    inner = inner.select([format!("{table}.*")]);
                }
            }
            let sql = inner.to_sql()?;
            let alias = self.grammar().wrap_table("aggregate_table");
            self.new_query()
                .from(Expression::new(format!("({sql}) AS {alias}")))
                .merge_bindings(&inner)
        };
        let count = query
            .with_aggregate(AggregateFunction::Count, &[])
            .get()?
            .into_iter()
            .next()
            .and_then(|row| row.get("aggregate").and_then(SqlValue::as_i64));
        Ok(count.and_then(|n| u64::try_from(n).ok()).unwrap_or(0))
    }

    // --- writes ---

    /// INSERT one or more rows. An empty list succeeds without a query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if rows have different columns,
    /// otherwise the connection's error.
    pub fn insert(&self, values: Vec<Record>) -> Result<bool> {
        self.check()?;
        if values.is_empty() {
            return Ok(true);
        }
        let values = normalize_rows(values)?;
        let sql = self.grammar().compile_insert(&self.state, &values);
        self.connection.insert(&sql, &rows_bindings(&values))
    }

    /// INSERT one row and return the generated id.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn insert_get_id(&self, values: Record, sequence: Option<&str>) -> Result<SqlValue> {
        self.check()?;
        let sql = self
            .grammar()
            .compile_insert_get_id(&self.state, &values, sequence);
        let bindings: Vec<SqlValue> = record_bindings(&values).collect();
        self.connection
            .processor()
            .process_insert_get_id(self.connection, &sql, &bindings, sequence)
    }

    /// INSERT skipping rows that violate a constraint; returns rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] where the dialect has no such syntax.
    pub fn insert_or_ignore(&self, values: Vec<Record>) -> Result<u64> {
        self.check()?;
        if values.is_empty() {
            return Ok(0);
        }
        let values = normalize_rows(values)?;
        let sql = self
            .grammar()
            .compile_insert_or_ignore(&self.state, &values)?;
        self.connection
            .affecting_statement(&sql, &rows_bindings(&values))
    }

    /// `INSERT INTO table (columns) <query>`.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn insert_using(&self, columns: &[&str], query: impl IntoSubquery) -> Result<u64> {
        self.check()?;
        let query = query.into_subquery()?;
        let grammar = self.grammar();
        let columns: Vec<Column> = columns.iter().map(|c| Column::from(*c)).collect();
        let sql = grammar.compile_insert_using(&self.state, &columns, &grammar.compile_subquery(&query));
        self.connection.affecting_statement(&sql, &query.bindings())
    }

    /// INSERT that updates rows conflicting on `unique_by`.
    ///
    /// `update` defaults to every inserted column taking the new value. An
    /// explicitly empty `update` is a plain insert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] where the dialect has no such syntax.
    pub fn upsert(
        &self,
        values: Vec<Record>,
        unique_by: &[&str],
        update: Option<Vec<UpsertColumn>>,
    ) -> Result<u64> {
        self.check()?;
        if values.is_empty() {
            return Ok(0);
        }
        if update.as_ref().is_some_and(Vec::is_empty) {
            return self.insert(values).map(u64::from);
        }
        let values = normalize_rows(values)?;
        let update = update.unwrap_or_else(|| {
            values[0]
                .iter()
                .map(|(column, _)| UpsertColumn::Excluded(column.clone()))
                .collect()
        });
        let unique_by: Vec<String> = unique_by.iter().map(ToString::to_string).collect();
        let sql = self
            .grammar()
            .compile_upsert(&self.state, &values, &unique_by, &update)?;
        let mut bindings = rows_bindings(&values);
        bindings.extend(update.iter().filter_map(|column| match column {
            UpsertColumn::Set(_, value) => value.as_value().cloned(),
            UpsertColumn::Excluded(_) => None,
        }));
        self.connection.affecting_statement(&sql, &bindings)
    }

    /// UPDATE matching rows; returns rows affected.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn update(&self, values: Record) -> Result<u64> {
        self.check()?;
        let grammar = self.grammar();
        let sql = grammar.compile_update(&self.state, &values);
        let bindings = grammar.prepare_bindings_for_update(&self.state, &values);
        self.connection.update(&sql, &bindings)
    }

    /// Inserts `attributes + values` when no row matches `attributes`,
    /// otherwise updates one matching row with `values`.
    ///
    /// The one-row limit only reaches dialects whose UPDATE takes one
    /// (MySQL, MariaDB, Postgres, SQLite). Elsewhere every matching row is
    /// updated.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn update_or_insert(&self, attributes: Record, values: Record) -> Result<bool> {
        let query = attributes
            .iter()
            .fold(self.clone(), |query, (column, value)| {
                query.where_eq(column.as_str(), value.clone())
            });
        if !query.exists()? {
            let mut row = attributes;
            for (column, value) in values {
                match row.iter_mut().find(|(existing, _)| *existing == column) {
                    Some(slot) => slot.1 = value,
                    None => row.push((column, value)),
                }
            }
            return self.insert(vec![row]);
        }
        if values.is_empty() {
            return Ok(true);
        }
        Ok(query.set_limit(1).update(values)? > 0)
    }

    /// `column = column + amount`, plus `extra` assignments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a non-numeric amount.
    pub fn increment(&self, column: &str, amount: impl ToSqlValue, extra: Record) -> Result<u64> {
        self.adjust(column, "+", &amount.to_sql_value(), extra)
    }

    /// `column = column - amount`, plus `extra` assignments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a non-numeric amount.
    pub fn decrement(&self, column: &str, amount: impl ToSqlValue, extra: Record) -> Result<u64> {
        self.adjust(column, "-", &amount.to_sql_value(), extra)
    }

    fn adjust(&self, column: &str, sign: &str, amount: &SqlValue, extra: Record) -> Result<u64> {
        if !amount.is_numeric() {
            return Err(Error::invalid_argument(format!(
                "non-numeric value passed to {} method",
                if sign == "+" { "increment" } else { "decrement" }
            )));
        }
        let wrapped = self.grammar().wrap(column);
        let expression = Expression::new(format!("{wrapped} {sign} {}", amount.to_sql_inline()));
        let mut values: Record = vec![(column.to_string(), Param::Raw(expression))];
        values.extend(extra);
        self.update(values)
    }

    /// DELETE matching rows; returns rows affected.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn delete(&self) -> Result<u64> {
        self.check()?;
        let grammar = self.grammar();
        let sql = grammar.compile_delete(&self.state);
        let bindings = grammar.prepare_bindings_for_delete(&self.state);
        self.connection.delete(&sql, &bindings)
    }

    /// DELETE the row whose `<table>.id` equals `id`.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn delete_by_id(&self, id: impl Into<Param>) -> Result<u64> {
        let table = self.state.from.as_ref().map_or("", TableRef::alias);
        let column = if table.is_empty() {
            "id".to_string()
        } else {
            format!("{table}.id")
        };
        self.clone().where_eq(column, id).delete()
    }

    /// Empties the table.
    ///
    /// # Errors
    ///
    /// Returns the connection's error.
    pub fn truncate(&self) -> Result<()> {
        self.check()?;
        let grammar = self.grammar();
        let reset_sequence = match grammar.compile_sequence_exists() {
            Some(sql) => self
                .connection
                .select(&sql, &[], false)?
                .first()
                .and_then(|row| row.get_index(0))
                .is_some_and(SqlValue::as_bool),
            None => true,
        };
        for (sql, bindings) in grammar.compile_truncate(&self.state, reset_sequence) {
            self.connection.statement(&sql, &bindings)?;
        }
        Ok(())
    }
}

/// Result-set name of a selected column: the alias, else the last segment.
fn result_column_name(column: &str) -> &str {
    if let Some((_, alias)) = split_alias(column) {
        return alias;
    }
    column.rsplit('.').next().unwrap_or(column)
}

/// Multi-row inserts have their columns sorted and must agree on them.
fn normalize_rows(mut values: Vec<Record>) -> Result<Vec<Record>> {
    if values.len() < 2 {
        return Ok(values);
    }
    for row in &mut values {
        row.sort_by(|a, b| a.0.cmp(&b.0));
    }
    let columns = |row: &Record| row.iter().map(|(c, _)| c.clone()).collect::<Vec<_>>();
    let expected = columns(&values[0]);
    if values[1..].iter().any(|row| columns(row) != expected) {
        return Err(Error::invalid_argument(
            "every inserted row must have the same columns",
        ));
    }
    Ok(values)
}

fn rows_bindings(values: &[Record]) -> Vec<SqlValue> {
    values.iter().flat_map(record_bindings).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_result_column_name() {
        assert_eq!(result_column_name("users.email"), "email");
        assert_eq!(result_column_name("email as e"), "e");
        assert_eq!(result_column_name("email"), "email");
    }

    #[test]
    fn test_normalize_rows_sorts_columns() {
        let rows = normalize_rows(vec![
            record! { "b" => 1, "a" => 2 },
            record! { "a" => 3, "b" => 4 },
        ])
        .unwrap();
        assert_eq!(rows[0][0].0, "a");
        assert_eq!(rows[1][0].1, Param::from(3));
    }

    #[test]
    fn test_normalize_rows_rejects_mismatched_columns() {
        let result = normalize_rows(vec![record! { "a" => 1 }, record! { "b" => 2 }]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_single_row_keeps_column_order() {
        let rows = normalize_rows(vec![record! { "b" => 1, "a" => 2 }]).unwrap();
        assert_eq!(rows[0][0].0, "b");
    }
}
