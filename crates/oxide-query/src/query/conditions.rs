//! WHERE-clause methods shared by [`Builder`] and [`JoinClause`].
//!
//! [`JoinClause`]: crate::query::JoinClause

use chrono::Timelike as _;

use crate::connection::ConnectionInterface;
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::query::Builder;
use crate::query::bindings::BindingSlot;
use crate::query::state::{Column, QueryState};
use crate::query::subquery::IntoSubquery;
use crate::query::where_clause::{
    Boolean, DatePart, InSource, WhereNode, is_invalid_operator_and_value, is_known_operator,
};
use crate::value::{Param, SqlValue};

/// Resolves the operator of a basic comparison.
///
/// `None` is the two-argument form (`=`). A `NULL` value with an ordering
/// operator is rejected. An operator the dialect does not know is taken
/// as the value, compared with `=`.
pub(crate) fn resolve_operator(
    grammar: &dyn Grammar,
    operator: Option<&str>,
    value: Param,
) -> Result<(String, Param)> {
    let Some(given) = operator else {
        return Ok(("=".to_string(), value));
    };
    let operator = given.trim().to_ascii_lowercase();
    if is_invalid_operator_and_value(&operator, &value) {
        return Err(Error::invalid_argument(
            "illegal operator and value combination",
        ));
    }
    if is_known_operator(&operator, grammar.operators()) {
        Ok((operator, value))
    } else {
        Ok(("=".to_string(), Param::from(given)))
    }
}

/// Plumbing behind [`Conditions`]. The module is private, so only this
/// crate's builders implement it.
pub trait ConditionsState<'a>: Sized {
    /// Connection used for grammar lookups and subquery builders.
    fn connection(&self) -> &'a dyn ConnectionInterface;

    /// State receiving the predicates.
    fn state_mut(&mut self) -> &mut QueryState;

    /// Records a usage error; the first one wins.
    fn fail(&mut self, error: Error);

    /// Empty instance of the same kind, for parenthesized groups.
    #[must_use]
    fn for_nested(&self) -> Self;

    /// Consumes the receiver, surfacing any recorded error.
    ///
    /// # Errors
    ///
    /// Returns the first usage error recorded while building.
    fn into_query_state(self) -> Result<QueryState>;

    /// Appends a predicate with its bindings in the where slot.
    #[must_use]
    fn push_where(mut self, node: WhereNode, bindings: impl IntoIterator<Item = SqlValue>) -> Self {
        let state = self.state_mut();
        state.wheres.push(node);
        state.bindings.extend(BindingSlot::Where, bindings);
        self
    }

    /// `column operator value`, joined with `boolean`.
    #[must_use]
    fn push_basic_where(
        mut self,
        column: Column,
        operator: Option<&str>,
        value: Param,
        boolean: Boolean,
    ) -> Self {
        let grammar = self.connection().grammar();
        let (operator, value) = match resolve_operator(grammar, operator, value) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.fail(error);
                return self;
            }
        };
        if value.is_null() {
            let negated = operator != "=";
            return self.push_where(
                WhereNode::Null {
                    column,
                    negated,
                    boolean,
                },
                [],
            );
        }
        let bindings = value.as_value().cloned();
        self.push_where(
            WhereNode::Basic {
                column,
                operator,
                value,
                boolean,
            },
            bindings,
        )
    }

    /// Compares two columns.
    #[must_use]
    fn push_where_column(
        mut self,
        first: Column,
        operator: &str,
        second: Column,
        boolean: Boolean,
    ) -> Self {
        let operator = operator.trim().to_ascii_lowercase();
        if !is_known_operator(&operator, self.connection().grammar().operators()) {
            self.fail(Error::invalid_argument(format!(
                "invalid column comparison operator: {operator}"
            )));
            return self;
        }
        self.push_where(
            WhereNode::Column {
                first,
                operator,
                second,
                boolean,
            },
            [],
        )
    }

    /// `column [NOT] IN (values)`; raw expressions are not bound.
    #[must_use]
    fn push_where_in(self, column: Column, values: Vec<Param>, negated: bool, boolean: Boolean) -> Self {
        let bindings: Vec<SqlValue> = values.iter().filter_map(|v| v.as_value().cloned()).collect();
        self.push_where(
            WhereNode::In {
                column,
                source: InSource::Values(values),
                negated,
                boolean,
            },
            bindings,
        )
    }

    /// `column [NOT] IN (subquery)`.
    #[must_use]
    fn push_where_in_sub(
        mut self,
        column: Column,
        query: impl IntoSubquery,
        negated: bool,
        boolean: Boolean,
    ) -> Self {
        match query.into_subquery() {
            Ok(query) => {
                let bindings = query.bindings();
                self.push_where(
                    WhereNode::In {
                        column,
                        source: InSource::Query(query),
                        negated,
                        boolean,
                    },
                    bindings,
                )
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// `column [NOT] BETWEEN low AND high`.
    #[must_use]
    fn push_where_between(
        self,
        column: Column,
        low: Param,
        high: Param,
        negated: bool,
        boolean: Boolean,
    ) -> Self {
        let bindings: Vec<SqlValue> = [&low, &high]
            .into_iter()
            .filter_map(|p| p.as_value().cloned())
            .collect();
        self.push_where(
            WhereNode::Between {
                column,
                low,
                high,
                negated,
                boolean,
            },
            bindings,
        )
    }

    /// Parenthesized group built by `f`; an empty group is dropped.
    #[must_use]
    fn push_where_nested(mut self, f: impl FnOnce(Self) -> Self, boolean: Boolean) -> Self {
        let nested = f(self.for_nested());
        match nested.into_query_state() {
            Ok(state) if state.wheres.is_empty() => self,
            Ok(state) => {
                let bindings = state.bindings.slot(BindingSlot::Where).to_vec();
                self.push_where(
                    WhereNode::Nested {
                        query: Box::new(state),
                        boolean,
                    },
                    bindings,
                )
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// `[NOT] EXISTS (subquery)`.
    #[must_use]
    fn push_where_exists(mut self, query: impl IntoSubquery, negated: bool, boolean: Boolean) -> Self {
        match query.into_subquery() {
            Ok(query) => {
                let bindings = query.bindings();
                self.push_where(
                    WhereNode::Exists {
                        query,
                        negated,
                        boolean,
                    },
                    bindings,
                )
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// Comparison on a date component.
    #[must_use]
    fn push_where_date(
        mut self,
        part: DatePart,
        column: Column,
        operator: &str,
        value: Param,
        boolean: Boolean,
    ) -> Self {
        let grammar = self.connection().grammar();
        let (operator, value) = match resolve_operator(grammar, Some(operator), value) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.fail(error);
                return self;
            }
        };
        let value = normalize_date_value(part, value);
        let bindings = value.as_value().cloned();
        self.push_where(
            WhereNode::Date {
                part,
                column,
                operator,
                value,
                boolean,
            },
            bindings,
        )
    }
}

/// Predicate-building methods.
///
/// Every method consumes and returns the receiver so calls chain. Usage
/// errors are recorded and surface when the query is compiled.
pub trait Conditions<'a>: ConditionsState<'a> {
    /// `WHERE column operator value`. A `NULL` value becomes `IS NULL`
    /// (or `IS NOT NULL` for `<>`/`!=`).
    #[must_use]
    fn where_(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_basic_where(column.into(), Some(operator), value.into(), Boolean::And)
    }

    /// `OR column operator value`.
    #[must_use]
    fn or_where(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_basic_where(column.into(), Some(operator), value.into(), Boolean::Or)
    }

    /// `WHERE column = value`.
    #[must_use]
    fn where_eq(self, column: impl Into<Column>, value: impl Into<Param>) -> Self {
        self.push_basic_where(column.into(), None, value.into(), Boolean::And)
    }

    /// `OR column = value`.
    #[must_use]
    fn or_where_eq(self, column: impl Into<Column>, value: impl Into<Param>) -> Self {
        self.push_basic_where(column.into(), None, value.into(), Boolean::Or)
    }

    /// `WHERE first operator second`.
    #[must_use]
    fn where_column(self, first: impl Into<Column>, operator: &str, second: impl Into<Column>) -> Self {
        self.push_where_column(first.into(), operator, second.into(), Boolean::And)
    }

    /// `OR first operator second`.
    #[must_use]
    fn or_where_column(self, first: impl Into<Column>, operator: &str, second: impl Into<Column>) -> Self {
        self.push_where_column(first.into(), operator, second.into(), Boolean::Or)
    }

    /// `WHERE column IN (...)`; an empty list matches nothing.
    #[must_use]
    fn where_in<V: Into<Param>>(self, column: impl Into<Column>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where_in(column.into(), values, false, Boolean::And)
    }

    /// `OR column IN (...)`.
    #[must_use]
    fn or_where_in<V: Into<Param>>(self, column: impl Into<Column>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where_in(column.into(), values, false, Boolean::Or)
    }

    /// `WHERE column NOT IN (...)`; an empty list matches everything.
    #[must_use]
    fn where_not_in<V: Into<Param>>(self, column: impl Into<Column>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where_in(column.into(), values, true, Boolean::And)
    }

    /// `OR column NOT IN (...)`.
    #[must_use]
    fn or_where_not_in<V: Into<Param>>(
        self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where_in(column.into(), values, true, Boolean::Or)
    }

    /// `WHERE column IN (subquery)`.
    #[must_use]
    fn where_in_sub(self, column: impl Into<Column>, query: impl IntoSubquery) -> Self {
        self.push_where_in_sub(column.into(), query, false, Boolean::And)
    }

    /// `WHERE column NOT IN (subquery)`.
    #[must_use]
    fn where_not_in_sub(self, column: impl Into<Column>, query: impl IntoSubquery) -> Self {
        self.push_where_in_sub(column.into(), query, true, Boolean::And)
    }

    /// `WHERE column IS NULL`.
    #[must_use]
    fn where_null(self, column: impl Into<Column>) -> Self {
        let node = WhereNode::Null {
            column: column.into(),
            negated: false,
            boolean: Boolean::And,
        };
        self.push_where(node, [])
    }

    /// `OR column IS NULL`.
    #[must_use]
    fn or_where_null(self, column: impl Into<Column>) -> Self {
        let node = WhereNode::Null {
            column: column.into(),
            negated: false,
            boolean: Boolean::Or,
        };
        self.push_where(node, [])
    }

    /// `WHERE column IS NOT NULL`.
    #[must_use]
    fn where_not_null(self, column: impl Into<Column>) -> Self {
        let node = WhereNode::Null {
            column: column.into(),
            negated: true,
            boolean: Boolean::And,
        };
        self.push_where(node, [])
    }

    /// `OR column IS NOT NULL`.
    #[must_use]
    fn or_where_not_null(self, column: impl Into<Column>) -> Self {
        let node = WhereNode::Null {
            column: column.into(),
            negated: true,
            boolean: Boolean::Or,
        };
        self.push_where(node, [])
    }

    /// `WHERE column BETWEEN low AND high`.
    #[must_use]
    fn where_between(self, column: impl Into<Column>, low: impl Into<Param>, high: impl Into<Param>) -> Self {
        self.push_where_between(column.into(), low.into(), high.into(), false, Boolean::And)
    }

    /// `OR column BETWEEN low AND high`.
    #[must_use]
    fn or_where_between(self, column: impl Into<Column>, low: impl Into<Param>, high: impl Into<Param>) -> Self {
        self.push_where_between(column.into(), low.into(), high.into(), false, Boolean::Or)
    }

    /// `WHERE column NOT BETWEEN low AND high`.
    #[must_use]
    fn where_not_between(self, column: impl Into<Column>, low: impl Into<Param>, high: impl Into<Param>) -> Self {
        self.push_where_between(column.into(), low.into(), high.into(), true, Boolean::And)
    }

    /// `WHERE column BETWEEN low_column AND high_column`.
    #[must_use]
    fn where_between_columns(
        self,
        column: impl Into<Column>,
        low: impl Into<Column>,
        high: impl Into<Column>,
    ) -> Self {
        let node = WhereNode::BetweenColumns {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
            boolean: Boolean::And,
        };
        self.push_where(node, [])
    }

    /// `WHERE (...)`.
    #[must_use]
    fn where_nested(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.push_where_nested(f, Boolean::And)
    }

    /// `OR (...)`.
    #[must_use]
    fn or_where_nested(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.push_where_nested(f, Boolean::Or)
    }

    /// `WHERE column operator (subquery)`.
    #[must_use]
    fn where_sub(mut self, column: impl Into<Column>, operator: &str, query: impl IntoSubquery) -> Self {
        let operator = operator.trim().to_ascii_lowercase();
        if !is_known_operator(&operator, self.connection().grammar().operators()) {
            self.fail(Error::invalid_argument(format!("invalid operator: {operator}")));
            return self;
        }
        match query.into_subquery() {
            Ok(query) => {
                let bindings = query.bindings();
                self.push_where(
                    WhereNode::Sub {
                        column: column.into(),
                        operator,
                        query,
                        boolean: Boolean::And,
                    },
                    bindings,
                )
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// `WHERE EXISTS (...)` over a query built by `f` on a fresh builder.
    #[must_use]
    fn where_exists(self, f: impl FnOnce(Builder<'a>) -> Builder<'a>) -> Self {
        let query = f(Builder::new(self.connection()));
        self.push_where_exists(query, false, Boolean::And)
    }

    /// `OR EXISTS (...)`.
    #[must_use]
    fn or_where_exists(self, f: impl FnOnce(Builder<'a>) -> Builder<'a>) -> Self {
        let query = f(Builder::new(self.connection()));
        self.push_where_exists(query, false, Boolean::Or)
    }

    /// `WHERE NOT EXISTS (...)`.
    #[must_use]
    fn where_not_exists(self, f: impl FnOnce(Builder<'a>) -> Builder<'a>) -> Self {
        let query = f(Builder::new(self.connection()));
        self.push_where_exists(query, true, Boolean::And)
    }

    /// `WHERE EXISTS (query)` for an existing builder or raw SQL.
    #[must_use]
    fn where_exists_sub(self, query: impl IntoSubquery) -> Self {
        self.push_where_exists(query, false, Boolean::And)
    }

    /// Compares the date part of a column.
    #[must_use]
    fn where_date(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where_date(DatePart::Date, column.into(), operator, value.into(), Boolean::And)
    }

    /// `OR` form of [`where_date`](Self::where_date).
    #[must_use]
    fn or_where_date(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where_date(DatePart::Date, column.into(), operator, value.into(), Boolean::Or)
    }

    /// Compares the time part of a column.
    #[must_use]
    fn where_time(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where_date(DatePart::Time, column.into(), operator, value.into(), Boolean::And)
    }

    /// Compares the day of month; integers are zero-padded.
    #[must_use]
    fn where_day(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where_date(DatePart::Day, column.into(), operator, value.into(), Boolean::And)
    }

    /// Compares the month; integers are zero-padded.
    #[must_use]
    fn where_month(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where_date(DatePart::Month, column.into(), operator, value.into(), Boolean::And)
    }

    /// Compares the year.
    #[must_use]
    fn where_year(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where_date(DatePart::Year, column.into(), operator, value.into(), Boolean::And)
    }

    /// Raw predicate with bindings.
    #[must_use]
    fn where_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        let node = WhereNode::Raw {
            sql: sql.to_string(),
            boolean: Boolean::And,
        };
        self.push_where(node, bindings)
    }

    /// `OR` raw predicate.
    #[must_use]
    fn or_where_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        let node = WhereNode::Raw {
            sql: sql.to_string(),
            boolean: Boolean::Or,
        };
        self.push_where(node, bindings)
    }
}

/// Date values compare as the text the dialect functions produce.
fn normalize_date_value(part: DatePart, value: Param) -> Param {
    let Param::Value(value) = value else {
        return value;
    };
    let value = match (part, value) {
        (DatePart::Date, SqlValue::Timestamp(ts)) => SqlValue::Date(ts.date()),
        (DatePart::Time, SqlValue::Timestamp(ts)) => SqlValue::Time(ts.time()),
        (DatePart::Time, SqlValue::Time(t)) => SqlValue::Time(t.with_nanosecond(0).unwrap_or(t)),
        (DatePart::Day | DatePart::Month, SqlValue::Int(n)) => SqlValue::Text(format!("{n:02}")),
        (_, other) => other,
    };
    Param::Value(value)
}
