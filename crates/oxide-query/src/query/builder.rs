//! The fluent query builder.

use std::fmt;

use crate::connection::ConnectionInterface;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::grammar::Grammar;
use crate::query::bindings::{BindingSlot, Bindings};
use crate::query::conditions::{Conditions, ConditionsState, resolve_operator};
use crate::query::join::JoinClause;
use crate::query::state::{
    Column, Component, Direction, JoinType, Lock, Order, QueryState, TableRef, Union,
};
use crate::query::subquery::IntoSubquery;
use crate::query::where_clause::{Boolean, HavingNode};
use crate::value::{Param, SqlValue};

/// A query under construction against one connection.
///
/// # Example
///
/// ```rust,ignore
/// use oxide_query::prelude::*;
///
/// let users = connection
///     .table("users")
///     .select(["id", "name"])
///     .where_("votes", ">", 100)
///     .or_where_nested(|q| q.where_eq("name", "John").where_null("deleted_at"))
///     .order_by("name", Direction::Asc)
///     .get()?;
/// ```
#[derive(Clone)]
pub struct Builder<'a> {
    pub(crate) connection: &'a dyn ConnectionInterface,
    pub(crate) state: QueryState,
    pub(crate) error: Option<Error>,
    pub(crate) use_write_connection: bool,
}

impl<'a> Builder<'a> {
    /// Creates an empty builder on `connection`.
    #[must_use]
    pub fn new(connection: &'a dyn ConnectionInterface) -> Self {
        Self {
            connection,
            state: QueryState::default(),
            error: None,
            use_write_connection: false,
        }
    }

    /// A fresh builder on the same connection.
    #[must_use]
    pub fn new_query(&self) -> Self {
        Self::new(self.connection)
    }

    /// The connection this builder runs on.
    #[must_use]
    pub fn connection(&self) -> &'a dyn ConnectionInterface {
        self.connection
    }

    /// The grammar compiling this builder.
    #[must_use]
    pub fn grammar(&self) -> &'a dyn Grammar {
        let connection: &'a dyn ConnectionInterface = self.connection;
        connection.grammar()
    }

    /// The accumulated query.
    #[must_use]
    pub const fn state(&self) -> &QueryState {
        &self.state
    }

    /// The first usage error recorded, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.error.clone().map_or(Ok(()), Err)
    }

    // --- select list ---

    /// Replaces the select list. An empty list selects `*`.
    #[must_use]
    pub fn select<C: Into<Column>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        self.state.columns = columns.into_iter().map(Into::into).collect();
        self.state.bindings.clear(BindingSlot::Select);
        self
    }

    /// Appends columns, skipping ones already selected.
    #[must_use]
    pub fn add_select<C: Into<Column>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        for column in columns {
            let column = column.into();
            if !self.state.columns.contains(&column) {
                self.state.columns.push(column);
            }
        }
        self
    }

    /// Appends a raw select expression with bindings.
    #[must_use]
    pub fn select_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.state.columns.push(Column::Raw(Expression::new(sql)));
        self.state.bindings.extend(BindingSlot::Select, bindings);
        self
    }

    /// Appends `(subquery) AS alias`.
    #[must_use]
    pub fn select_sub(mut self, query: impl IntoSubquery, alias: &str) -> Self {
        match query.into_subquery() {
            Ok(query) => {
                let grammar = self.grammar();
                let sql = format!("({}) AS {}", grammar.compile_subquery(&query), grammar.wrap(alias));
                self.select_raw(&sql, query.bindings())
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// SELECT DISTINCT.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.state.distinct = true;
        self
    }

    // --- from ---

    /// Sets the FROM table; `"users as u"` aliases it.
    #[must_use]
    pub fn from(mut self, table: impl Into<TableRef>) -> Self {
        self.state.from = Some(table.into());
        self
    }

    /// Sets the FROM table with an alias.
    #[must_use]
    pub fn from_as(self, table: &str, alias: &str) -> Self {
        self.from(format!("{table} as {alias}"))
    }

    /// FROM a derived table.
    #[must_use]
    pub fn from_sub(mut self, query: impl IntoSubquery, alias: &str) -> Self {
        match query.into_subquery() {
            Ok(query) => {
                let grammar = self.grammar();
                let sql = format!(
                    "({}) AS {}",
                    grammar.compile_subquery(&query),
                    grammar.wrap_table(alias)
                );
                self.from_raw(&sql, query.bindings())
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// Raw FROM expression with bindings.
    #[must_use]
    pub fn from_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.state.from = Some(TableRef::Raw(Expression::new(sql)));
        self.state.bindings.extend(BindingSlot::From, bindings);
        self
    }

    // --- joins ---

    fn add_join(
        mut self,
        kind: JoinType,
        table: TableRef,
        build: impl FnOnce(JoinClause<'a>) -> JoinClause<'a>,
    ) -> Self {
        let clause = build(JoinClause::new(self.connection, kind, table));
        match clause.into_join() {
            Ok((join, bindings)) => {
                self.state.joins.push(join);
                self.state.bindings.extend(BindingSlot::Join, bindings);
            }
            Err(error) => self.fail(error),
        }
        self
    }

    /// `INNER JOIN table ON first operator second`.
    #[must_use]
    pub fn join(self, table: impl Into<TableRef>, first: &str, operator: &str, second: &str) -> Self {
        self.add_join(JoinType::Inner, table.into(), |j| j.on(first, operator, second))
    }

    /// `INNER JOIN` with constraints built by `f`.
    #[must_use]
    pub fn join_on(self, table: impl Into<TableRef>, f: impl FnOnce(JoinClause<'a>) -> JoinClause<'a>) -> Self {
        self.add_join(JoinType::Inner, table.into(), f)
    }

    /// `INNER JOIN table ON first operator ?`.
    #[must_use]
    pub fn join_where(
        self,
        table: impl Into<TableRef>,
        first: &str,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        let value = value.into();
        self.add_join(JoinType::Inner, table.into(), |j| j.where_(first, operator, value))
    }

    /// `LEFT JOIN table ON first operator second`.
    #[must_use]
    pub fn left_join(self, table: impl Into<TableRef>, first: &str, operator: &str, second: &str) -> Self {
        self.add_join(JoinType::Left, table.into(), |j| j.on(first, operator, second))
    }

    /// `LEFT JOIN` with constraints built by `f`.
    #[must_use]
    pub fn left_join_on(
        self,
        table: impl Into<TableRef>,
        f: impl FnOnce(JoinClause<'a>) -> JoinClause<'a>,
    ) -> Self {
        self.add_join(JoinType::Left, table.into(), f)
    }

    /// `LEFT JOIN table ON first operator ?`.
    #[must_use]
    pub fn left_join_where(
        self,
        table: impl Into<TableRef>,
        first: &str,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        let value = value.into();
        self.add_join(JoinType::Left, table.into(), |j| j.where_(first, operator, value))
    }

    /// `RIGHT JOIN table ON first operator second`.
    #[must_use]
    pub fn right_join(self, table: impl Into<TableRef>, first: &str, operator: &str, second: &str) -> Self {
        self.add_join(JoinType::Right, table.into(), |j| j.on(first, operator, second))
    }

    /// `RIGHT JOIN` with constraints built by `f`.
    #[must_use]
    pub fn right_join_on(
        self,
        table: impl Into<TableRef>,
        f: impl FnOnce(JoinClause<'a>) -> JoinClause<'a>,
    ) -> Self {
        self.add_join(JoinType::Right, table.into(), f)
    }

    /// `CROSS JOIN table`.
    #[must_use]
    pub fn cross_join(self, table: impl Into<TableRef>) -> Self {
        self.add_join(JoinType::Cross, table.into(), |j| j)
    }

    fn add_join_sub(
        mut self,
        kind: JoinType,
        query: impl IntoSubquery,
        alias: &str,
        build: impl FnOnce(JoinClause<'a>) -> JoinClause<'a>,
    ) -> Self {
        match query.into_subquery() {
            Ok(query) => {
                let grammar = self.grammar();
                let table = TableRef::Raw(Expression::new(format!(
                    "({}) AS {}",
                    grammar.compile_subquery(&query),
                    grammar.wrap_table(alias)
                )));
                self.state.bindings.extend(BindingSlot::Join, query.bindings());
                self.add_join(kind, table, build)
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// `INNER JOIN (subquery) AS alias ON first operator second`.
    ///
    /// The subquery's bindings precede the constraint's in the join slot.
    #[must_use]
    pub fn join_sub(
        self,
        query: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        self.add_join_sub(JoinType::Inner, query, alias, |j| j.on(first, operator, second))
    }

    /// `LEFT JOIN (subquery) AS alias ON first operator second`.
    #[must_use]
    pub fn left_join_sub(
        self,
        query: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        self.add_join_sub(JoinType::Left, query, alias, |j| j.on(first, operator, second))
    }

    /// `RIGHT JOIN (subquery) AS alias ON first operator second`.
    #[must_use]
    pub fn right_join_sub(
        self,
        query: impl IntoSubquery,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        self.add_join_sub(JoinType::Right, query, alias, |j| j.on(first, operator, second))
    }

    // --- grouping ---

    /// Appends GROUP BY columns.
    #[must_use]
    pub fn group_by<C: Into<Column>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        self.state.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Appends a raw GROUP BY expression with bindings.
    #[must_use]
    pub fn group_by_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.state.groups.push(Column::Raw(Expression::new(sql)));
        self.state.bindings.extend(BindingSlot::GroupBy, bindings);
        self
    }

    fn push_having(mut self, node: HavingNode, bindings: impl IntoIterator<Item = SqlValue>) -> Self {
        self.state.havings.push(node);
        self.state.bindings.extend(BindingSlot::Having, bindings);
        self
    }

    fn add_having(mut self, column: Column, operator: &str, value: Param, boolean: Boolean) -> Self {
        let (operator, value) = match resolve_operator(self.grammar(), Some(operator), value) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.fail(error);
                return self;
            }
        };
        let bindings = value.as_value().cloned();
        self.push_having(
            HavingNode::Basic {
                column,
                operator,
                value,
                boolean,
            },
            bindings,
        )
    }

    /// `HAVING column operator value`.
    #[must_use]
    pub fn having(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.add_having(column.into(), operator, value.into(), Boolean::And)
    }

    /// `OR column operator value` in HAVING.
    #[must_use]
    pub fn or_having(self, column: impl Into<Column>, operator: &str, value: impl Into<Param>) -> Self {
        self.add_having(column.into(), operator, value.into(), Boolean::Or)
    }

    /// `HAVING column BETWEEN low AND high`.
    #[must_use]
    pub fn having_between(self, column: impl Into<Column>, low: impl Into<Param>, high: impl Into<Param>) -> Self {
        let (low, high) = (low.into(), high.into());
        let bindings: Vec<SqlValue> = [&low, &high]
            .into_iter()
            .filter_map(|p| p.as_value().cloned())
            .collect();
        self.push_having(
            HavingNode::Between {
                column: column.into(),
                low,
                high,
                negated: false,
                boolean: Boolean::And,
            },
            bindings,
        )
    }

    /// `HAVING column IS NULL`.
    #[must_use]
    pub fn having_null(self, column: impl Into<Column>) -> Self {
        let node = HavingNode::Null {
            column: column.into(),
            negated: false,
            boolean: Boolean::And,
        };
        self.push_having(node, [])
    }

    /// `HAVING column IS NOT NULL`.
    #[must_use]
    pub fn having_not_null(self, column: impl Into<Column>) -> Self {
        let node = HavingNode::Null {
            column: column.into(),
            negated: true,
            boolean: Boolean::And,
        };
        self.push_having(node, [])
    }

    /// Parenthesized HAVING group built by `f`; an empty group is dropped.
    #[must_use]
    pub fn having_nested(mut self, f: impl FnOnce(Self) -> Self) -> Self {
        let nested = f(self.for_nested());
        match nested.into_query_state() {
            Ok(state) if state.havings.is_empty() => self,
            Ok(state) => {
                let bindings = state.bindings.slot(BindingSlot::Having).to_vec();
                self.push_having(
                    HavingNode::Nested {
                        query: Box::new(state),
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

    /// Raw HAVING predicate with bindings.
    #[must_use]
    pub fn having_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        let node = HavingNode::Raw {
            sql: sql.to_string(),
            boolean: Boolean::And,
        };
        self.push_having(node, bindings)
    }

    /// `OR` raw HAVING predicate.
    #[must_use]
    pub fn or_having_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        let node = HavingNode::Raw {
            sql: sql.to_string(),
            boolean: Boolean::Or,
        };
        self.push_having(node, bindings)
    }

    // --- ordering ---

    fn push_order(mut self, order: Order, bindings: Vec<SqlValue>) -> Self {
        if self.state.unions.is_empty() {
            self.state.orders.push(order);
            self.state.bindings.extend(BindingSlot::Order, bindings);
        } else {
            self.state.union_orders.push(order);
            self.state.bindings.extend(BindingSlot::UnionOrder, bindings);
        }
        self
    }

    /// ORDER BY a column. After a union, orders the union.
    #[must_use]
    pub fn order_by(self, column: impl Into<Column>, direction: Direction) -> Self {
        let order = Order::Column {
            column: column.into(),
            direction,
        };
        self.push_order(order, Vec::new())
    }

    /// ORDER BY column DESC.
    #[must_use]
    pub fn order_by_desc(self, column: impl Into<Column>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Newest first by `column`.
    #[must_use]
    pub fn latest(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Oldest first by `column`.
    #[must_use]
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column, Direction::Asc)
    }

    /// ORDER BY the dialect's random function, optionally seeded.
    #[must_use]
    pub fn in_random_order(self, seed: &str) -> Self {
        let sql = self.grammar().compile_random(seed);
        self.order_by_raw(&sql, Vec::new())
    }

    /// Raw ORDER BY expression with bindings.
    #[must_use]
    pub fn order_by_raw(self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        self.push_order(Order::Raw(sql.to_string()), bindings)
    }

    /// ORDER BY `(subquery)`.
    #[must_use]
    pub fn order_by_sub(mut self, query: impl IntoSubquery, direction: Direction) -> Self {
        match query.into_subquery() {
            Ok(query) => {
                let column = Column::Raw(Expression::new(format!(
                    "({})",
                    self.grammar().compile_subquery(&query)
                )));
                self.push_order(Order::Column { column, direction }, query.bindings())
            }
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// Drops every ordering and its bindings.
    #[must_use]
    pub fn reorder(mut self) -> Self {
        self.state.orders.clear();
        self.state.union_orders.clear();
        self.state.bindings.clear(BindingSlot::Order);
        self.state.bindings.clear(BindingSlot::UnionOrder);
        self
    }

    // --- limit and offset ---

    pub(crate) fn set_limit(mut self, limit: u64) -> Self {
        if self.state.unions.is_empty() {
            self.state.limit = Some(limit);
        } else {
            self.state.union_limit = Some(limit);
        }
        self
    }

    pub(crate) fn set_offset(mut self, offset: u64) -> Self {
        if self.state.unions.is_empty() {
            self.state.offset = Some(offset);
        } else {
            self.state.union_offset = Some(offset);
        }
        self
    }

    /// LIMIT. Negative values are ignored.
    #[must_use]
    pub fn limit(self, value: i64) -> Self {
        match u64::try_from(value) {
            Ok(limit) => self.set_limit(limit),
            Err(_) => self,
        }
    }

    /// Alias of [`limit`](Self::limit).
    #[must_use]
    pub fn take(self, value: i64) -> Self {
        self.limit(value)
    }

    /// OFFSET. Negative values become zero.
    #[must_use]
    pub fn offset(self, value: i64) -> Self {
        self.set_offset(u64::try_from(value).unwrap_or(0))
    }

    /// Alias of [`offset`](Self::offset).
    #[must_use]
    pub fn skip(self, value: i64) -> Self {
        self.offset(value)
    }

    /// Offset and limit for a 1-based page.
    #[must_use]
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.set_offset(offset).set_limit(per_page)
    }

    // --- unions ---

    fn add_union(mut self, query: Builder<'_>, all: bool) -> Self {
        match query.into_query_state() {
            Ok(state) => {
                let bindings = state.bindings.flatten();
                self.state.unions.push(Union {
                    query: Box::new(state),
                    all,
                });
                self.state.bindings.extend(BindingSlot::Union, bindings);
            }
            Err(error) => self.fail(error),
        }
        self
    }

    /// `UNION query`.
    #[must_use]
    pub fn union(self, query: Builder<'_>) -> Self {
        self.add_union(query, false)
    }

    /// `UNION ALL query`.
    #[must_use]
    pub fn union_all(self, query: Builder<'_>) -> Self {
        self.add_union(query, true)
    }

    // --- locking ---

    /// Row lock; reads then go to the write connection.
    #[must_use]
    pub fn lock(mut self, lock: Lock) -> Self {
        self.state.lock = Some(lock);
        self.use_write_connection = true;
        self
    }

    /// Exclusive row lock.
    #[must_use]
    pub fn lock_for_update(self) -> Self {
        self.lock(Lock::Update)
    }

    /// Shared row lock.
    #[must_use]
    pub fn shared_lock(self) -> Self {
        self.lock(Lock::Shared)
    }

    /// Runs reads on the write connection.
    #[must_use]
    pub const fn use_write_connection(mut self) -> Self {
        self.use_write_connection = true;
        self
    }

    // --- composition ---

    /// Applies `f` only when `condition` holds.
    #[must_use]
    pub fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition { f(self) } else { self }
    }

    /// Applies the macro registered on the connection under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedMethod`] if no such macro exists.
    pub fn call_macro(self, name: &str, args: &[SqlValue]) -> Result<Self> {
        match self.connection.macros() {
            Some(registry) => registry.call(name, self, args),
            None => Err(Error::UndefinedMethod(name.to_string())),
        }
    }

    /// A copy with the given components reset.
    #[must_use]
    pub fn clone_without(&self, components: &[Component]) -> Self {
        let mut clone = self.clone();
        for component in components {
            clone.state.reset(*component);
        }
        clone
    }

    /// A copy with the given binding slots emptied.
    #[must_use]
    pub fn clone_without_bindings(&self, slots: &[BindingSlot]) -> Self {
        let mut clone = self.clone();
        for slot in slots {
            clone.state.bindings.clear(*slot);
        }
        clone
    }

    // --- bindings ---

    /// Appends values to a binding slot.
    #[must_use]
    pub fn add_binding(mut self, values: impl IntoIterator<Item = SqlValue>, slot: BindingSlot) -> Self {
        self.state.bindings.extend(slot, values);
        self
    }

    /// Replaces a binding slot's values.
    #[must_use]
    pub fn set_bindings(mut self, values: Vec<SqlValue>, slot: BindingSlot) -> Self {
        self.state.bindings.set(slot, values);
        self
    }

    /// Appends every slot of `other` to this builder's slots.
    #[must_use]
    pub fn merge_bindings(mut self, other: &Self) -> Self {
        self.state.bindings.merge(&other.state.bindings);
        self
    }

    /// Bindings in placeholder order.
    #[must_use]
    pub fn get_bindings(&self) -> Vec<SqlValue> {
        self.state.bindings.flatten()
    }

    /// Bindings grouped by slot.
    #[must_use]
    pub const fn raw_bindings(&self) -> &Bindings {
        &self.state.bindings
    }

    // --- compilation ---

    /// Compiles the SELECT.
    ///
    /// # Errors
    ///
    /// Returns the first usage error recorded while building.
    pub fn to_sql(&self) -> Result<String> {
        self.check()?;
        Ok(self.grammar().compile_select(&self.state))
    }

    /// Compiles the SELECT with bindings inlined. For debugging only.
    ///
    /// # Errors
    ///
    /// Returns the first usage error recorded while building.
    pub fn to_raw_sql(&self) -> Result<String> {
        let sql = self.to_sql()?;
        Ok(self.grammar().substitute_bindings(&sql, &self.get_bindings()))
    }
}

impl<'a> Conditions<'a> for Builder<'a> {}

impl<'a> ConditionsState<'a> for Builder<'a> {
    fn connection(&self) -> &'a dyn ConnectionInterface {
        self.connection
    }

    fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn for_nested(&self) -> Self {
        let mut nested = self.new_query();
        nested.state.from.clone_from(&self.state.from);
        nested
    }

    fn into_query_state(self) -> Result<QueryState> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.state),
        }
    }
}

impl fmt::Debug for Builder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("connection", &self.connection.name())
            .field("state", &self.state)
            .field("error", &self.error)
            .field("use_write_connection", &self.use_write_connection)
            .finish()
    }
}
