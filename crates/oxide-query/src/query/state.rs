//! Accumulated builder state, consumed by grammars.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::expression::Expression;
use crate::query::bindings::Bindings;
use crate::query::where_clause::{HavingNode, WhereNode};
use crate::value::SqlValue;

/// A column reference: an identifier (optionally qualified or aliased with
/// `as`) or a raw expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// Identifier such as `users.name as n`; quoted by the grammar.
    Name(String),
    /// Emitted verbatim.
    Raw(Expression),
}

impl Column {
    /// The identifier text, or the raw SQL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Raw(expression) => expression.value(),
        }
    }
}

impl From<&str> for Column {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for Column {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<&String> for Column {
    fn from(value: &String) -> Self {
        Self::Name(value.clone())
    }
}

impl From<Expression> for Column {
    fn from(value: Expression) -> Self {
        Self::Raw(value)
    }
}

/// A FROM or JOIN target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    /// Table name, optionally aliased (`users as u`); prefixed and quoted.
    Name(String),
    /// Raw table expression such as a compiled derived table.
    Raw(Expression),
}

impl TableRef {
    /// The table text, or the raw SQL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Raw(expression) => expression.value(),
        }
    }

    /// The alias after `as`, or the table name itself.
    #[must_use]
    pub fn alias(&self) -> &str {
        let text = self.as_str();
        crate::grammar::split_alias(text).map_or(text, |(_, alias)| alias)
    }
}

impl From<&str> for TableRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for TableRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<Expression> for TableRef {
    fn from(value: Expression) -> Self {
        Self::Raw(value)
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `INNER JOIN`.
    Inner,
    /// `LEFT JOIN`.
    Left,
    /// `RIGHT JOIN`.
    Right,
    /// `CROSS JOIN`.
    Cross,
}

impl JoinType {
    /// SQL keyword preceding `JOIN`.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Cross => "CROSS",
        }
    }
}

/// A compiled join: target plus its ON constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join flavour.
    pub kind: JoinType,
    /// Joined table.
    pub table: TableRef,
    /// ON constraints (same node shapes as WHERE).
    pub wheres: Vec<WhereNode>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(Error::invalid_argument(
                "order direction must be \"asc\" or \"desc\"",
            )),
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    /// Column or expression with a direction.
    Column {
        /// Sorted column.
        column: Column,
        /// Direction.
        direction: Direction,
    },
    /// Raw ordering SQL.
    Raw(String),
}

/// A unioned query.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    /// The unioned query.
    pub query: Box<QueryState>,
    /// `UNION ALL` rather than `UNION`.
    pub all: bool,
}

/// Row lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lock {
    /// Exclusive lock (`FOR UPDATE`).
    Update,
    /// Shared lock.
    Shared,
    /// Raw lock clause.
    Raw(String),
}

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// `COUNT`.
    Count,
    /// `MIN`.
    Min,
    /// `MAX`.
    Max,
    /// `SUM`.
    Sum,
    /// `AVG`.
    Avg,
}

impl AggregateFunction {
    /// SQL function name.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Aggregate replacing the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Function.
    pub function: AggregateFunction,
    /// Arguments; empty means `*`.
    pub columns: Vec<Column>,
}

/// A query used in a subquery position.
#[derive(Debug, Clone, PartialEq)]
pub enum Subquery {
    /// Structured query, compiled with the enclosing grammar.
    Query(Box<QueryState>),
    /// Pre-compiled SQL with its bindings.
    Raw {
        /// SQL text.
        sql: String,
        /// Bindings in placeholder order.
        bindings: Vec<SqlValue>,
    },
}

impl Subquery {
    /// Bindings the subquery contributes, in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> Vec<SqlValue> {
        match self {
            Self::Query(query) => query.bindings.flatten(),
            Self::Raw { bindings, .. } => bindings.clone(),
        }
    }
}

/// Query components that `Builder::clone_without` can reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Aggregate.
    Aggregate,
    /// Select list.
    Columns,
    /// DISTINCT flag.
    Distinct,
    /// FROM target.
    From,
    /// Joins.
    Joins,
    /// WHERE nodes.
    Wheres,
    /// GROUP BY.
    Groups,
    /// HAVING nodes.
    Havings,
    /// ORDER BY.
    Orders,
    /// LIMIT.
    Limit,
    /// OFFSET.
    Offset,
    /// Unions.
    Unions,
    /// Union ORDER BY.
    UnionOrders,
    /// Union LIMIT.
    UnionLimit,
    /// Union OFFSET.
    UnionOffset,
    /// Lock.
    Lock,
}

/// Everything a builder accumulates; grammars compile it to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Aggregate replacing the select list.
    pub aggregate: Option<Aggregate>,
    /// Select list; empty selects `*`.
    pub columns: Vec<Column>,
    /// SELECT DISTINCT.
    pub distinct: bool,
    /// FROM target.
    pub from: Option<TableRef>,
    /// Joins in call order.
    pub joins: Vec<Join>,
    /// WHERE nodes in call order.
    pub wheres: Vec<WhereNode>,
    /// GROUP BY columns.
    pub groups: Vec<Column>,
    /// HAVING nodes.
    pub havings: Vec<HavingNode>,
    /// ORDER BY entries.
    pub orders: Vec<Order>,
    /// LIMIT.
    pub limit: Option<u64>,
    /// OFFSET.
    pub offset: Option<u64>,
    /// Unioned queries.
    pub unions: Vec<Union>,
    /// ORDER BY applied to the union.
    pub union_orders: Vec<Order>,
    /// LIMIT applied to the union.
    pub union_limit: Option<u64>,
    /// OFFSET applied to the union.
    pub union_offset: Option<u64>,
    /// Lock clause.
    pub lock: Option<Lock>,
    /// Bindings per slot.
    pub bindings: Bindings,
}

impl QueryState {
    /// Resets one component to its empty value.
    pub fn reset(&mut self, component: Component) {
        match component {
            Component::Aggregate => self.aggregate = None,
            Component::Columns => self.columns.clear(),
            Component::Distinct => self.distinct = false,
            Component::From => self.from = None,
            Component::Joins => self.joins.clear(),
            Component::Wheres => self.wheres.clear(),
            Component::Groups => self.groups.clear(),
            Component::Havings => self.havings.clear(),
            Component::Orders => self.orders.clear(),
            Component::Limit => self.limit = None,
            Component::Offset => self.offset = None,
            Component::Unions => self.unions.clear(),
            Component::UnionOrders => self.union_orders.clear(),
            Component::UnionLimit => self.union_limit = None,
            Component::UnionOffset => self.union_offset = None,
            Component::Lock => self.lock = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!("DESC".parse::<Direction>(), Ok(Direction::Desc));
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_table_alias() {
        assert_eq!(TableRef::from("users as u").alias(), "u");
        assert_eq!(TableRef::from("users").alias(), "users");
    }

    #[test]
    fn test_reset_component() {
        let mut state = QueryState {
            limit: Some(3),
            columns: vec![Column::from("id")],
            ..QueryState::default()
        };
        state.reset(Component::Limit);
        state.reset(Component::Columns);
        assert_eq!(state, QueryState::default());
    }
}
