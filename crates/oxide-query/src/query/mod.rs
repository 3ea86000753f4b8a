//! Fluent query building.
//!
//! A [`Builder`] accumulates a [`QueryState`] and per-clause
//! [`Bindings`]; the connection's grammar compiles the state to SQL when a
//! terminal method runs. Builders are values: every fluent method consumes
//! and returns the builder, and `clone()` yields a fully independent copy.

pub mod bindings;
mod builder;
mod conditions;
mod execute;
mod join;
pub mod macros;
pub mod pagination;
pub mod state;
mod subquery;
pub mod where_clause;

pub use bindings::{BindingSlot, Bindings};
pub use builder::Builder;
pub use conditions::Conditions;
pub use join::JoinClause;
pub use macros::{MacroFn, MacroRegistry};
pub use pagination::{LengthAwarePaginator, Paginator};
pub use state::{
    Aggregate, AggregateFunction, Column, Component, Direction, Join, JoinType, Lock, Order,
    QueryState, Subquery, TableRef, Union,
};
pub use subquery::IntoSubquery;
pub use where_clause::{Boolean, DatePart, HavingNode, InSource, WhereNode};
