//! JOIN constraints.

use std::fmt;

use crate::connection::ConnectionInterface;
use crate::error::{Error, Result};
use crate::query::conditions::{Conditions, ConditionsState};
use crate::query::state::{Column, Join, JoinType, QueryState, TableRef};
use crate::value::SqlValue;

/// Builds the ON clause of one join.
///
/// Supports every [`Conditions`] method; `on` compares two columns while
/// `where_` compares a column with a bound value.
#[derive(Clone)]
pub struct JoinClause<'a> {
    connection: &'a dyn ConnectionInterface,
    kind: JoinType,
    table: TableRef,
    state: QueryState,
    error: Option<Error>,
}

impl<'a> JoinClause<'a> {
    pub(crate) fn new(connection: &'a dyn ConnectionInterface, kind: JoinType, table: TableRef) -> Self {
        Self {
            connection,
            kind,
            table,
            state: QueryState::default(),
            error: None,
        }
    }

    /// `ON first operator second`.
    #[must_use]
    pub fn on(self, first: impl Into<Column>, operator: &str, second: impl Into<Column>) -> Self {
        self.where_column(first, operator, second)
    }

    /// `OR first operator second`.
    #[must_use]
    pub fn or_on(self, first: impl Into<Column>, operator: &str, second: impl Into<Column>) -> Self {
        self.or_where_column(first, operator, second)
    }

    /// Parenthesized group of ON constraints.
    #[must_use]
    pub fn on_nested(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.where_nested(f)
    }

    /// Join flavour.
    #[must_use]
    pub const fn kind(&self) -> JoinType {
        self.kind
    }

    /// Joined table.
    #[must_use]
    pub const fn table(&self) -> &TableRef {
        &self.table
    }

    /// The finished join and its bindings in placeholder order.
    pub(crate) fn into_join(self) -> Result<(Join, Vec<SqlValue>)> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let bindings = self.state.bindings.flatten();
        Ok((
            Join {
                kind: self.kind,
                table: self.table,
                wheres: self.state.wheres,
            },
            bindings,
        ))
    }
}

impl<'a> Conditions<'a> for JoinClause<'a> {}

impl<'a> ConditionsState<'a> for JoinClause<'a> {
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
        Self::new(self.connection, self.kind, self.table.clone())
    }

    fn into_query_state(self) -> Result<QueryState> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.state),
        }
    }
}

impl fmt::Debug for JoinClause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinClause")
            .field("connection", &self.connection.name())
            .field("kind", &self.kind)
            .field("table", &self.table)
            .field("state", &self.state)
            .field("error", &self.error)
            .finish()
    }
}
