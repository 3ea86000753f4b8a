//! Values accepted in subquery positions.

use crate::error::Result;
use crate::expression::Expression;
use crate::query::Builder;
use crate::query::conditions::ConditionsState;
use crate::query::state::Subquery;

/// Converts a builder or raw SQL into a [`Subquery`].
///
/// Builders keep their structure and are compiled with the enclosing
/// query's grammar; strings and expressions are taken as finished SQL
/// without bindings.
pub trait IntoSubquery {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Returns the error recorded on a builder while it was being built.
    fn into_subquery(self) -> Result<Subquery>;
}

impl IntoSubquery for Builder<'_> {
    fn into_subquery(self) -> Result<Subquery> {
        self.into_query_state().map(|state| Subquery::Query(Box::new(state)))
    }
}

impl IntoSubquery for &Builder<'_> {
    fn into_subquery(self) -> Result<Subquery> {
        self.clone().into_subquery()
    }
}

impl IntoSubquery for &str {
    fn into_subquery(self) -> Result<Subquery> {
        Ok(Subquery::Raw {
            sql: self.to_string(),
            bindings: Vec::new(),
        })
    }
}

impl IntoSubquery for String {
    fn into_subquery(self) -> Result<Subquery> {
        Ok(Subquery::Raw {
            sql: self,
            bindings: Vec::new(),
        })
    }
}

impl IntoSubquery for Expression {
    fn into_subquery(self) -> Result<Subquery> {
        Ok(Subquery::Raw {
            sql: self.value().to_string(),
            bindings: Vec::new(),
        })
    }
}

impl IntoSubquery for Subquery {
    fn into_subquery(self) -> Result<Subquery> {
        Ok(self)
    }
}
