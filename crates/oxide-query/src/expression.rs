//! Raw SQL fragments.

use std::fmt;

/// A raw SQL fragment emitted verbatim.
///
/// Expressions never contribute bindings and are never quoted or escaped,
/// so they must not carry user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression(String);

impl Expression {
    /// Wraps a SQL fragment.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The fragment text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`Expression::new`].
#[must_use]
pub fn raw(value: impl Into<String>) -> Expression {
    Expression::new(value)
}
