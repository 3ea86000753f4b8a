//! WHERE and HAVING node shapes.

use crate::query::state::{Column, QueryState, Subquery};
use crate::value::Param;

/// How a node joins the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Boolean {
    /// `AND`.
    #[default]
    And,
    /// `OR`.
    Or,
}

impl Boolean {
    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Date component compared by date-based wheres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Day of month.
    Day,
    /// Month.
    Month,
    /// Year.
    Year,
}

impl DatePart {
    /// Lowercase name, as used by `EXTRACT` and dialect functions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Right-hand side of an IN predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum InSource {
    /// Literal list.
    Values(Vec<Param>),
    /// Subquery.
    Query(Subquery),
}

/// One WHERE (or JOIN ON) predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// `column operator value`.
    Basic {
        /// Left side.
        column: Column,
        /// Lowercased operator.
        operator: String,
        /// Right side.
        value: Param,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `first operator second`, both identifiers.
    Column {
        /// Left identifier.
        first: Column,
        /// Lowercased operator.
        operator: String,
        /// Right identifier.
        second: Column,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// Parenthesized group.
    Nested {
        /// Inner query; only its wheres are compiled.
        query: Box<QueryState>,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column operator (subquery)`.
    Sub {
        /// Left side.
        column: Column,
        /// Lowercased operator.
        operator: String,
        /// Right side.
        query: Subquery,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column [NOT] IN (...)`.
    In {
        /// Tested column.
        column: Column,
        /// Values or subquery.
        source: InSource,
        /// `NOT IN`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column IS [NOT] NULL`.
    Null {
        /// Tested column.
        column: Column,
        /// `IS NOT NULL`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column [NOT] BETWEEN low AND high`.
    Between {
        /// Tested column.
        column: Column,
        /// Lower bound.
        low: Param,
        /// Upper bound.
        high: Param,
        /// `NOT BETWEEN`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column [NOT] BETWEEN low_column AND high_column`.
    BetweenColumns {
        /// Tested column.
        column: Column,
        /// Lower bound column.
        low: Column,
        /// Upper bound column.
        high: Column,
        /// `NOT BETWEEN`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `[NOT] EXISTS (subquery)`.
    Exists {
        /// Tested query.
        query: Subquery,
        /// `NOT EXISTS`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// Comparison on a date component of a column.
    Date {
        /// Compared component.
        part: DatePart,
        /// Tested column.
        column: Column,
        /// Lowercased operator.
        operator: String,
        /// Right side.
        value: Param,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// Raw SQL.
    Raw {
        /// SQL text.
        sql: String,
        /// Joining boolean.
        boolean: Boolean,
    },
}

impl WhereNode {
    /// The joining boolean.
    #[must_use]
    pub const fn boolean(&self) -> Boolean {
        match self {
            Self::Basic { boolean, .. }
            | Self::Column { boolean, .. }
            | Self::Nested { boolean, .. }
            | Self::Sub { boolean, .. }
            | Self::In { boolean, .. }
            | Self::Null { boolean, .. }
            | Self::Between { boolean, .. }
            | Self::BetweenColumns { boolean, .. }
            | Self::Exists { boolean, .. }
            | Self::Date { boolean, .. }
            | Self::Raw { boolean, .. } => *boolean,
        }
    }
}

/// One HAVING predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum HavingNode {
    /// `column operator value`.
    Basic {
        /// Left side.
        column: Column,
        /// Lowercased operator.
        operator: String,
        /// Right side.
        value: Param,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// Parenthesized group.
    Nested {
        /// Inner query; only its havings are compiled.
        query: Box<QueryState>,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column [NOT] BETWEEN low AND high`.
    Between {
        /// Tested column.
        column: Column,
        /// Lower bound.
        low: Param,
        /// Upper bound.
        high: Param,
        /// `NOT BETWEEN`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// `column IS [NOT] NULL`.
    Null {
        /// Tested column.
        column: Column,
        /// `IS NOT NULL`.
        negated: bool,
        /// Joining boolean.
        boolean: Boolean,
    },
    /// Raw SQL.
    Raw {
        /// SQL text.
        sql: String,
        /// Joining boolean.
        boolean: Boolean,
    },
}

impl HavingNode {
    /// The joining boolean.
    #[must_use]
    pub const fn boolean(&self) -> Boolean {
        match self {
            Self::Basic { boolean, .. }
            | Self::Nested { boolean, .. }
            | Self::Between { boolean, .. }
            | Self::Null { boolean, .. }
            | Self::Raw { boolean, .. } => *boolean,
        }
    }
}

/// Comparison operators every dialect accepts.
pub const OPERATORS: &[&str] = &[
    "=",
    "<",
    ">",
    "<=",
    ">=",
    "<>",
    "!=",
    "<=>",
    "like",
    "like binary",
    "not like",
    "ilike",
    "&",
    "|",
    "^",
    "<<",
    ">>",
    "&~",
    "is",
    "is not",
    "rlike",
    "not rlike",
    "regexp",
    "not regexp",
    "~",
    "~*",
    "!~",
    "!~*",
    "similar to",
    "not similar to",
    "not ilike",
    "~~*",
    "!~~*",
];

/// Returns true if `operator` (lowercased) is a generic or dialect operator.
#[must_use]
pub fn is_known_operator(operator: &str, dialect_operators: &[&str]) -> bool {
    OPERATORS.contains(&operator) || dialect_operators.contains(&operator)
}

/// A `NULL` value is only meaningful with `=`, `<>` and `!=`.
#[must_use]
pub fn is_invalid_operator_and_value(operator: &str, value: &Param) -> bool {
    value.is_null()
        && OPERATORS.contains(&operator)
        && !matches!(operator, "=" | "<>" | "!=")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;

    #[test]
    fn test_null_only_with_equality_operators() {
        let null = Param::Value(SqlValue::Null);
        assert!(is_invalid_operator_and_value(">", &null));
        assert!(!is_invalid_operator_and_value("=", &null));
        assert!(!is_invalid_operator_and_value("!=", &null));
        assert!(!is_invalid_operator_and_value(">", &Param::from(1)));
    }

    #[test]
    fn test_dialect_operators_extend_the_set() {
        assert!(is_known_operator("like", &[]));
        assert!(!is_known_operator("@>", &[]));
        assert!(is_known_operator("@>", &["@>"]));
    }
}
