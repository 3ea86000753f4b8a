//! Error types for query building and execution.

use std::fmt;

use thiserror::Error;

use crate::value::SqlValue;

/// Driver-neutral failure reported by the physical connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Vendor error code or SQLSTATE, when the driver reports one.
    pub code: Option<String>,
    /// Vendor error message.
    pub message: String,
}

impl DriverError {
    /// Creates an error without a code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Creates an error with a vendor code.
    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Returns true if the code matches.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

/// Identifies the connection a statement ran on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDetails {
    /// Configured connection name.
    pub name: String,
    /// Driver name (`sqlite`, `mysql`, ...).
    pub driver: String,
    /// Host, if any.
    pub host: Option<String>,
    /// Port, if any.
    pub port: Option<u16>,
    /// Database name or path.
    pub database: Option<String>,
}

impl fmt::Display for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection: {}", self.name)?;
        if let Some(host) = &self.host {
            write!(f, ", Host: {host}")?;
        }
        if let Some(port) = self.port {
            write!(f, ", Port: {port}")?;
        }
        if let Some(database) = &self.database {
            write!(f, ", Database: {database}")?;
        }
        Ok(())
    }
}

/// A failed statement with its SQL, bindings and connection metadata.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{source} ({connection}, SQL: {sql})")]
pub struct QueryException {
    /// Where the statement ran.
    pub connection: ConnectionDetails,
    /// The SQL text.
    pub sql: String,
    /// Prepared bindings sent with the SQL.
    pub bindings: Vec<SqlValue>,
    /// Underlying driver error.
    pub source: DriverError,
}

/// Kind of integrity constraint a statement violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Unique or primary key.
    Unique,
    /// Foreign key.
    ForeignKey,
    /// NOT NULL.
    NotNull,
    /// CHECK constraint.
    Check,
    /// Integrity violation of unknown kind.
    Other,
}

/// Errors raised while building, compiling or running queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Bad builder input: operator/value combination, binding slot,
    /// non-numeric increment, mismatched insert rows.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The dialect cannot express the requested statement.
    #[error("this database engine ({driver}) does not support {feature}")]
    Unsupported {
        /// Grammar name.
        driver: &'static str,
        /// Statement kind.
        feature: &'static str,
    },

    /// Macro dispatch found no registered macro.
    #[error("call to undefined method {0}()")]
    UndefinedMethod(String),

    /// A statement failed.
    #[error(transparent)]
    Query(Box<QueryException>),

    /// A statement violated an integrity constraint.
    #[error("integrity constraint violation ({kind:?}): {exception}")]
    ConstraintViolation {
        /// Constraint kind.
        kind: ConstraintKind,
        /// The failed statement.
        exception: Box<QueryException>,
    },

    /// The connection was lost and cannot be re-established.
    #[error("lost connection and no reconnector available")]
    LostConnection,

    /// Opening or re-opening the physical connection failed.
    #[error("connection error: {0}")]
    Connection(DriverError),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The failed statement, for query and constraint errors.
    #[must_use]
    pub fn query_exception(&self) -> Option<&QueryException> {
        match self {
            Self::Query(exception) | Self::ConstraintViolation { exception, .. } => {
                Some(exception)
            }
            _ => None,
        }
    }

    /// The driver error at the root of a failed statement.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Connection(error) => Some(error),
            other => other.query_exception().map(|e| &e.source),
        }
    }

    /// Returns true for integrity constraint violations.
    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_exception_message_includes_connection_and_sql() {
        let exception = QueryException {
            connection: ConnectionDetails {
                name: "main".into(),
                driver: "sqlite".into(),
                database: Some(":memory:".into()),
                ..ConnectionDetails::default()
            },
            sql: "SELECT 1".into(),
            bindings: vec![],
            source: DriverError::new("boom"),
        };
        let error = Error::Query(Box::new(exception));
        assert_eq!(
            error.to_string(),
            "boom (Connection: main, Database: :memory:, SQL: SELECT 1)"
        );
        assert_eq!(error.driver_error().map(|e| e.message.as_str()), Some("boom"));
    }
}
