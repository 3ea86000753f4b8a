//! Error types for configuration and connection management.

use oxide_query::DriverError;

/// Errors raised while resolving, configuring or opening connections.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// No connection is configured under this name.
    #[error("Database connection [{0}] not configured")]
    UnknownConnection(String),

    /// No driver factory is registered for this dialect.
    #[error("Unsupported driver [{0}]")]
    UnsupportedDriver(String),

    /// A connection URL could not be parsed.
    #[error("Invalid database URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Opening the physical connection failed.
    #[error("Failed to connect: {0}")]
    Connect(#[from] DriverError),

    /// A statement failed.
    #[error(transparent)]
    Query(#[from] oxide_query::Error),

    /// IO error (reading configuration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for connection management.
pub type Result<T> = std::result::Result<T, DbError>;
