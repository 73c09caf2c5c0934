//! Error types for the storage layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Fixed message for failed multi-part queries.
pub const PARTS_QUERY_FAILED: &str = "We are unable to find the parts.";

/// Fixed message for failed single-part queries.
pub const PART_QUERY_FAILED: &str = "We are unable to find the part.";

/// Fixed message for failed product queries.
pub const PRODUCTS_QUERY_FAILED: &str = "We are unable to find the products.";

/// Stable classification of store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidProjection,
    InvalidProductType,
    InvalidQuery,
    QueryFailure,
    Config,
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Projection input was not a sequence of field names.
    #[error("projectionFields must be an array of field names")]
    InvalidProjection,

    /// Requested product type has no known collection.
    #[error("invalid product type: {0}")]
    InvalidProductType(String),

    /// Caller-supplied filter could not be turned into a store filter.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The underlying store operation failed. The cause is logged, not carried.
    #[error("{message}")]
    QueryFailure { message: &'static str },

    /// Database driver error raised outside of a query (connect, ping).
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A stored document did not have the expected shape.
    #[error("document decode error: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    /// Build a query failure carrying one of the fixed messages.
    pub fn query_failure(message: &'static str) -> Self {
        Self::QueryFailure { message }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidProjection => ErrorKind::InvalidProjection,
            Self::InvalidProductType(_) => ErrorKind::InvalidProductType,
            Self::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Self::QueryFailure { .. } | Self::Database(_) | Self::Decode(_) => {
                ErrorKind::QueryFailure
            }
            Self::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Whether this error was caused by bad caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidProjection | ErrorKind::InvalidProductType | ErrorKind::InvalidQuery
        )
    }
}
