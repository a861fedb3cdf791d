//! Error types for pgfrag

use crate::query::CompiledQuery;
use crate::transaction::IsolationLevel;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Result type alias for pgfrag operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for fragment compilation, execution and transactions
#[derive(Debug, Error)]
pub enum DbError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error reported by `tokio-postgres`, kept intact so the SQLSTATE survives.
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Coded error reported by a driver that is not `tokio-postgres`.
    #[error("Database error {}: {message}", .code.code())]
    Database { code: SqlState, message: String },

    /// An expression that cannot be rendered where it appears
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query expected to return exactly one row returned none
    #[error("Expected exactly one row, got none: {}", .0.text())]
    NotExactlyOne(Box<CompiledQuery>),

    /// A nested transaction call asked for a stronger isolation than the active one
    #[error("Active transaction is {active}, which does not satisfy requested {requested}")]
    IsolationMismatch {
        active: IsolationLevel,
        requested: IsolationLevel,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a coded database error.
    pub fn database(code: SqlState, message: impl Into<String>) -> Self {
        Self::Database {
            code,
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid expression error
    pub fn invalid_expression(message: impl Into<String>) -> Self {
        Self::InvalidExpression(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The native SQLSTATE of this error, if the database reported one.
    pub fn code(&self) -> Option<&SqlState> {
        match self {
            Self::Query(err) => err.code(),
            Self::Database { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this is a `40001 serialization_failure` error
    pub fn is_serialization_failure(&self) -> bool {
        self.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE)
    }

    /// Check if this is a `40P01 deadlock_detected` error
    pub fn is_deadlock(&self) -> bool {
        self.code() == Some(&SqlState::T_R_DEADLOCK_DETECTED)
    }

    /// Whether the transaction controller may retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.is_serialization_failure() || self.is_deadlock()
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(&SqlState::UNIQUE_VIOLATION)
    }

    /// Check if this is a "not exactly one row" error
    pub fn is_not_exactly_one(&self) -> bool {
        matches!(self, Self::NotExactlyOne(_))
    }

    /// The query that produced this error, when one was attached.
    pub fn query(&self) -> Option<&CompiledQuery> {
        match self {
            Self::NotExactlyOne(query) => Some(query),
            _ => None,
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for DbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(err) => Self::Query(err),
            err => Self::Pool(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
