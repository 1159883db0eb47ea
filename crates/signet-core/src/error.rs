//! Unified error type for the signet application.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for API handlers to derive an HTTP status code via
//! [`Error::http_status`]. The pool and transaction layers never convert one
//! variant into another; they add rollback/release side effects around the
//! original error and re-raise it verbatim.

use std::fmt;

/// Unified error type covering all failure modes in signet.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "user").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Timed out waiting for a database connection from the pool.
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Schema bootstrap failed while creating a connection. The connection
    /// is destroyed rather than pooled half-initialized.
    #[error("Schema bootstrap failed: {0}")]
    Bootstrap(String),

    /// A commit or rollback itself failed at the database level.
    #[error("Transaction {op} failed: {message}")]
    Transaction {
        /// Which framing statement failed ("begin", "commit", "rollback").
        op: &'static str,
        /// Human-readable error description.
        message: String,
    },

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::PoolExhausted(_) => 503,
            Error::Bootstrap(_) => 500,
            Error::Transaction { .. } => 500,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Bootstrap`].
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Error::Bootstrap(message.into())
    }

    /// Convenience constructor for [`Error::Transaction`].
    pub fn transaction(op: &'static str, message: impl fmt::Display) -> Self {
        Error::Transaction {
            op,
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
