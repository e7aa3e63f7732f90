//! Unified error types and result handling for the ledger core.
//!
//! Every fallible operation returns [`Result`]. Callers that need to map a failure to a
//! status code or chat reply should match on [`Error::kind`] rather than on variants.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Coarse classification that the API and bot layers map to user-visible responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Event shape or argument violates the data model
    InvalidInput,
    /// Referenced entity is absent, deleted, or owned by someone else
    NotFound,
    /// Locked pocket mutated from user scope, or protected entity touched
    Forbidden,
    /// Unique-index violation or write-write conflict
    Conflict,
    /// Store unavailable or session aborted; may be retried if idempotent
    Transient,
    /// Runtime invariant violation
    Internal,
}

/// All errors produced by the ledger core.
#[derive(Debug, Error)]
pub enum Error {
    /// Generic validation failure
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong
        message: String,
    },

    /// Amount is zero, negative, or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount in minor units
        amount: i64,
    },

    /// Transaction participants do not form an allowed shape for its type
    #[error("Invalid transaction shape: {message}")]
    InvalidShape {
        /// Description of the offending combination
        message: String,
    },

    /// Entity missing, soft-deleted, or belonging to another user
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"pocket"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Operation is not permitted in the caller's scope
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Reason for the rejection
        message: String,
    },

    /// Uniqueness rule violated at the service boundary
    #[error("Conflict: {message}")]
    Conflict {
        /// Which rule was violated
        message: String,
    },

    /// Operation did not finish before its deadline
    #[error("Operation timed out after {seconds}s: {operation}")]
    Timeout {
        /// Name of the operation
        operation: &'static str,
        /// Deadline that elapsed
        seconds: u64,
    },

    /// Invariant broken at runtime
    #[error("Internal error: {message}")]
    Internal {
        /// Details for the log
        message: String,
    },

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Details of the configuration problem
        message: String,
    },

    /// Failure reported by the store
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classifies the error for the collaborator layer.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } | Self::InvalidAmount { .. } | Self::InvalidShape { .. } => {
                ErrorKind::InvalidInput
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Timeout { .. } => ErrorKind::Transient,
            Self::Database(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ErrorKind::Conflict,
                _ => ErrorKind::Transient,
            },
            Self::Internal { .. } | Self::Config { .. } | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry an idempotent operation.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
