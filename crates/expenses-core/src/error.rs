//! Error types for the expenses transaction store.

use thiserror::Error;

use crate::query::Operator;
use crate::validation::Field;

/// Result type alias using the store's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for transaction store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or out-of-range input for a single field
    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: Field, message: String },

    /// Operator has no defined semantics for the field it was paired with
    #[error("Unsupported operator '{op}' for field {field}")]
    UnsupportedOperator { field: Field, op: Operator },

    /// Mutation request carried no changes
    #[error("No changes requested")]
    NoOp,

    /// Batch mutation touched fewer rows than requested and was rolled back
    #[error("Partial failure: {affected} of {requested} transactions updated, batch rolled back")]
    PartialFailure { requested: usize, affected: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`] on `field`.
    pub fn invalid(field: Field, message: impl Into<String>) -> Self {
        Error::InvalidInput {
            field,
            message: message.into(),
        }
    }

    /// The offending field, for input errors.
    pub fn field(&self) -> Option<Field> {
        match self {
            Error::InvalidInput { field, .. } | Error::UnsupportedOperator { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }
}
