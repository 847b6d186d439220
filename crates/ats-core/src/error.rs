//! Error types for the persistence boundary.

use std::fmt;

use thiserror::Error;

/// Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Candidate field guarded by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Document,
    Email,
}

impl UniqueField {
    /// Wire name of the field, used to attribute field errors.
    pub fn field_name(self) -> &'static str {
        match self {
            UniqueField::Document => "document",
            UniqueField::Email => "email",
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Error raised by persistence collaborators.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write collided with an existing record on a unique field
    #[error("Unique constraint violated on {0}")]
    UniqueViolation(UniqueField),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
