//! Domain-level error types.

use thiserror::Error;

/// Validation failures raised at every mutation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: &'static str },

    #[error("Field '{field}' is too long: {actual} characters (max {max})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("Invalid slug: {0:?}")]
    InvalidSlug(String),

    #[error("Invalid status: {0:?} (expected DF/Draft or PB/Published)")]
    InvalidStatus(String),
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Validation failed: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
