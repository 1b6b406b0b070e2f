//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`FleetError`]
//! via `#[from]`. The three variants map directly onto the HTTP statuses the
//! REST adapter returns: 400, 404, and 500.

/// Top-level error for all fleethub operations.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// The caller supplied a malformed, missing, or out-of-enum input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The referenced device or history entry does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Unexpected storage or broadcast failure.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Input validation failure carrying **every** violated constraint,
/// not just the first one found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", violations.join("; "))]
pub struct ValidationError {
    /// Human-readable descriptions of each violation.
    pub violations: Vec<String>,
}

impl ValidationError {
    /// Build a validation error from a list of violations.
    #[must_use]
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    /// Build a validation error with a single violation.
    #[must_use]
    pub fn single(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }
}

/// A referenced record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of record that was looked up (e.g. `"Device"`).
    pub entity: &'static str,
    /// Identifier that failed to resolve.
    pub id: String,
}
