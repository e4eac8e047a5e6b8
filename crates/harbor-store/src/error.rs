//! Error types for the entity store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A candidate entity failed a validation rule.
    #[error("validation failed on field '{field}' (rule: {rule}, value: {value})")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Name of the violated rule
        rule: String,
        /// Offending value, rendered as text
        value: String,
    },

    /// The requested entity does not exist (or has expired).
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Resource kind, e.g. `"task"`
        kind: String,
        /// Identifier that was looked up
        id: String,
    },

    /// The store is at its configured maximum size.
    #[error("store capacity reached ({max} entities)")]
    Capacity {
        /// Configured hard cap
        max: usize,
    },

    /// Unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed validation rule, reported by an injected validator.
///
/// Converted into [`Error::Validation`] when the store rejects a mutation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Field that failed validation
    pub field: String,
    /// Name of the violated rule
    pub rule: String,
    /// Offending value, rendered as text
    pub value: String,
}

impl ValidationIssue {
    /// Build an issue from anything string-like.
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            value: value.into(),
        }
    }
}

impl From<ValidationIssue> for Error {
    fn from(issue: ValidationIssue) -> Self {
        Self::Validation {
            field: issue.field,
            rule: issue.rule,
            value: issue.value,
        }
    }
}
