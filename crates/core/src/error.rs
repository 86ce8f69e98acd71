//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts, replay). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An aggregate has no mutation handler for the exact type of an event.
    ///
    /// Raised during replay and when applying new events. State is never
    /// partially updated when this is returned.
    #[error("aggregate '{aggregate}' has no handler for event '{event}'")]
    UnhandledEvent {
        aggregate: &'static str,
        event: &'static str,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn unhandled_event(aggregate: &'static str, event: &'static str) -> Self {
        Self::UnhandledEvent { aggregate, event }
    }

    /// Whether this error came from a missing mutation handler.
    pub fn is_unhandled_event(&self) -> bool {
        matches!(self, Self::UnhandledEvent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhandled_event_names_aggregate_and_event() {
        let err = DomainError::unhandled_event("user", "user.deleted");
        assert!(err.is_unhandled_event());
        assert_eq!(
            err.to_string(),
            "aggregate 'user' has no handler for event 'user.deleted'"
        );
    }

    #[test]
    fn constructors_wrap_messages() {
        assert_eq!(
            DomainError::validation("name cannot be empty").to_string(),
            "validation failed: name cannot be empty"
        );
        assert!(!DomainError::conflict("stale").is_unhandled_event());
    }
}
