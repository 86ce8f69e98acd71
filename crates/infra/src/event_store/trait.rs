use std::sync::Arc;

use thiserror::Error;

use dddkit_core::{AggregateId, ExpectedVersion};
use dddkit_events::{EventStream, SharedEvent};

/// Event store operation error.
///
/// These are **infrastructure errors** (lookup, concurrency, backend) as opposed
/// to domain errors (validation, invariants, replay).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// No stream exists for the aggregate.
    #[error("no event stream for aggregate {0}")]
    NotFound(AggregateId),

    /// Optimistic concurrency check failed. Reload the aggregate and retry, or
    /// give up; the store never retries on its own.
    #[error(
        "optimistic concurrency check failed for aggregate {aggregate_id} (expected: {expected:?}, actual: {actual})"
    )]
    Concurrency {
        aggregate_id: AggregateId,
        expected: ExpectedVersion,
        actual: u64,
    },

    /// The backend could not serve the request.
    #[error("event store backend failure: {0}")]
    Backend(String),
}

impl EventStoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }
}

/// Append-only event store, one stream per aggregate.
///
/// ## Load Semantics
///
/// `load()` returns the full stream in append order with its current version,
/// or [`EventStoreError::NotFound`] when nothing was ever appended for the id.
///
/// ## Append Semantics
///
/// `append()`:
/// - Checks optimistic concurrency (`expected_version` must match the current
///   version; a missing stream is at version `0`)
/// - Persists events atomically (all or nothing)
/// - Returns the new stream version
///
/// `expected_version` is normally `ExpectedVersion::Exact(aggregate.version())`,
/// the version the aggregate was loaded at.
pub trait EventStore: Send + Sync {
    fn load(&self, aggregate_id: AggregateId) -> Result<EventStream, EventStoreError>;

    fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        events: Vec<SharedEvent>,
    ) -> Result<u64, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn load(&self, aggregate_id: AggregateId) -> Result<EventStream, EventStoreError> {
        (**self).load(aggregate_id)
    }

    fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        events: Vec<SharedEvent>,
    ) -> Result<u64, EventStoreError> {
        (**self).append(aggregate_id, expected_version, events)
    }
}
