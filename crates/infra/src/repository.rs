//! Aggregate persistence on top of an [`EventStore`].
//!
//! ```text
//! load:  store.load(id) → EventStream → A::from_stream (replay)
//! save:  aggregate.changes() → store.append(id, Exact(aggregate.version()), changes)
//! ```
//!
//! Publishing is not part of saving: behavior methods publish each event on the
//! bus themselves when they apply it.
//!
//! The aggregate's version is never advanced after a save. To keep working with
//! an aggregate after persisting it, load it again.

use thiserror::Error;
use tracing::debug;

use dddkit_core::{AggregateId, DomainError, ExpectedVersion};
use dddkit_events::SourcedAggregate;

use crate::event_store::{EventStore, EventStoreError};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// Replaying the stored history failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_concurrency_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(EventStoreError::NotFound(_)))
    }
}

/// Loads and saves event-sourced aggregates of any type.
#[derive(Debug, Clone)]
pub struct Repository<S> {
    store: S,
}

impl<S> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: EventStore> Repository<S> {
    /// Rehydrate an aggregate from its persisted stream.
    pub fn load<A: SourcedAggregate>(
        &self,
        id: impl Into<AggregateId>,
    ) -> Result<A, RepositoryError> {
        let id = id.into();
        let stream = self.store.load(id)?;
        debug!(aggregate = %id, version = stream.version(), events = stream.len(), "loading aggregate");
        Ok(A::from_stream(&stream)?)
    }

    /// Append the aggregate's pending changes, expecting the stream to still be
    /// at the version the aggregate was loaded at.
    ///
    /// Returns the new stream version. Nothing is written when there are no
    /// pending changes.
    pub fn save<A: SourcedAggregate>(
        &self,
        id: impl Into<AggregateId>,
        aggregate: &A,
    ) -> Result<u64, RepositoryError> {
        let id = id.into();
        let root = aggregate.root();
        let changes = root.changes();
        if changes.is_empty() {
            return Ok(root.version());
        }

        let version = self
            .store
            .append(id, ExpectedVersion::Exact(root.version()), changes)?;
        debug!(aggregate = %id, version, "saved aggregate");
        Ok(version)
    }
}
