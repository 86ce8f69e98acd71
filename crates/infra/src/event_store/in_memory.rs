use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use dddkit_core::{AggregateId, ExpectedVersion};
use dddkit_events::{EventStream, SharedEvent};

use super::r#trait::{EventStore, EventStoreError};

/// In-memory append-only event store.
///
/// Intended for tests/dev. The stream version is the number of stored events.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<SharedEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a stream (`0` if it does not exist).
    pub fn version_of(&self, aggregate_id: AggregateId) -> Result<u64, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        Ok(streams.get(&aggregate_id).map_or(0, |s| s.len() as u64))
    }
}

impl EventStore for InMemoryEventStore {
    fn load(&self, aggregate_id: AggregateId) -> Result<EventStream, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        let events = streams
            .get(&aggregate_id)
            .ok_or(EventStoreError::NotFound(aggregate_id))?;
        Ok(EventStream::new(events.len() as u64, events.clone()))
    }

    fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        events: Vec<SharedEvent>,
    ) -> Result<u64, EventStoreError> {
        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        let current = streams.get(&aggregate_id).map_or(0, |s| s.len() as u64);
        if !expected_version.matches(current) {
            debug!(
                aggregate = %aggregate_id,
                expected = ?expected_version,
                actual = current,
                "append rejected: version conflict"
            );
            return Err(EventStoreError::Concurrency {
                aggregate_id,
                expected: expected_version,
                actual: current,
            });
        }

        if events.is_empty() {
            return Ok(current);
        }

        let stream = streams.entry(aggregate_id).or_default();
        stream.extend(events);
        let version = stream.len() as u64;

        debug!(aggregate = %aggregate_id, version, "appended events");
        Ok(version)
    }
}
