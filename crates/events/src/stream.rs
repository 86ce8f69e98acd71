//! Persisted event history of one aggregate.

use std::sync::Arc;

use crate::event::{Event, SharedEvent};

/// Ordered, versioned history of one aggregate instance, as loaded from a store.
///
/// `version` is the persisted position reported by the store. It is usually
/// `events.len()`, but a partially loaded stream (e.g. from a snapshot) may
/// report more; no cross-field validation happens here.
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    version: u64,
    events: Vec<SharedEvent>,
}

impl EventStream {
    pub fn new(version: u64, events: Vec<SharedEvent>) -> Self {
        Self { version, events }
    }

    /// Build a stream from events of a single concrete type.
    pub fn from_events<E, I>(version: u64, events: I) -> Self
    where
        E: Event,
        I: IntoIterator<Item = E>,
    {
        Self {
            version,
            events: events
                .into_iter()
                .map(|e| Arc::new(e) as SharedEvent)
                .collect(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn events(&self) -> &[SharedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_parts(self) -> (u64, Vec<SharedEvent>) {
        (self.version, self.events)
    }
}
