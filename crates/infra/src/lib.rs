//! Infrastructure layer: event store boundary and aggregate persistence.

pub mod event_store;
pub mod repository;


pub use event_store::{EventStore, EventStoreError, InMemoryEventStore};
pub use repository::{Repository, RepositoryError};
