//! Append-only event store boundary.
//!
//! This module defines the contract aggregates are loaded from and saved to,
//! plus an in-memory implementation for tests and development. Durable
//! backends implement the same trait.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError};
