//! Messages, event-sourced aggregates and the message bus.
//!
//! - [`message`]: the `Message` → `Event` / `Command` hierarchy with runtime
//!   type identity and ancestry.
//! - [`sourced`]: [`EventSourcedAggregate`], replaying an [`EventStream`] and
//!   tracking uncommitted changes.
//! - [`bus`]: [`MessageBus`], routing published messages to [`Subscriber`]s by
//!   type and ancestor type, with scoped [`Subscription`]s.

pub mod bus;
pub mod command;
pub mod error;
pub mod event;
pub mod message;
pub mod sourced;
pub mod stream;
pub mod subscriber;

pub use bus::{MessageBus, Subscription, SubscriptionId};
pub use command::Command;
pub use error::BusError;
pub use event::{Event, SharedEvent};
pub use message::{
    AnyCommand, AnyEvent, AnyMessage, CommandFamily, EventFamily, Lineage, Message, MessageClass,
    MessageFamily, MessageKind, TypeKey,
};
pub use sourced::{EventSourced, EventSourcedAggregate, Mutations, SourcedAggregate};
pub use stream::EventStream;
pub use subscriber::{Callback, Subscriber};
