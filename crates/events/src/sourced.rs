//! Event-sourced aggregate base: replay, apply, pending changes.
//!
//! A concrete aggregate embeds an [`EventSourcedAggregate`] and declares its
//! state type and mutation table through [`EventSourced`]. Behavior methods on
//! the concrete aggregate validate against [`EventSourcedAggregate::state`],
//! then call [`EventSourcedAggregate::apply`] and, separately, publish the
//! returned event on a [`MessageBus`](crate::MessageBus) if they want to.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use dddkit_core::{DomainError, DomainResult};

use crate::event::{Event, SharedEvent};
use crate::message::MessageClass;
use crate::stream::EventStream;

type Handler<S> = Box<dyn Fn(&mut S, &dyn Event) + Send + Sync>;

/// Closed mutation-dispatch table for one aggregate type.
///
/// Handlers are keyed by the **exact** runtime type of an event; families are
/// not consulted. Build it once, typically in a `OnceLock`:
///
/// ```ignore
/// fn mutations() -> &'static Mutations<UserState> {
///     static TABLE: OnceLock<Mutations<UserState>> = OnceLock::new();
///     TABLE.get_or_init(|| {
///         Mutations::new("user")
///             .on(|state, e: &UserCreated| { /* ... */ })
///             .on(|state, e: &UserNameChanged| { /* ... */ })
///     })
/// }
/// ```
pub struct Mutations<S> {
    aggregate: &'static str,
    handlers: HashMap<TypeId, Handler<S>>,
}

impl<S: 'static> Mutations<S> {
    pub fn new(aggregate: &'static str) -> Self {
        Self {
            aggregate,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for events of exactly type `E`.
    ///
    /// Registering a second handler for the same type replaces the first.
    pub fn on<E, F>(mut self, handler: F) -> Self
    where
        E: Event + MessageClass,
        F: Fn(&mut S, &E) + Send + Sync + 'static,
    {
        self.handlers.insert(
            TypeId::of::<E>(),
            Box::new(move |state: &mut S, event: &dyn Event| {
                if let Some(event) = event.downcast_ref::<E>() {
                    handler(state, event);
                }
            }),
        );
        self
    }

    /// Aggregate name used in errors and logs.
    pub fn aggregate(&self) -> &'static str {
        self.aggregate
    }

    pub fn handles(&self, event: &dyn Event) -> bool {
        self.handlers.contains_key(&event.type_key().id())
    }

    /// Run the handler registered for `event`'s exact type against `state`.
    ///
    /// Fails with [`DomainError::UnhandledEvent`] before touching `state` when
    /// no handler is registered.
    pub fn dispatch(&self, state: &mut S, event: &dyn Event) -> DomainResult<()> {
        let key = event.type_key();
        let handler = self
            .handlers
            .get(&key.id())
            .ok_or_else(|| DomainError::unhandled_event(self.aggregate, key.name()))?;
        handler(state, event);
        Ok(())
    }
}

impl<S> fmt::Debug for Mutations<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutations")
            .field("aggregate", &self.aggregate)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Declares how an aggregate type folds events into state.
pub trait EventSourced: Sized + 'static {
    /// Snapshot derived from events. `Default` is the uninitialized state of a
    /// fresh aggregate (`Option<T>` is a natural choice).
    type State: Default;

    /// The aggregate's mutation table.
    fn mutations() -> &'static Mutations<Self::State>;
}

/// A concrete aggregate built around an [`EventSourcedAggregate`].
///
/// This is the seam repositories use to load and save any aggregate type.
pub trait SourcedAggregate: EventSourced {
    /// Rehydrate the concrete aggregate from persisted history.
    fn from_stream(stream: &EventStream) -> DomainResult<Self>;

    /// The embedded replay/apply state (version and pending changes).
    fn root(&self) -> &EventSourcedAggregate<Self>;
}

/// Replay/apply machinery shared by all event-sourced aggregates.
///
/// - `version` is fixed at construction: `0` when fresh, the stream's version
///   when rehydrated. It is the expected version for the next append and is
///   never advanced by [`apply`](Self::apply).
/// - `changes` holds only events applied after construction.
pub struct EventSourcedAggregate<A: EventSourced> {
    version: u64,
    state: A::State,
    changes: Vec<SharedEvent>,
}

impl<A: EventSourced> EventSourcedAggregate<A> {
    /// A fresh aggregate with no history.
    pub fn new() -> Self {
        Self {
            version: 0,
            state: A::State::default(),
            changes: Vec::new(),
        }
    }

    /// Rehydrate from persisted history.
    ///
    /// Every event is dispatched, in order, to the mutation table. An event with
    /// no handler aborts the whole replay; no aggregate is returned.
    pub fn from_stream(stream: &EventStream) -> DomainResult<Self> {
        let table = A::mutations();
        let mut state = A::State::default();
        for event in stream.events() {
            table.dispatch(&mut state, event.as_ref())?;
        }

        debug!(
            aggregate = table.aggregate(),
            version = stream.version(),
            replayed = stream.len(),
            "rehydrated aggregate"
        );

        Ok(Self {
            version: stream.version(),
            state,
            changes: Vec::new(),
        })
    }

    /// Apply a new event: mutate state, then record it as a pending change.
    ///
    /// Returns the shared event so the caller can publish it.
    pub fn apply<E: Event>(&mut self, event: E) -> DomainResult<SharedEvent> {
        let event: SharedEvent = Arc::new(event);
        self.apply_shared(Arc::clone(&event))?;
        Ok(event)
    }

    /// Same as [`apply`](Self::apply) for an already shared event.
    pub fn apply_shared(&mut self, event: SharedEvent) -> DomainResult<()> {
        A::mutations().dispatch(&mut self.state, event.as_ref())?;
        self.changes.push(event);
        Ok(())
    }

    /// Pending (uncommitted) events, oldest first.
    ///
    /// Returns an independent copy; modifying it does not affect the aggregate.
    pub fn changes(&self) -> Vec<SharedEvent> {
        self.changes.clone()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> &A::State {
        &self.state
    }
}

impl<A: EventSourced> Default for EventSourcedAggregate<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for EventSourcedAggregate<A>
where
    A: EventSourced,
    A::State: Clone,
{
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            state: self.state.clone(),
            changes: self.changes.clone(),
        }
    }
}

impl<A> fmt::Debug for EventSourcedAggregate<A>
where
    A: EventSourced,
    A::State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSourcedAggregate")
            .field("aggregate", &A::mutations().aggregate())
            .field("version", &self.version)
            .field("state", &self.state)
            .field("changes", &self.changes)
            .finish()
    }
}
