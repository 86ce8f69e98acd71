//! In-process, type-routed message bus.
//!
//! Subscribers register interest in a message class; `publish` delivers a
//! message to every subscriber whose class is the message's runtime type or one
//! of its ancestors. Subscribing to a family (e.g. `UserEvent`) therefore
//! receives every event derived from it without re-subscribing per subtype.
//!
//! ## Delivery
//!
//! - **Synchronous**: callbacks run in-line on the publishing thread, before
//!   `publish` returns. No queueing, no retries.
//! - **Ordered**: matching subscribers run in registration order, across all
//!   classes they registered under.
//! - **Fail fast**: the first callback error aborts the rest of the fan-out and
//!   is returned to the publisher.
//!
//! The subscriber table is locked only while it is read or changed. Callbacks
//! run against a snapshot taken at the start of `publish`, so a callback may
//! publish, subscribe or release subscriptions itself.
//!
//! ## Lifetimes
//!
//! `subscribe` returns a [`Subscription`] guard. Dropping it (or calling
//! [`Subscription::close`]) removes exactly the subscribers it registered, also
//! when the scope unwinds. [`MessageBus::reset`] clears everything regardless of
//! outstanding guards; guards released afterwards are no-ops.
//!
//! The bus is an explicit value rather than a process-wide global: construct
//! one at startup and hand clones (they share the same table) to producers and
//! consumers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace, warn};

use crate::error::BusError;
use crate::message::{Message, TypeKey};
use crate::subscriber::{Callback, Subscriber};

/// Identifier of one registered subscriber.
///
/// Identifiers are allocated in increasing order and never reused, so they
/// double as the registration order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    id: SubscriptionId,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_interest: HashMap<TypeKey, Vec<Entry>>,
    unbound: Vec<Entry>,
}

impl Registry {
    fn insert(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (interest, callback) = subscriber.into_parts();
        let entry = Entry { id, callback };
        match interest {
            Some(key) => self.by_interest.entry(key).or_default().push(entry),
            None => self.unbound.push(entry),
        }
        id
    }

    fn remove(&mut self, ids: &[SubscriptionId]) -> usize {
        let before = self.len();
        self.by_interest.retain(|_, entries| {
            entries.retain(|e| !ids.contains(&e.id));
            !entries.is_empty()
        });
        self.unbound.retain(|e| !ids.contains(&e.id));
        before - self.len()
    }

    fn len(&self) -> usize {
        self.by_interest.values().map(Vec::len).sum::<usize>() + self.unbound.len()
    }
}

// Every registry mutation completes before the guard is released and no user
// code runs under the lock, so a poisoned table is still consistent.
fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Type-routed publish/subscribe hub.
///
/// Cloning yields another handle to the same subscriber table.
#[derive(Clone, Default)]
pub struct MessageBus {
    registry: Arc<Mutex<Registry>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register subscribers, in order, and return the guard that owns them.
    pub fn subscribe(&self, subscribers: impl IntoIterator<Item = Subscriber>) -> Subscription {
        let mut registry = lock(&self.registry);
        let ids: Vec<_> = subscribers
            .into_iter()
            .map(|subscriber| {
                if !subscriber.is_bound() {
                    warn!("registering subscriber without a message type; publish will fail until it is released");
                }
                registry.insert(subscriber)
            })
            .collect();

        debug!(
            registered = ids.len(),
            total = registry.len(),
            "subscribed to message bus"
        );

        Subscription {
            registry: Arc::downgrade(&self.registry),
            ids,
        }
    }

    /// Run `body` with `subscribers` registered, removing them on every exit
    /// path (including panics).
    pub fn scoped<R>(
        &self,
        subscribers: impl IntoIterator<Item = Subscriber>,
        body: impl FnOnce(&Self) -> R,
    ) -> R {
        let _subscription = self.subscribe(subscribers);
        body(self)
    }

    /// Deliver `message` to every subscriber of its type or an ancestor type.
    ///
    /// Returns how many callbacks ran.
    pub fn publish(&self, message: &dyn Message) -> Result<usize, BusError> {
        let name = message.type_key().name();
        let lineage = message.lineage();

        let targets: Vec<(SubscriptionId, Callback)> = {
            let registry = lock(&self.registry);
            if !registry.unbound.is_empty() {
                warn!(
                    message_type = name,
                    unbound = registry.unbound.len(),
                    "refusing to publish: subscribers without a message type are registered"
                );
                return Err(BusError::AmbiguousSubscriber {
                    message: name,
                    unbound: registry.unbound.len(),
                });
            }

            let mut targets: Vec<_> = lineage
                .iter()
                .filter_map(|key| registry.by_interest.get(key))
                .flatten()
                .map(|entry| (entry.id, Arc::clone(&entry.callback)))
                .collect();
            targets.sort_unstable_by_key(|(id, _)| *id);
            targets
        };

        for (id, callback) in &targets {
            trace!(message_type = name, subscription = %id, "delivering message");
            if let Err(error) = callback(message) {
                warn!(message_type = name, subscription = %id, error = %error, "subscriber failed");
                return Err(BusError::Callback {
                    message: name,
                    subscription: *id,
                    error,
                });
            }
        }

        debug!(
            message_type = name,
            kind = %message.kind(),
            delivered = targets.len(),
            "published message"
        );
        Ok(targets.len())
    }

    /// Remove every subscriber, whatever guards are still outstanding.
    pub fn reset(&self) {
        let mut registry = lock(&self.registry);
        let removed = registry.len();
        registry.by_interest.clear();
        registry.unbound.clear();
        debug!(removed, "message bus reset");
    }

    /// Number of registered subscribers (bound or not).
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).len()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Scoped ownership of the subscribers registered by one `subscribe` call.
///
/// Released exactly once: on [`close`](Self::close) or on drop, whichever
/// comes first. Release removes only this guard's subscribers, and is a no-op
/// if they are already gone (after [`MessageBus::reset`]) or the bus was
/// dropped.
#[must_use = "dropping a Subscription immediately unsubscribes"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    ids: Vec<SubscriptionId>,
}

impl Subscription {
    pub fn ids(&self) -> &[SubscriptionId] {
        &self.ids
    }

    /// Unsubscribe now.
    pub fn close(mut self) {
        self.release();
    }

    /// Keep the subscribers registered for the lifetime of the bus (until
    /// [`MessageBus::reset`]).
    pub fn detach(mut self) {
        self.ids.clear();
    }

    fn release(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let removed = lock(&registry).remove(&self.ids);
            debug!(removed, owned = self.ids.len(), "subscription released");
        }
        self.ids.clear();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AnyCommand, AnyEvent, AnyMessage};
    use proptest::prelude::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    crate::event_family! {
        struct OrderEvent: AnyEvent = "order";
    }

    crate::command_family! {
        struct OrderCommand: AnyCommand = "order.command";
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderPlaced {
        number: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderShipped {
        number: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct StockCounted;

    #[derive(Debug, Clone, PartialEq)]
    struct CancelOrder;

    crate::impl_event!(OrderPlaced: OrderEvent = "order.placed");
    crate::impl_event!(OrderShipped: OrderEvent = "order.shipped");
    crate::impl_event!(StockCounted: AnyEvent = "stock.counted");
    crate::impl_command!(CancelOrder: OrderCommand = "order.cancel");

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn recorder<C: crate::MessageClass>(log: &Log, tag: &'static str) -> Subscriber {
        let log = Arc::clone(log);
        Subscriber::to::<C, _>(move |msg| {
            log.lock().unwrap().push(format!("{tag}:{}", msg.type_name()));
            Ok(())
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn delivers_to_exact_type_subscribers() {
        let bus = MessageBus::new();
        let log = log();
        let _sub = bus.subscribe([recorder::<OrderPlaced>(&log, "placed")]);

        let delivered = bus.publish(&OrderPlaced { number: 1 }).unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(entries(&log), ["placed:order.placed"]);
    }

    #[test]
    fn family_subscriber_receives_every_derived_type_in_order() {
        let bus = MessageBus::new();
        let log = log();
        let _sub = bus.subscribe([recorder::<OrderEvent>(&log, "any")]);

        bus.publish(&OrderPlaced { number: 1 }).unwrap();
        bus.publish(&OrderShipped { number: 1 }).unwrap();

        assert_eq!(entries(&log), ["any:order.placed", "any:order.shipped"]);
    }

    #[test]
    fn unrelated_types_are_not_delivered() {
        let bus = MessageBus::new();
        let log = log();
        let _sub = bus.subscribe([
            recorder::<OrderPlaced>(&log, "placed"),
            recorder::<OrderEvent>(&log, "order"),
        ]);

        assert_eq!(bus.publish(&OrderShipped { number: 2 }).unwrap(), 1);
        assert_eq!(bus.publish(&StockCounted).unwrap(), 0);
        assert_eq!(bus.publish(&CancelOrder).unwrap(), 0);

        assert_eq!(entries(&log), ["order:order.shipped"]);
    }

    #[test]
    fn event_and_command_roots_split_traffic() {
        let bus = MessageBus::new();
        let log = log();
        let _sub = bus.subscribe([
            recorder::<AnyEvent>(&log, "events"),
            recorder::<AnyCommand>(&log, "commands"),
            recorder::<AnyMessage>(&log, "all"),
        ]);

        bus.publish(&CancelOrder).unwrap();
        bus.publish(&StockCounted).unwrap();

        assert_eq!(
            entries(&log),
            [
                "commands:order.cancel",
                "all:order.cancel",
                "events:stock.counted",
                "all:stock.counted",
            ]
        );
    }

    #[test]
    fn dispatch_follows_registration_order_across_types() {
        let bus = MessageBus::new();
        let log = log();
        let _a = bus.subscribe([recorder::<AnyMessage>(&log, "1")]);
        let _b = bus.subscribe([recorder::<OrderPlaced>(&log, "2")]);
        let _c = bus.subscribe([recorder::<OrderEvent>(&log, "3"), recorder::<OrderPlaced>(&log, "4")]);

        bus.publish(&OrderPlaced { number: 5 }).unwrap();

        let tags: Vec<_> = entries(&log)
            .into_iter()
            .map(|e| e.split(':').next().unwrap().to_string())
            .collect();
        assert_eq!(tags, ["1", "2", "3", "4"]);
    }

    #[test]
    fn dropping_the_guard_removes_only_its_subscribers() {
        let bus = MessageBus::new();
        let log = log();

        let first = bus.subscribe([recorder::<OrderEvent>(&log, "first")]);
        let _second = bus.subscribe([recorder::<OrderEvent>(&log, "second")]);
        drop(first);

        bus.publish(&OrderPlaced { number: 1 }).unwrap();

        assert_eq!(entries(&log), ["second:order.placed"]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn release_during_publish_takes_effect_from_the_next_publish() {
        let bus = MessageBus::new();
        let log = log();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::default();

        let _first = bus.subscribe([Subscriber::to::<OrderEvent, _>({
            let log = Arc::clone(&log);
            let slot = Arc::clone(&slot);
            move |msg| {
                log.lock().unwrap().push(format!("first:{}", msg.type_name()));
                if let Some(second) = slot.lock().unwrap().take() {
                    second.close();
                }
                Ok(())
            }
        })]);
        *slot.lock().unwrap() = Some(bus.subscribe([recorder::<OrderEvent>(&log, "second")]));

        // The snapshot taken at publish time still includes the released subscriber.
        assert_eq!(bus.publish(&OrderPlaced { number: 1 }).unwrap(), 2);
        assert_eq!(bus.subscriber_count(), 1);

        assert_eq!(bus.publish(&OrderPlaced { number: 2 }).unwrap(), 1);
        assert_eq!(
            entries(&log),
            ["first:order.placed", "second:order.placed", "first:order.placed"]
        );
    }

    #[test]
    fn scoped_subscribers_stop_receiving_after_the_scope() {
        let bus = MessageBus::new();
        let log = log();

        bus.scoped(
            [
                recorder::<OrderPlaced>(&log, "placed"),
                recorder::<OrderShipped>(&log, "shipped"),
            ],
            |bus| bus.publish(&OrderPlaced { number: 1 }).unwrap(),
        );
        bus.publish(&OrderShipped { number: 1 }).unwrap();

        assert_eq!(entries(&log), ["placed:order.placed"]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn scope_is_released_when_the_body_panics() {
        let bus = MessageBus::new();
        let log = log();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            bus.scoped([recorder::<OrderEvent>(&log, "x")], |_| {
                panic!("handler blew up");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn reset_clears_all_subscribers() {
        let bus = MessageBus::new();
        let log = log();
        bus.subscribe([
            recorder::<OrderPlaced>(&log, "placed"),
            recorder::<OrderShipped>(&log, "shipped"),
        ])
        .detach();

        bus.publish(&OrderPlaced { number: 1 }).unwrap();
        bus.reset();
        bus.publish(&OrderShipped { number: 1 }).unwrap();

        assert_eq!(entries(&log), ["placed:order.placed"]);
    }

    #[test]
    fn guard_released_after_reset_is_a_noop() {
        let bus = MessageBus::new();
        let log = log();
        let stale = bus.subscribe([recorder::<OrderEvent>(&log, "stale")]);

        bus.reset();
        let _fresh = bus.subscribe([recorder::<OrderEvent>(&log, "fresh")]);
        stale.close();

        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(&OrderPlaced { number: 1 }).unwrap();
        assert_eq!(entries(&log), ["fresh:order.placed"]);
    }

    #[test]
    fn guard_outliving_the_bus_releases_quietly() {
        let bus = MessageBus::new();
        let sub = bus.subscribe([Subscriber::to::<AnyEvent, _>(|_| Ok(()))]);
        drop(bus);
        drop(sub);
    }

    #[test]
    fn unbound_subscriber_fails_publish_without_delivering() {
        let bus = MessageBus::new();
        let log = log();
        let _bound = bus.subscribe([recorder::<OrderPlaced>(&log, "placed")]);

        {
            let _unbound = bus.subscribe([Subscriber::unbound(|_| Ok(()))]);
            let err = bus.publish(&OrderPlaced { number: 1 }).unwrap_err();
            assert!(matches!(
                err,
                BusError::AmbiguousSubscriber { message: "order.placed", unbound: 1 }
            ));
            assert!(entries(&log).is_empty());
        }

        assert_eq!(bus.publish(&OrderPlaced { number: 2 }).unwrap(), 1);
    }

    #[test]
    fn failing_callback_aborts_remaining_fan_out() {
        let bus = MessageBus::new();
        let log = log();
        let sub = bus.subscribe([
            recorder::<OrderEvent>(&log, "before"),
            Subscriber::to::<OrderEvent, _>(|_| Err(anyhow::anyhow!("projection offline"))),
            recorder::<OrderEvent>(&log, "after"),
        ]);

        let err = bus.publish(&OrderPlaced { number: 1 }).unwrap_err();

        match &err {
            BusError::Callback { message, subscription, .. } => {
                assert_eq!(*message, "order.placed");
                assert_eq!(*subscription, sub.ids()[1]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("projection offline"));
        assert_eq!(entries(&log), ["before:order.placed"]);
    }

    #[test]
    fn callbacks_may_publish_reentrantly() {
        let bus = MessageBus::new();
        let log = log();
        let inner = bus.clone();
        let _chain = bus.subscribe([
            Subscriber::typed(move |placed: &OrderPlaced| {
                inner.publish(&OrderShipped { number: placed.number })?;
                Ok(())
            }),
            recorder::<OrderShipped>(&log, "shipped"),
        ]);

        bus.publish(&OrderPlaced { number: 8 }).unwrap();

        assert_eq!(entries(&log), ["shipped:order.shipped"]);
    }

    #[test]
    fn shared_events_publish_through_their_message_view() {
        let bus = MessageBus::new();
        let log = log();
        let _sub = bus.subscribe([recorder::<OrderEvent>(&log, "order")]);

        let event: crate::SharedEvent = Arc::new(OrderPlaced { number: 3 });
        bus.publish(event.as_message()).unwrap();

        assert_eq!(entries(&log), ["order:order.placed"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: a family subscriber sees each published derived event
        /// exactly once, in publish order; an exact subscriber sees only its type.
        #[test]
        fn family_subscription_counts_match_publishes(kinds in prop::collection::vec(0u8..3, 0..40)) {
            let bus = MessageBus::new();
            let log = log();
            let _sub = bus.subscribe([
                recorder::<OrderEvent>(&log, "family"),
                recorder::<OrderPlaced>(&log, "placed"),
            ]);

            let mut expected = Vec::new();
            for (n, kind) in kinds.iter().enumerate() {
                let n = n as u32;
                match kind {
                    0 => {
                        bus.publish(&OrderPlaced { number: n }).unwrap();
                        expected.push("family:order.placed".to_string());
                        expected.push("placed:order.placed".to_string());
                    }
                    1 => {
                        bus.publish(&OrderShipped { number: n }).unwrap();
                        expected.push("family:order.shipped".to_string());
                    }
                    _ => {
                        bus.publish(&StockCounted).unwrap();
                    }
                }
            }

            prop_assert_eq!(entries(&log), expected);
        }
    }
}
