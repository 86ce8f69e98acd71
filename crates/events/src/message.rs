//! Message hierarchy: runtime type identity with inheritance.
//!
//! Rust has no class inheritance, so the hierarchy is declared explicitly:
//!
//! ```text
//! AnyMessage
//!  ├─ AnyEvent    ─ UserEvent (family) ─ UserCreated, UserNameChanged (concrete)
//!  └─ AnyCommand  ─ ...
//! ```
//!
//! - A [`MessageClass`] is a node of the hierarchy with a `Parent`.
//! - A [`MessageFamily`] is an abstract node: it can be subscribed to but never
//!   published. Only families can be parents, so concrete messages are always
//!   leaves.
//! - A [`Message`] is a concrete, publishable value. Its [`Lineage`] lists its own
//!   type followed by every ancestor up to [`AnyMessage`].
//!
//! Concrete types are wired in with [`impl_event!`](crate::impl_event) and
//! [`impl_command!`](crate::impl_command); families with
//! [`event_family!`](crate::event_family) and
//! [`command_family!`](crate::command_family).

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a message class.
///
/// Equality and hashing use the `TypeId` only; the name is carried for logs
/// and errors.
#[derive(Debug, Copy, Clone)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<C: MessageClass>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: C::NAME,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A node of the message hierarchy.
pub trait MessageClass: 'static {
    /// Stable, human-readable class name (e.g. "user.created").
    const NAME: &'static str;

    /// Direct supertype. The root ([`AnyMessage`]) is its own parent.
    type Parent: MessageFamily;

    /// This class followed by its ancestors, nearest first.
    fn class_lineage() -> Lineage
    where
        Self: Sized,
    {
        let mut keys = Vec::with_capacity(4);
        collect_lineage::<Self>(&mut keys);
        Lineage(keys)
    }
}

fn collect_lineage<C: MessageClass>(keys: &mut Vec<TypeKey>) {
    let key = TypeKey::of::<C>();
    // The root is self-parented.
    if keys.contains(&key) {
        return;
    }
    keys.push(key);
    collect_lineage::<C::Parent>(keys);
}

/// Abstract hierarchy node (subscribable, never published).
pub trait MessageFamily: MessageClass {}

/// Family whose members are events.
pub trait EventFamily: MessageFamily {}

/// Family whose members are commands.
pub trait CommandFamily: MessageFamily {}

/// Root of the hierarchy. Subscribing to it receives every message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnyMessage;

/// Root of all events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnyEvent;

/// Root of all commands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnyCommand;

impl MessageClass for AnyMessage {
    const NAME: &'static str = "message";
    type Parent = AnyMessage;
}

impl MessageFamily for AnyMessage {}

impl MessageClass for AnyEvent {
    const NAME: &'static str = "event";
    type Parent = AnyMessage;
}

impl MessageFamily for AnyEvent {}
impl EventFamily for AnyEvent {}

impl MessageClass for AnyCommand {
    const NAME: &'static str = "command";
    type Parent = AnyMessage;
}

impl MessageFamily for AnyCommand {}
impl CommandFamily for AnyCommand {}

/// Ordered ancestry of a message class: the class itself, then each parent up
/// to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage(Vec<TypeKey>);

impl Lineage {
    /// The most-derived class (the runtime type for a concrete message).
    pub fn concrete(&self) -> TypeKey {
        self.0[0]
    }

    /// Whether `key` is this class or one of its ancestors.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.0.contains(key)
    }

    /// Whether this class is `C` or derives from it.
    pub fn is_a<C: MessageClass>(&self) -> bool {
        self.contains(&TypeKey::of::<C>())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The two disjoint message variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Event,
    Command,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Event => f.write_str("event"),
            MessageKind::Command => f.write_str("command"),
        }
    }
}

/// A concrete, publishable message (object safe).
///
/// Implemented through [`impl_event!`](crate::impl_event) or
/// [`impl_command!`](crate::impl_command); not meant to be implemented by hand.
pub trait Message: Any + fmt::Debug + Send + Sync + 'static {
    /// Runtime type of this message.
    fn type_key(&self) -> TypeKey;

    /// Runtime type followed by every ancestor.
    fn lineage(&self) -> Lineage;

    fn kind(&self) -> MessageKind;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Message {
    /// Class name of the runtime type.
    pub fn type_name(&self) -> &'static str {
        self.type_key().name()
    }

    /// Whether this message's runtime type is `C` or derives from it.
    pub fn is_a<C: MessageClass>(&self) -> bool {
        self.lineage().is_a::<C>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __impl_message {
    ($ty:ty, $parent:ty, $name:expr, $kind:expr) => {
        impl $crate::MessageClass for $ty {
            const NAME: &'static str = $name;
            type Parent = $parent;
        }

        impl $crate::Message for $ty {
            fn type_key(&self) -> $crate::TypeKey {
                $crate::TypeKey::of::<Self>()
            }

            fn lineage(&self) -> $crate::Lineage {
                <Self as $crate::MessageClass>::class_lineage()
            }

            fn kind(&self) -> $crate::MessageKind {
                $kind
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    };
}

/// Declare an abstract event family.
///
/// ```ignore
/// event_family! {
///     /// Any event about a user.
///     pub struct UserEvent: AnyEvent = "user";
/// }
/// ```
#[macro_export]
macro_rules! event_family {
    ($(#[$meta:meta])* $vis:vis struct $name:ident : $parent:ty = $label:expr;) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
        $vis struct $name;

        impl $crate::MessageClass for $name {
            const NAME: &'static str = $label;
            type Parent = $parent;
        }

        impl $crate::MessageFamily for $name {}
        impl $crate::EventFamily for $name {}

        const _: fn() = || {
            fn parent_is_event_family<F: $crate::EventFamily>() {}
            parent_is_event_family::<$parent>();
        };
    };
}

/// Declare an abstract command family.
#[macro_export]
macro_rules! command_family {
    ($(#[$meta:meta])* $vis:vis struct $name:ident : $parent:ty = $label:expr;) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
        $vis struct $name;

        impl $crate::MessageClass for $name {
            const NAME: &'static str = $label;
            type Parent = $parent;
        }

        impl $crate::MessageFamily for $name {}
        impl $crate::CommandFamily for $name {}

        const _: fn() = || {
            fn parent_is_command_family<F: $crate::CommandFamily>() {}
            parent_is_command_family::<$parent>();
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, Event};

    crate::event_family! {
        struct ShipmentEvent: AnyEvent = "shipment";
    }

    crate::event_family! {
        struct DeliveryEvent: ShipmentEvent = "shipment.delivery";
    }

    crate::command_family! {
        struct ShipmentCommand: AnyCommand = "shipment.command";
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Delivered {
        parcel: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Dispatched;

    #[derive(Debug, Clone, PartialEq)]
    struct CancelShipment;

    crate::impl_event!(Delivered: DeliveryEvent = "shipment.delivered");
    crate::impl_event!(Dispatched: ShipmentEvent = "shipment.dispatched");
    crate::impl_command!(CancelShipment: ShipmentCommand = "shipment.cancel");

    #[test]
    fn lineage_runs_from_concrete_type_to_root() {
        let names: Vec<_> = Delivered::class_lineage().iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            ["shipment.delivered", "shipment.delivery", "shipment", "event", "message"]
        );
    }

    #[test]
    fn instance_lineage_matches_class_lineage() {
        let delivered = Delivered { parcel: 5 };
        assert_eq!(delivered.lineage(), Delivered::class_lineage());
        assert_eq!(delivered.lineage().concrete(), TypeKey::of::<Delivered>());
    }

    #[test]
    fn root_lineage_terminates() {
        assert_eq!(AnyMessage::class_lineage().len(), 1);
        assert_eq!(AnyEvent::class_lineage().len(), 2);
    }

    #[test]
    fn subtype_checks_follow_declared_parents() {
        let delivered: &dyn Message = &Delivered { parcel: 9 };
        assert!(delivered.is_a::<Delivered>());
        assert!(delivered.is_a::<DeliveryEvent>());
        assert!(delivered.is_a::<ShipmentEvent>());
        assert!(delivered.is_a::<AnyEvent>());
        assert!(!delivered.is_a::<Dispatched>());
        assert!(!delivered.is_a::<AnyCommand>());

        let dispatched: &dyn Message = &Dispatched;
        assert!(!dispatched.is_a::<DeliveryEvent>());
    }

    #[test]
    fn events_and_commands_are_disjoint() {
        let cancel = CancelShipment;
        assert_eq!(cancel.kind(), MessageKind::Command);
        assert_eq!(Dispatched.kind(), MessageKind::Event);

        let msg: &dyn Message = cancel.as_message();
        assert!(msg.is_a::<AnyCommand>());
        assert!(!msg.is_a::<AnyEvent>());
        assert!(msg.is_a::<AnyMessage>());
    }

    #[test]
    fn downcasts_to_the_concrete_type_only() {
        let event = Delivered { parcel: 3 };
        let msg: &dyn Message = event.as_message();
        assert_eq!(msg.downcast_ref::<Delivered>(), Some(&event));
        assert!(msg.downcast_ref::<Dispatched>().is_none());
        assert_eq!(msg.type_name(), "shipment.delivered");
    }

    #[test]
    fn type_keys_compare_by_type_identity() {
        assert_eq!(TypeKey::of::<Delivered>(), Delivered { parcel: 1 }.type_key());
        assert_ne!(TypeKey::of::<Delivered>(), TypeKey::of::<Dispatched>());
        assert_eq!(TypeKey::of::<ShipmentEvent>().to_string(), "shipment");
    }
}
