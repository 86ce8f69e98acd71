use std::sync::Arc;

use crate::message::Message;

/// A domain event: an immutable fact that has occurred.
///
/// Events are the only messages stored in an [`EventStream`](crate::EventStream)
/// and replayed into aggregates. They are shared as [`SharedEvent`] so that an
/// aggregate's pending changes, a store and the bus can all hold the same value.
pub trait Event: Message + 'static {
    fn as_message(&self) -> &dyn Message;
}

/// Reference-counted, type-erased event.
pub type SharedEvent = Arc<dyn Event>;

impl dyn Event {
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Wire a concrete event type into the message hierarchy.
///
/// `$parent` must be an event family (checked at compile time).
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// pub struct UserCreated { pub id: UserId, pub name: String }
///
/// impl_event!(UserCreated: UserEvent = "user.created");
/// ```
#[macro_export]
macro_rules! impl_event {
    ($ty:ty : $parent:ty = $name:expr) => {
        $crate::__impl_message!($ty, $parent, $name, $crate::MessageKind::Event);

        impl $crate::Event for $ty {
            fn as_message(&self) -> &dyn $crate::Message {
                self
            }
        }

        const _: fn() = || {
            fn parent_is_event_family<F: $crate::EventFamily>() {}
            parent_is_event_family::<$parent>();
        };
    };
}
