use crate::message::Message;

/// A command: an instruction requesting a state change.
///
/// Commands are **transient** - they are routed through the bus like any other
/// message but are never stored in an event stream nor replayed. Events
/// represent accepted changes; commands represent intent.
pub trait Command: Message + 'static {
    fn as_message(&self) -> &dyn Message;
}

impl dyn Command {
    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Wire a concrete command type into the message hierarchy.
///
/// `$parent` must be a command family (checked at compile time).
#[macro_export]
macro_rules! impl_command {
    ($ty:ty : $parent:ty = $name:expr) => {
        $crate::__impl_message!($ty, $parent, $name, $crate::MessageKind::Command);

        impl $crate::Command for $ty {
            fn as_message(&self) -> &dyn $crate::Message {
                self
            }
        }

        const _: fn() = || {
            fn parent_is_command_family<F: $crate::CommandFamily>() {}
            parent_is_command_family::<$parent>();
        };
    };
}
