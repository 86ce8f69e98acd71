//! Subscriber: one callback bound to one message class.

use std::fmt;
use std::sync::Arc;

use crate::message::{Lineage, Message, MessageClass, TypeKey};

/// Type-erased subscriber callback.
///
/// Callbacks run synchronously inside [`MessageBus::publish`](crate::MessageBus::publish);
/// an `Err` aborts the rest of that publish call.
pub type Callback = Arc<dyn Fn(&dyn Message) -> anyhow::Result<()> + Send + Sync>;

/// Binds a callback to interest in one message class (and, through the bus,
/// every class derived from it).
///
/// The class is always supplied explicitly at the call site:
///
/// ```ignore
/// let audit = Subscriber::to::<UserEvent>(|msg| { log(msg); Ok(()) });
/// let welcome = Subscriber::typed(|e: &UserCreated| send_welcome(&e.name));
/// ```
///
/// [`Subscriber::unbound`] builds a subscriber without a class. It is a valid
/// value but never matches, and while registered it makes every publish fail.
#[derive(Clone)]
pub struct Subscriber {
    interest: Option<TypeKey>,
    callback: Callback,
}

impl Subscriber {
    /// Subscribe `callback` to class `C` and everything derived from it.
    pub fn to<C, F>(callback: F) -> Self
    where
        C: MessageClass,
        F: Fn(&dyn Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            interest: Some(TypeKey::of::<C>()),
            callback: Arc::new(callback),
        }
    }

    /// Subscribe to one concrete message type, receiving it already downcast.
    ///
    /// Concrete messages are leaves of the hierarchy, so every message routed
    /// here has exactly type `M`.
    pub fn typed<M, F>(callback: F) -> Self
    where
        M: Message + MessageClass,
        F: Fn(&M) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::to::<M, _>(move |message: &dyn Message| match message.downcast_ref::<M>() {
            Some(message) => callback(message),
            None => Err(anyhow::anyhow!(
                "subscriber for '{}' received '{}'",
                M::NAME,
                message.type_name()
            )),
        })
    }

    /// A subscriber with no interest class.
    pub fn unbound<F>(callback: F) -> Self
    where
        F: Fn(&dyn Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            interest: None,
            callback: Arc::new(callback),
        }
    }

    /// Bind (or re-bind) the interest class.
    pub fn bind<C: MessageClass>(mut self) -> Self {
        self.interest = Some(TypeKey::of::<C>());
        self
    }

    pub fn interest(&self) -> Option<TypeKey> {
        self.interest
    }

    pub fn is_bound(&self) -> bool {
        self.interest.is_some()
    }

    /// Whether a message with `lineage` should reach this subscriber.
    pub fn matches(&self, lineage: &Lineage) -> bool {
        self.interest.is_some_and(|key| lineage.contains(&key))
    }

    /// Invoke the callback directly, bypassing the bus.
    pub fn notify(&self, message: &dyn Message) -> anyhow::Result<()> {
        (self.callback)(message)
    }

    pub(crate) fn into_parts(self) -> (Option<TypeKey>, Callback) {
        (self.interest, self.callback)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("interest", &self.interest.map(|k| k.name()))
            .finish_non_exhaustive()
    }
}
