use thiserror::Error;

use crate::bus::SubscriptionId;

/// Message bus error.
#[derive(Debug, Error)]
pub enum BusError {
    /// At least one registered subscriber has no interest class, so routing is
    /// undefined. Nothing was delivered.
    #[error("cannot publish '{message}': {unbound} registered subscriber(s) have no message type")]
    AmbiguousSubscriber { message: &'static str, unbound: usize },

    /// A subscriber callback failed; the remaining fan-out for that publish was
    /// abandoned.
    #[error("subscriber {subscription} failed handling '{message}': {error:#}")]
    Callback {
        message: &'static str,
        subscription: SubscriptionId,
        error: anyhow::Error,
    },
}
