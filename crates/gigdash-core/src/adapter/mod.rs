//! Fan-out adapters behind the [`crate::EventBus`].
//!
//! An adapter owns the listener registry and decides how an event reaches
//! subscribers. The bus only needs the [`BusAdapter`] contract, so a
//! broker-backed adapter can replace the in-process ones without touching
//! producers or the streaming endpoint.
//!
//! | Adapter | Delivery |
//! |---------|----------|
//! | [`LocalAdapter`] | Synchronous, on the publishing thread |
//! | [`BroadcastAdapter`] | Asynchronous, one forwarding task per subscriber |

mod broadcast;
mod local;

pub use broadcast::BroadcastAdapter;
pub use local::LocalAdapter;

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::events::Event;

/// Callback invoked for every event delivered to a subscription.
///
/// Must not block: the local adapter runs it on the producer's thread.
pub type Subscriber = Arc<dyn Fn(&Event) + Send + Sync>;

/// Pluggable fan-out strategy.
pub trait BusAdapter: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &'static str;

    /// Hand an event to every current subscriber.
    ///
    /// Returns `Error::BusClosed` after [`BusAdapter::destroy`].
    fn publish(&self, event: Event) -> Result<()>;

    /// Register a subscriber. The returned handle removes it again.
    fn subscribe(&self, subscriber: Subscriber) -> Result<Subscription>;

    /// Drop every subscriber and refuse further work.
    fn destroy(&self);

    /// Subscribers currently registered.
    fn subscriber_count(&self) -> usize;
}

type Cancel = Box<dyn FnOnce() + Send>;

/// Handle to one registration on an adapter.
///
/// [`Subscription::unsubscribe`] is idempotent and dropping the handle
/// unsubscribes, so a connection that goes away cannot leak its listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Mutex<Option<Cancel>>,
}

impl Subscription {
    /// Wrap the adapter-specific removal.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the registration. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
