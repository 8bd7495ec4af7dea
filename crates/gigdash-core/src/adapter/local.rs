//! Synchronous in-process fan-out.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error};

use super::{BusAdapter, Subscriber, Subscription};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::logging;

/// Default adapter: a lock-protected listener registry fanned out on the
/// publishing thread.
///
/// The registry is cloned under a read lock and released before any
/// callback runs, so callbacks may subscribe or unsubscribe without
/// deadlocking. There is no listener limit.
#[derive(Clone, Default)]
pub struct LocalAdapter {
    inner: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct RegistryState {
    subscribers: HashMap<u64, Subscriber>,
    closed: bool,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Result<Vec<Subscriber>> {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(Error::BusClosed);
        }
        Ok(state.subscribers.values().cloned().collect())
    }
}

impl BusAdapter for LocalAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    fn publish(&self, event: Event) -> Result<()> {
        let subscribers = self.snapshot()?;
        debug!(
            subsystem = logging::SUBSYSTEM_BUS,
            component = logging::COMPONENT_LOCAL_ADAPTER,
            event_name = %event.name(),
            event_id = %event.id,
            subscriber_count = subscribers.len(),
            "Fan-out"
        );

        for subscriber in subscribers {
            // One faulty consumer must not starve the rest.
            if catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                error!(
                    subsystem = logging::SUBSYSTEM_BUS,
                    component = logging::COMPONENT_LOCAL_ADAPTER,
                    event_name = %event.name(),
                    event_id = %event.id,
                    "Subscriber panicked during fan-out"
                );
            }
        }
        Ok(())
    }

    fn subscribe(&self, subscriber: Subscriber) -> Result<Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if state.closed {
                return Err(Error::BusClosed);
            }
            state.subscribers.insert(id, subscriber);
        }

        let registry = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .state
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .remove(&id);
            }
        }))
    }

    fn destroy(&self) {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.subscribers.clear();
    }

    fn subscriber_count(&self) -> usize {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DomainEvent;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> Subscriber {
        let counter = counter.clone();
        Arc::new(move |_: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let adapter = LocalAdapter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = adapter.subscribe(counting(&hits)).unwrap();
        let _b = adapter.subscribe(counting(&hits)).unwrap();

        adapter
            .publish(Event::new(DomainEvent::heartbeat(), None))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hundreds_of_subscribers() {
        let adapter = LocalAdapter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let subs: Vec<_> = (0..500)
            .map(|_| adapter.subscribe(counting(&hits)).unwrap())
            .collect();
        assert_eq!(adapter.subscriber_count(), 500);

        adapter
            .publish(Event::new(DomainEvent::heartbeat(), None))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 500);

        drop(subs);
        assert_eq!(adapter.subscriber_count(), 0);
    }

    #[test]
    fn test_double_unsubscribe_leaves_others_registered() {
        let adapter = LocalAdapter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let first = adapter.subscribe(counting(&hits)).unwrap();
        let _second = adapter.subscribe(counting(&hits)).unwrap();

        first.unsubscribe();
        first.unsubscribe();
        assert_eq!(adapter.subscriber_count(), 1);

        adapter
            .publish(Event::new(DomainEvent::heartbeat(), None))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let adapter = LocalAdapter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _bad = adapter
            .subscribe(Arc::new(|_: &Event| panic!("consumer bug")))
            .unwrap();
        let _good = adapter.subscribe(counting(&hits)).unwrap();

        let result = adapter.publish(Event::new(DomainEvent::heartbeat(), None));
        assert!(result.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_during_fan_out() {
        let adapter = LocalAdapter::new();
        let slot: Arc<std::sync::Mutex<Option<Subscription>>> = Default::default();
        let slot_in_cb = slot.clone();
        let sub = adapter
            .subscribe(Arc::new(move |_: &Event| {
                if let Some(sub) = slot_in_cb.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            }))
            .unwrap();
        *slot.lock().unwrap() = Some(sub);

        adapter
            .publish(Event::new(DomainEvent::heartbeat(), None))
            .unwrap();
        assert_eq!(adapter.subscriber_count(), 0);
    }

    #[test]
    fn test_destroy_closes_adapter() {
        let adapter = LocalAdapter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = adapter.subscribe(counting(&hits)).unwrap();

        adapter.destroy();
        assert_eq!(adapter.subscriber_count(), 0);
        assert!(matches!(
            adapter.publish(Event::new(DomainEvent::heartbeat(), None)),
            Err(Error::BusClosed)
        ));
        assert!(matches!(
            adapter.subscribe(counting(&hits)),
            Err(Error::BusClosed)
        ));
        // Unsubscribing after destroy is harmless.
        sub.unsubscribe();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
