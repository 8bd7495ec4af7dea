//! Fan-out through a `tokio::sync::broadcast` channel.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{BusAdapter, Subscriber, Subscription};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::logging;

/// Broadcast-channel adapter.
///
/// `publish` only enqueues, so producers never run subscriber code. Each
/// subscriber gets a forwarding task on the current tokio runtime. A
/// subscriber that falls more than `capacity` events behind receives a
/// `Lagged` notice and misses those events; freshness wins over
/// completeness on a live stream.
pub struct BroadcastAdapter {
    tx: Mutex<Option<broadcast::Sender<Event>>>,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: AtomicU64,
}

impl BroadcastAdapter {
    /// Create an adapter with the given channel capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    fn sender(&self) -> Result<broadcast::Sender<Event>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::BusClosed)
    }
}

impl Default for BroadcastAdapter {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

async fn forward(mut rx: broadcast::Receiver<Event>, subscriber: Subscriber) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                    error!(
                        subsystem = logging::SUBSYSTEM_BUS,
                        component = logging::COMPONENT_BROADCAST_ADAPTER,
                        event_name = %event.name(),
                        event_id = %event.id,
                        "Subscriber panicked during fan-out"
                    );
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(
                    subsystem = logging::SUBSYSTEM_BUS,
                    component = logging::COMPONENT_BROADCAST_ADAPTER,
                    missed,
                    "Subscriber lagged, events skipped"
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

impl BusAdapter for BroadcastAdapter {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&self, event: Event) -> Result<()> {
        let tx = self.sender()?;
        debug!(
            subsystem = logging::SUBSYSTEM_BUS,
            component = logging::COMPONENT_BROADCAST_ADAPTER,
            event_name = %event.name(),
            event_id = %event.id,
            subscriber_count = tx.receiver_count(),
            "Fan-out"
        );
        // No receivers is not a failure: the event simply has no audience.
        let _ = tx.send(event);
        Ok(())
    }

    fn subscribe(&self, subscriber: Subscriber) -> Result<Subscription> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::Adapter(format!("broadcast adapter needs a tokio runtime: {}", e))
        })?;
        let rx = self.sender()?.subscribe();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let handle = runtime.spawn(forward(rx, subscriber));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);

        let tasks = Arc::downgrade(&self.tasks);
        Ok(Subscription::new(move || {
            let Some(tasks) = tasks.upgrade() else {
                return;
            };
            let handle = tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            if let Some(handle) = handle {
                handle.abort();
            }
        }))
    }

    fn destroy(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        let drained: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, handle) in drained {
            handle.abort();
        }
    }

    fn subscriber_count(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for BroadcastAdapter {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DomainEvent, EventName};
    use tokio::sync::mpsc;

    fn forwarding(tx: mpsc::UnboundedSender<Event>) -> Subscriber {
        Arc::new(move |event: &Event| {
            let _ = tx.send(event.clone());
        })
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_all() {
        let adapter = BroadcastAdapter::new(32);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let _a = adapter.subscribe(forwarding(tx1)).unwrap();
        let _b = adapter.subscribe(forwarding(tx2)).unwrap();

        adapter
            .publish(Event::new(DomainEvent::heartbeat(), None))
            .unwrap();

        assert_eq!(rx1.recv().await.unwrap().name(), EventName::SystemHeartbeat);
        assert_eq!(rx2.recv().await.unwrap().name(), EventName::SystemHeartbeat);
    }

    #[tokio::test]
    async fn test_broadcast_no_subscribers_ok() {
        let adapter = BroadcastAdapter::new(32);
        assert!(adapter
            .publish(Event::new(DomainEvent::heartbeat(), None))
            .is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_unsubscribe_is_idempotent() {
        let adapter = BroadcastAdapter::new(32);
        let (tx, _rx) = mpsc::unbounded_channel();
        let sub = adapter.subscribe(forwarding(tx.clone())).unwrap();
        let _other = adapter.subscribe(forwarding(tx)).unwrap();
        assert_eq!(adapter.subscriber_count(), 2);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(adapter.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_destroy_rejects_publish() {
        let adapter = BroadcastAdapter::new(32);
        let (tx, _rx) = mpsc::unbounded_channel();
        let _sub = adapter.subscribe(forwarding(tx.clone())).unwrap();

        adapter.destroy();
        assert_eq!(adapter.subscriber_count(), 0);
        assert!(matches!(
            adapter.publish(Event::new(DomainEvent::heartbeat(), None)),
            Err(Error::BusClosed)
        ));
        assert!(matches!(
            adapter.subscribe(forwarding(tx)),
            Err(Error::BusClosed)
        ));
    }

    #[test]
    fn test_broadcast_subscribe_without_runtime_fails() {
        let adapter = BroadcastAdapter::new(4);
        let result = adapter.subscribe(Arc::new(|_: &Event| {}));
        assert!(matches!(result, Err(Error::Adapter(_))));
    }
}
