//! Event bus for distributing domain events to streaming connections.
//!
//! Producers call [`EventBus::emit`] and move on: delivery is best effort,
//! failures are logged, and nothing is returned. Consumers (one per SSE
//! connection) call [`EventBus::subscribe`] with an optional tenant scope
//! and keep the returned [`Subscription`] for the life of the connection.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::adapter::{BusAdapter, LocalAdapter, Subscriber, Subscription};
use crate::error::Result;
use crate::events::{DomainEvent, Event, EventContext};
use crate::logging;

/// Adapter-backed publish/subscribe hub.
pub struct EventBus {
    adapter: RwLock<Arc<dyn BusAdapter>>,
}

impl EventBus {
    /// Bus backed by a [`LocalAdapter`].
    pub fn new() -> Self {
        Self::with_adapter(Arc::new(LocalAdapter::new()))
    }

    pub fn with_adapter(adapter: Arc<dyn BusAdapter>) -> Self {
        Self {
            adapter: RwLock::new(adapter),
        }
    }

    fn adapter(&self) -> Arc<dyn BusAdapter> {
        self.adapter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Emit an event, optionally scoped to one tenant.
    ///
    /// Never fails from the caller's point of view: adapter errors and
    /// panics are logged and dropped, because a notification problem must
    /// not abort the business operation that produced it.
    pub fn emit(&self, event: DomainEvent, tenant_id: Option<String>) {
        self.publish(Event::new(event, tenant_id));
    }

    /// Emit an event with explicit context (tenant scope, correlation).
    pub fn emit_with_context(&self, event: DomainEvent, ctx: EventContext) {
        self.publish(Event::with_context(event, ctx));
    }

    /// Publish an already-built event. Same failure semantics as [`EventBus::emit`].
    pub fn publish(&self, event: Event) {
        let adapter = self.adapter();
        let name = event.name();
        let id = event.id;
        let tenant_id = event.tenant_id.clone();
        let correlation_id = event.correlation_id;

        match catch_unwind(AssertUnwindSafe(|| adapter.publish(event))) {
            Ok(Ok(())) => debug!(
                subsystem = logging::SUBSYSTEM_BUS,
                event_name = %name,
                event_id = %id,
                tenant_id = ?tenant_id,
                correlation_id = ?correlation_id,
                adapter = adapter.name(),
                "EventBus emit"
            ),
            Ok(Err(e)) => warn!(
                subsystem = logging::SUBSYSTEM_BUS,
                event_name = %name,
                event_id = %id,
                tenant_id = ?tenant_id,
                correlation_id = ?correlation_id,
                adapter = adapter.name(),
                error = %e,
                "EventBus publish failed, event dropped"
            ),
            Err(_) => error!(
                subsystem = logging::SUBSYSTEM_BUS,
                event_name = %name,
                event_id = %id,
                tenant_id = ?tenant_id,
                adapter = adapter.name(),
                "EventBus adapter panicked, event dropped"
            ),
        }
    }

    /// Subscribe to events, optionally narrowed to one tenant.
    ///
    /// With a tenant filter, events scoped to another tenant are skipped;
    /// unscoped events are always delivered. The callback runs on the
    /// adapter's delivery context and must not block.
    pub fn subscribe<F>(&self, callback: F, tenant_id: Option<String>) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscriber: Subscriber = match tenant_id {
            None => Arc::new(callback),
            Some(tenant) => Arc::new(move |event: &Event| {
                if event.visible_to(Some(&tenant)) {
                    callback(event);
                }
            }),
        };
        self.adapter().subscribe(subscriber)
    }

    /// Replace the fan-out mechanism.
    ///
    /// The old adapter is destroyed, which drops its subscriptions. Callers
    /// that need to keep receiving must subscribe again.
    pub fn set_adapter(&self, adapter: Arc<dyn BusAdapter>) {
        let new_name = adapter.name();
        let old = {
            let mut slot = self.adapter.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, adapter)
        };
        let dropped = old.subscriber_count();
        old.destroy();
        info!(
            subsystem = logging::SUBSYSTEM_BUS,
            from = old.name(),
            to = new_name,
            dropped_subscribers = dropped,
            "EventBus adapter replaced"
        );
    }

    /// Release every subscription and adapter resource. Shutdown only.
    pub fn destroy(&self) {
        let adapter = self.adapter();
        info!(
            subsystem = logging::SUBSYSTEM_BUS,
            adapter = adapter.name(),
            subscriber_count = adapter.subscriber_count(),
            "EventBus destroyed"
        );
        adapter.destroy();
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.adapter().subscriber_count()
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter().name()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
