//! Reconnecting event receiver.
//!
//! One [`EventReceiver`] owns at most one live connection. A driver task
//! opens the stream, feeds frames into the shared [`NotificationStore`],
//! and after every close sleeps for the backoff delay before reopening.
//!
//! ```text
//! disconnected --connect()--> connecting --open ok--> connected
//!       ^                         |                       |
//!       |                     open failed           stream ended
//!       +------ backoff sleep <---+-----------------------+
//!
//! any --transport error--> error (the following close reconnects)
//! any --disconnect()-----> disconnected (no reconnect)
//! ```

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::StreamExt;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use gigdash_core::{logging, Error, Result};

use crate::backoff::BackoffPolicy;
use crate::config::{EventCallback, ReceiverConfig};
use crate::connector::{Connector, HttpConnector};
use crate::received::ReceivedEvent;
use crate::sse::{SseDecoder, SseFrame};
use crate::store::{ConnectionStatus, NotificationStore, StoreState};

/// State shared with the driver task.
struct Shared {
    store: NotificationStore,
    connector: Arc<dyn Connector>,
    ignore_events: HashSet<String>,
    backoff: BackoffPolicy,
    callbacks: RwLock<Vec<EventCallback>>,
    /// Id of the driver allowed to write status. Bumped by `disconnect`.
    generation: Mutex<u64>,
    /// Cuts a pending backoff sleep short.
    wake: Notify,
}

impl Shared {
    /// Status write that a cancelled driver cannot win against
    /// `disconnect`.
    fn set_status(&self, generation: u64, status: ConnectionStatus) -> bool {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            return false;
        }
        self.store.set_status(status);
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner) == generation
    }

    /// Returns false once the driver has been superseded.
    fn handle_frame(&self, generation: u64, frame: SseFrame) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        let event = match ReceivedEvent::parse(&frame.data) {
            Ok(event) => event,
            Err(e) => {
                trace!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_RECEIVER,
                    sse_event = %frame.event,
                    error = %e,
                    "Dropping malformed frame"
                );
                return true;
            }
        };

        self.store.set_last_event(event.clone());

        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                error!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_RECEIVER,
                    event_name = event.name(),
                    event_id = %event.id(),
                    "Event callback panicked"
                );
            }
        }

        // A callback may have called `disconnect`.
        if !self.is_current(generation) {
            return false;
        }
        if !self.ignore_events.contains(event.name()) {
            self.store.push_notification(event.to_notification());
        }
        true
    }
}

async fn drive(shared: Arc<Shared>, generation: u64) {
    let mut attempt: u32 = 0;
    let target = shared.connector.describe();

    loop {
        if !shared.set_status(generation, ConnectionStatus::Connecting) {
            return;
        }

        match shared.connector.open().await {
            Ok(mut stream) => {
                if !shared.set_status(generation, ConnectionStatus::Connected) {
                    return;
                }
                attempt = 0;
                info!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_RECEIVER,
                    target = %target,
                    "Event stream connected"
                );

                let mut decoder = SseDecoder::new();
                while let Some(chunk) = stream.next().await {
                    if !shared.is_current(generation) {
                        return;
                    }
                    match chunk {
                        Ok(bytes) => {
                            shared.set_status(generation, ConnectionStatus::Connected);
                            for frame in decoder.push(&bytes) {
                                if !shared.handle_frame(generation, frame) {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(
                                subsystem = logging::SUBSYSTEM_CLIENT,
                                component = logging::COMPONENT_RECEIVER,
                                error = %e,
                                "Event stream error"
                            );
                            shared.set_status(generation, ConnectionStatus::Error);
                        }
                    }
                }
                info!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_RECEIVER,
                    target = %target,
                    "Event stream closed"
                );
            }
            Err(e) => {
                warn!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_RECEIVER,
                    target = %target,
                    attempt,
                    error = %e,
                    "Failed to open event stream"
                );
            }
        }

        if !shared.set_status(generation, ConnectionStatus::Disconnected) {
            return;
        }
        let delay = shared.backoff.next_delay(attempt);
        attempt = attempt.saturating_add(1);
        info!(
            subsystem = logging::SUBSYSTEM_CLIENT,
            component = logging::COMPONENT_RECEIVER,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shared.wake.notified() => {
                debug!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_RECEIVER,
                    "Reconnect requested, skipping backoff"
                );
            }
        }
    }
}

/// Process-wide event receiver.
///
/// Share it behind an `Arc`; every consumer reads the same store. Dropping
/// the receiver stops its connection.
pub struct EventReceiver {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl EventReceiver {
    /// Build a receiver that connects over HTTP to `config.url`.
    ///
    /// Connects immediately when `config.auto_connect` is set, which
    /// requires a tokio runtime.
    pub fn new(config: ReceiverConfig) -> Result<Self> {
        let connector = HttpConnector::new(config.url.clone(), config.tenant_id.clone())?;
        Self::with_connector(config, Arc::new(connector))
    }

    pub fn with_connector(config: ReceiverConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        if config.max_notifications == 0 {
            return Err(Error::InvalidInput(
                "max_notifications must be at least 1".to_string(),
            ));
        }
        let receiver = Self {
            shared: Arc::new(Shared {
                store: NotificationStore::new(config.max_notifications),
                connector,
                ignore_events: config.ignore_events,
                backoff: config.backoff,
                callbacks: RwLock::new(config.on_event.into_iter().collect()),
                generation: Mutex::new(0),
                wake: Notify::new(),
            }),
            driver: Mutex::new(None),
        };
        if config.auto_connect {
            receiver.connect()?;
        }
        Ok(receiver)
    }

    /// Start the connection.
    ///
    /// While a reconnect is pending this reconnects at once instead of
    /// waiting out the backoff. A no-op when connecting or connected.
    pub fn connect(&self) -> Result<()> {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            if self.shared.store.status() == ConnectionStatus::Disconnected {
                self.shared.wake.notify_one();
                return Ok(());
            }
            debug!(
                subsystem = logging::SUBSYSTEM_CLIENT,
                component = logging::COMPONENT_RECEIVER,
                "Already connected, connect ignored"
            );
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::Internal(format!("event receiver needs a tokio runtime: {}", e))
        })?;
        let generation = *self
            .shared
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *driver = Some(runtime.spawn(drive(self.shared.clone(), generation)));
        Ok(())
    }

    /// Close the connection and cancel any pending reconnect. Safe to call
    /// in any state.
    pub fn disconnect(&self) {
        let handle = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        {
            let mut generation = self
                .shared
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *generation = generation.wrapping_add(1);
            self.shared.store.set_status(ConnectionStatus::Disconnected);
        }
        if let Some(handle) = handle {
            handle.abort();
            info!(
                subsystem = logging::SUBSYSTEM_CLIENT,
                component = logging::COMPONENT_RECEIVER,
                "Event receiver disconnected"
            );
        }
    }

    /// Whether a driver task is alive.
    pub fn is_running(&self) -> bool {
        self.driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Register another callback. Runs for every decoded event.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&ReceivedEvent) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn store(&self) -> &NotificationStore {
        &self.shared.store
    }

    pub fn snapshot(&self) -> StoreState {
        self.shared.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.shared.store.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.store.status()
    }

    pub fn mark_all_read(&self) {
        self.shared.store.mark_all_read();
    }

    pub fn mark_read(&self, id: Uuid) -> bool {
        self.shared.store.mark_read(id)
    }

    pub fn clear_notifications(&self) {
        self.shared.store.clear_notifications();
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        let handle = self
            .driver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
