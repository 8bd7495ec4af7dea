//! Server-Sent Events endpoint.
//!
//! Each connection gets its own bus subscription feeding a bounded queue.
//! The stream yields `system:connected` first, then bus events as they
//! arrive, with a `system:heartbeat` whenever the heartbeat period elapses.
//! Dropping the stream (client gone, server shutdown) releases the
//! subscription exactly once.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use tracing::{debug, info, warn};

use gigdash_core::{defaults, logging, DomainEvent, Event, EventBus, Result, Subscription};

use crate::config::StreamConfig;
use crate::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
}

/// `GET /api/v1/events[?tenantId=...]`
pub async fn sse_events(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let tenant_id = query.tenant_id.filter(|t| !t.trim().is_empty());

    let stream = match EventStream::open(
        &state.bus,
        &state.stream,
        state.active_streams.clone(),
        tenant_id,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(
                subsystem = logging::SUBSYSTEM_STREAM,
                error = %e,
                "Rejected SSE connection"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    let frames = stream.filter_map(|event| futures::future::ready(encode(&event)));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(frames),
    )
        .into_response()
}

/// Frame an event as `event:`, `id:` and `data:` lines.
///
/// Events that fail to serialize are logged and skipped; the connection
/// stays open.
pub fn encode(event: &Event) -> Option<std::result::Result<SseEvent, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Ok(SseEvent::default()
            .event(event.name().as_str())
            .id(event.id.to_string())
            .data(json))),
        Err(e) => {
            warn!(
                subsystem = logging::SUBSYSTEM_STREAM,
                event_name = %event.name(),
                event_id = %event.id,
                error = %e,
                "Dropping event that failed to serialize"
            );
            None
        }
    }
}

/// Decrements the live-connection gauge and logs the close.
struct ConnectionGuard {
    active: Arc<AtomicUsize>,
    tenant_id: Option<String>,
    opened_at: Instant,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        info!(
            subsystem = logging::SUBSYSTEM_STREAM,
            tenant_id = self.tenant_id.as_deref().unwrap_or("*"),
            duration_ms = self.opened_at.elapsed().as_millis() as u64,
            active_streams = remaining,
            "SSE stream closed"
        );
    }
}

/// One client's view of the bus.
pub struct EventStream {
    connected: Option<Event>,
    events: ReceiverStream<Event>,
    heartbeat: IntervalStream,
    // Dropped before the guard so the bus no longer sees the subscriber
    // when the close is logged.
    _subscription: Subscription,
    _guard: ConnectionGuard,
}

impl EventStream {
    pub fn open(
        bus: &EventBus,
        config: &StreamConfig,
        active: Arc<AtomicUsize>,
        tenant_id: Option<String>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel(config.buffer.max(1));

        let subscription = bus.subscribe(
            move |event: &Event| match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    debug!(
                        subsystem = logging::SUBSYSTEM_STREAM,
                        event_name = %event.name(),
                        event_id = %event.id,
                        "Slow SSE consumer, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            },
            tenant_id.clone(),
        )?;

        let mut interval = tokio::time::interval_at(
            Instant::now() + config.heartbeat_interval,
            config.heartbeat_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let active_streams = active.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            subsystem = logging::SUBSYSTEM_STREAM,
            tenant_id = tenant_id.as_deref().unwrap_or("*"),
            active_streams,
            "SSE stream opened"
        );

        Ok(Self {
            connected: Some(Event::new(
                DomainEvent::connected(defaults::SERVER_VERSION),
                tenant_id.clone(),
            )),
            events: ReceiverStream::new(rx),
            heartbeat: IntervalStream::new(interval),
            _subscription: subscription,
            _guard: ConnectionGuard {
                active,
                tenant_id,
                opened_at: Instant::now(),
            },
        })
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        if let Some(connected) = self.connected.take() {
            return Poll::Ready(Some(connected));
        }

        match Pin::new(&mut self.events).poll_next(cx) {
            Poll::Ready(Some(event)) => return Poll::Ready(Some(event)),
            // Every sender is gone: the bus was destroyed or swapped.
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        match Pin::new(&mut self.heartbeat).poll_next(cx) {
            Poll::Ready(Some(_)) => Poll::Ready(Some(Event::new(DomainEvent::heartbeat(), None))),
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}
