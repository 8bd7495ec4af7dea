//! # gigdash-api
//!
//! HTTP surface for the gigdash event bus: the SSE stream at
//! `/api/v1/events` and a `/health` probe. The binary in `main.rs` wires
//! configuration, logging and middleware around [`router`].

pub mod config;
pub mod stream;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use gigdash_core::{defaults, BroadcastAdapter, EventBus};

use crate::config::{AdapterKind, StreamConfig};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<EventBus>,
    pub stream: StreamConfig,
    pub active_streams: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(bus: Arc<EventBus>, stream: StreamConfig) -> Self {
        Self {
            bus,
            stream,
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Build the bus with the configured adapter.
pub fn build_bus(kind: AdapterKind, capacity: usize) -> EventBus {
    match kind {
        AdapterKind::Local => EventBus::new(),
        AdapterKind::Broadcast => EventBus::with_adapter(Arc::new(BroadcastAdapter::new(capacity))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub adapter: &'static str,
    pub subscribers: usize,
    pub active_streams: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: defaults::SERVER_VERSION,
        adapter: state.bus.adapter_name(),
        subscribers: state.bus.subscriber_count(),
        active_streams: state.active_streams.load(Ordering::SeqCst),
    })
}

/// Routes without middleware. Layers are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(defaults::EVENTS_PATH, get(stream::sse_events))
        .with_state(state)
}
