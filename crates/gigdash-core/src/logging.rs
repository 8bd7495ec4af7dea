//! Structured logging schema for gigdash.
//!
//! Every crate logs through `tracing` with the same field keys so log
//! aggregation can query the bus, the streaming endpoint, and the client
//! uniformly. Keys are literal in the macros; the values that identify a
//! subsystem or component live here.
//!
//! ## Field Keys
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `subsystem` | One of the `SUBSYSTEM_*` values below |
//! | `component` | One of the `COMPONENT_*` values below |
//! | `event_name` | Wire name of the event (e.g. `job:captured`) |
//! | `event_id` | Event UUID |
//! | `tenant_id` | Tenant scope of an event or subscription |
//! | `correlation_id` | Correlation ID from the producing request |
//! | `subscriber_count` | Subscribers registered at fan-out time |
//! | `active_streams` | Open SSE streams |
//! | `attempt` | Reconnect attempt number (0-based) |
//! | `delay_ms` | Scheduled delay in milliseconds |
//! | `error` | Error message when an operation fails |
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | A subscriber or event callback panicked |
//! | WARN  | Publish failed, adapter lagged, transport error |
//! | INFO  | Startup, shutdown, stream open/close, reconnect scheduled |
//! | DEBUG | Per-event fan-out, per-connection drops |
//! | TRACE | Raw frames, malformed payloads |

// ─── Subsystems ────────────────────────────────────────────────────────────

/// In-process event bus and its adapters.
pub const SUBSYSTEM_BUS: &str = "bus";

/// Server-side SSE streaming endpoint.
pub const SUBSYSTEM_STREAM: &str = "stream";

/// Client receiver and reconnection manager.
pub const SUBSYSTEM_CLIENT: &str = "client";

// ─── Components ────────────────────────────────────────────────────────────

/// Synchronous in-process fan-out.
pub const COMPONENT_LOCAL_ADAPTER: &str = "local_adapter";

/// tokio broadcast fan-out.
pub const COMPONENT_BROADCAST_ADAPTER: &str = "broadcast_adapter";

/// Client connection driver.
pub const COMPONENT_RECEIVER: &str = "receiver";

/// Client notification store.
pub const COMPONENT_STORE: &str = "store";
