//! Centralized default constants for gigdash.
//!
//! Server configuration, the streaming endpoint, and the client receiver all
//! read their fallbacks from here. Every value below can be overridden at
//! runtime; none of them is a protocol constant.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Version string reported in `system:connected` and `/health`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// EVENT BUS
// =============================================================================

/// Broadcast channel capacity for [`crate::adapter::BroadcastAdapter`].
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// STREAMING ENDPOINT
// =============================================================================

/// Heartbeat period in seconds. Keeps idle streams alive through proxies.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Per-connection queue depth between the bus and the SSE writer.
/// Events beyond this are dropped for the slow connection only.
pub const STREAM_BUFFER: usize = 256;

/// Route the streaming endpoint is mounted on.
pub const EVENTS_PATH: &str = "/api/v1/events";

/// Query parameter carrying the tenant scope.
pub const TENANT_QUERY_PARAM: &str = "tenantId";

// =============================================================================
// CLIENT RECEIVER
// =============================================================================

/// Notifications retained by the client store.
pub const MAX_NOTIFICATIONS: usize = 50;

/// Reconnect delay for attempt 0, in milliseconds.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on any reconnect delay, in milliseconds.
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Jitter added to each reconnect delay is drawn from `[0, this)`.
pub const RECONNECT_JITTER_MS: u64 = 500;

/// Default events URL for clients.
pub const EVENTS_URL: &str = "http://127.0.0.1:3000/api/v1/events";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_bounds_are_ordered() {
        assert!(RECONNECT_BASE_DELAY_MS < RECONNECT_MAX_DELAY_MS);
        assert!(RECONNECT_JITTER_MS < RECONNECT_BASE_DELAY_MS);
    }

    #[test]
    fn test_events_url_matches_route() {
        assert!(EVENTS_URL.ends_with(EVENTS_PATH));
    }

    #[test]
    fn test_server_version_not_empty() {
        assert!(!SERVER_VERSION.is_empty());
    }
}
