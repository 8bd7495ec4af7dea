//! Events as the client sees them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use gigdash_core::{to_notification, Event, EventName, Notification, Result, WireEvent};

/// A decoded stream event.
///
/// A server newer than this client may send names outside the taxonomy;
/// those are kept as [`ReceivedEvent::Unrecognized`] so callbacks and
/// `last_event` still see them.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedEvent {
    Known(Event),
    Unrecognized(WireEvent),
}

impl ReceivedEvent {
    /// Parse the JSON `data` of one SSE frame.
    ///
    /// Fails on malformed JSON, and on a known name whose payload does not
    /// match its schema.
    pub fn parse(data: &str) -> Result<Self> {
        let wire: WireEvent = serde_json::from_str(data)?;
        if wire.name.parse::<EventName>().is_err() {
            return Ok(ReceivedEvent::Unrecognized(wire));
        }
        Ok(ReceivedEvent::Known(Event::try_from(wire)?))
    }

    pub fn id(&self) -> Uuid {
        match self {
            ReceivedEvent::Known(event) => event.id,
            ReceivedEvent::Unrecognized(wire) => wire.id,
        }
    }

    /// Wire name, e.g. `job:captured`.
    pub fn name(&self) -> &str {
        match self {
            ReceivedEvent::Known(event) => event.name().as_str(),
            ReceivedEvent::Unrecognized(wire) => &wire.name,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ReceivedEvent::Known(event) => event.timestamp,
            ReceivedEvent::Unrecognized(wire) => wire.timestamp,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            ReceivedEvent::Known(event) => event.tenant_id.as_deref(),
            ReceivedEvent::Unrecognized(wire) => wire.tenant_id.as_deref(),
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            ReceivedEvent::Known(event) => Some(event),
            ReceivedEvent::Unrecognized(_) => None,
        }
    }

    pub fn to_notification(&self) -> Notification {
        match self {
            ReceivedEvent::Known(event) => to_notification(event),
            ReceivedEvent::Unrecognized(wire) => Notification::fallback(wire.id, wire.timestamp),
        }
    }
}
