//! Event taxonomy and envelope for real-time notifications.
//!
//! Every event the dashboard can push is one variant of [`DomainEvent`],
//! carrying its own payload struct. The event name is derived from the
//! variant, so a name/payload mismatch cannot be constructed.
//!
//! ## Wire Format (SSE data line)
//!
//! ```text
//! {"id":"019508a0-...","name":"job:captured","payload":{"jobId":"j1",...},"timestamp":"...","tenantId":"t1"}
//! ```
//!
//! Producers build a [`DomainEvent`] and hand it to
//! [`crate::EventBus::emit`]; the bus wraps it in an [`Event`] with a fresh
//! UUIDv7 and timestamp.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// Names and categories
// ============================================================================

/// Grouping used by clients for iconography. Derived from the event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Job,
    Ai,
    Proposal,
    Project,
    System,
    Alert,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Job => "job",
            EventCategory::Ai => "ai",
            EventCategory::Proposal => "proposal",
            EventCategory::Project => "project",
            EventCategory::System => "system",
            EventCategory::Alert => "alert",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "job:captured")]
    JobCaptured,
    #[serde(rename = "job:status_changed")]
    JobStatusChanged,
    #[serde(rename = "ai:analysis_started")]
    AiAnalysisStarted,
    #[serde(rename = "ai:analysis_complete")]
    AiAnalysisComplete,
    #[serde(rename = "ai:analysis_failed")]
    AiAnalysisFailed,
    #[serde(rename = "proposal:generated")]
    ProposalGenerated,
    #[serde(rename = "proposal:status_changed")]
    ProposalStatusChanged,
    #[serde(rename = "system:connected")]
    SystemConnected,
    #[serde(rename = "system:heartbeat")]
    SystemHeartbeat,
    #[serde(rename = "alert:job_match")]
    AlertJobMatch,
}

impl EventName {
    /// Every member of the taxonomy, in declaration order.
    pub const ALL: [EventName; 10] = [
        EventName::JobCaptured,
        EventName::JobStatusChanged,
        EventName::AiAnalysisStarted,
        EventName::AiAnalysisComplete,
        EventName::AiAnalysisFailed,
        EventName::ProposalGenerated,
        EventName::ProposalStatusChanged,
        EventName::SystemConnected,
        EventName::SystemHeartbeat,
        EventName::AlertJobMatch,
    ];

    /// Wire name, also used as the SSE `event:` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::JobCaptured => "job:captured",
            EventName::JobStatusChanged => "job:status_changed",
            EventName::AiAnalysisStarted => "ai:analysis_started",
            EventName::AiAnalysisComplete => "ai:analysis_complete",
            EventName::AiAnalysisFailed => "ai:analysis_failed",
            EventName::ProposalGenerated => "proposal:generated",
            EventName::ProposalStatusChanged => "proposal:status_changed",
            EventName::SystemConnected => "system:connected",
            EventName::SystemHeartbeat => "system:heartbeat",
            EventName::AlertJobMatch => "alert:job_match",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            EventName::JobCaptured | EventName::JobStatusChanged => EventCategory::Job,
            EventName::AiAnalysisStarted
            | EventName::AiAnalysisComplete
            | EventName::AiAnalysisFailed => EventCategory::Ai,
            EventName::ProposalGenerated | EventName::ProposalStatusChanged => {
                EventCategory::Proposal
            }
            EventName::SystemConnected | EventName::SystemHeartbeat => EventCategory::System,
            EventName::AlertJobMatch => EventCategory::Alert,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown event name: {}", s)))
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Contract type of a captured job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    FixedPrice,
    Hourly,
}

impl JobType {
    pub fn label(&self) -> &'static str {
        match self {
            JobType::FixedPrice => "Fixed price",
            JobType::Hourly => "Hourly",
        }
    }
}

/// Which AI analysis produced an `ai:*` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    JobFit,
    WinPattern,
    StyleTrainer,
}

impl AnalysisType {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisType::JobFit => "Job fit",
            AnalysisType::WinPattern => "Win pattern",
            AnalysisType::StyleTrainer => "Style trainer",
        }
    }
}

/// A job posting was captured from a marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCaptured {
    pub job_id: String,
    pub title: String,
    pub job_type: JobType,
    pub job_url: String,
    #[serde(default)]
    pub skills_required: Vec<String>,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

/// A tracked job moved between pipeline states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusChanged {
    pub job_id: String,
    pub title: String,
    pub previous_status: String,
    pub new_status: String,
}

/// An AI analysis was queued or started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisStarted {
    pub analysis_type: AnalysisType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// An AI analysis finished successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisComplete {
    pub analysis_type: AnalysisType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// 0-100 where the analysis produces a score (job fit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// An AI analysis failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisFailed {
    pub analysis_type: AnalysisType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub error: String,
}

/// A proposal draft was generated for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalGenerated {
    pub proposal_id: String,
    pub job_id: String,
    pub job_title: String,
}

/// A proposal changed state (submitted, viewed, hired, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStatusChanged {
    pub proposal_id: String,
    pub job_title: String,
    pub previous_status: String,
    pub new_status: String,
}

/// First message on every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConnected {
    pub connected_at: DateTime<Utc>,
    pub server_version: String,
}

/// Keep-alive written on an idle stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHeartbeat {
    pub timestamp: DateTime<Utc>,
}

/// A newly captured job matched the freelancer's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertJobMatch {
    pub job_id: String,
    pub title: String,
    /// 0-100.
    pub match_score: u8,
    #[serde(default)]
    pub reasons: Vec<String>,
}

// ============================================================================
// Domain event
// ============================================================================

/// One variant per event name, each carrying its own payload.
///
/// Serialized adjacently tagged: `{"name":"job:captured","payload":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "job:captured")]
    JobCaptured(JobCaptured),
    #[serde(rename = "job:status_changed")]
    JobStatusChanged(JobStatusChanged),
    #[serde(rename = "ai:analysis_started")]
    AiAnalysisStarted(AiAnalysisStarted),
    #[serde(rename = "ai:analysis_complete")]
    AiAnalysisComplete(AiAnalysisComplete),
    #[serde(rename = "ai:analysis_failed")]
    AiAnalysisFailed(AiAnalysisFailed),
    #[serde(rename = "proposal:generated")]
    ProposalGenerated(ProposalGenerated),
    #[serde(rename = "proposal:status_changed")]
    ProposalStatusChanged(ProposalStatusChanged),
    #[serde(rename = "system:connected")]
    SystemConnected(SystemConnected),
    #[serde(rename = "system:heartbeat")]
    SystemHeartbeat(SystemHeartbeat),
    #[serde(rename = "alert:job_match")]
    AlertJobMatch(AlertJobMatch),
}

impl DomainEvent {
    pub fn name(&self) -> EventName {
        match self {
            DomainEvent::JobCaptured(_) => EventName::JobCaptured,
            DomainEvent::JobStatusChanged(_) => EventName::JobStatusChanged,
            DomainEvent::AiAnalysisStarted(_) => EventName::AiAnalysisStarted,
            DomainEvent::AiAnalysisComplete(_) => EventName::AiAnalysisComplete,
            DomainEvent::AiAnalysisFailed(_) => EventName::AiAnalysisFailed,
            DomainEvent::ProposalGenerated(_) => EventName::ProposalGenerated,
            DomainEvent::ProposalStatusChanged(_) => EventName::ProposalStatusChanged,
            DomainEvent::SystemConnected(_) => EventName::SystemConnected,
            DomainEvent::SystemHeartbeat(_) => EventName::SystemHeartbeat,
            DomainEvent::AlertJobMatch(_) => EventName::AlertJobMatch,
        }
    }

    pub fn category(&self) -> EventCategory {
        self.name().category()
    }

    /// `system:connected` announcing the given server version.
    pub fn connected(server_version: impl Into<String>) -> Self {
        DomainEvent::SystemConnected(SystemConnected {
            connected_at: Utc::now(),
            server_version: server_version.into(),
        })
    }

    /// `system:heartbeat` stamped now.
    pub fn heartbeat() -> Self {
        DomainEvent::SystemHeartbeat(SystemHeartbeat {
            timestamp: Utc::now(),
        })
    }

    /// Rebuild a typed event from a wire name and its raw payload.
    ///
    /// Fails with `InvalidInput` for names outside the taxonomy and with
    /// `Serialization` when the payload does not match the name's schema.
    pub fn from_parts(name: &str, payload: serde_json::Value) -> Result<Self> {
        let name = EventName::from_str(name)?;
        let tagged = serde_json::json!({ "name": name.as_str(), "payload": payload });
        Ok(serde_json::from_value(tagged)?)
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Optional emission context for events that carry additional metadata.
///
/// Used with [`crate::EventBus::emit_with_context`].
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    /// Restricts delivery to subscriptions for this tenant (or unscoped ones).
    pub tenant_id: Option<String>,
    /// Correlation ID of the request that produced the event.
    pub correlation_id: Option<Uuid>,
}

impl EventContext {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            correlation_id: None,
        }
    }
}

/// A published event: identity, time, scope, and the typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireEvent")]
pub struct Event {
    /// UUIDv7, assigned at publish time.
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: DomainEvent,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl Event {
    /// Wrap an event with a fresh id and timestamp.
    pub fn new(kind: DomainEvent, tenant_id: Option<String>) -> Self {
        Self::with_context(
            kind,
            EventContext {
                tenant_id,
                correlation_id: None,
            },
        )
    }

    pub fn with_context(kind: DomainEvent, ctx: EventContext) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            timestamp: Utc::now(),
            tenant_id: ctx.tenant_id,
            correlation_id: ctx.correlation_id,
        }
    }

    pub fn name(&self) -> EventName {
        self.kind.name()
    }

    /// Whether a subscription scoped to `filter` should see this event.
    ///
    /// Unscoped events reach everyone; scoped events reach unscoped
    /// subscriptions and subscriptions for the same tenant.
    pub fn visible_to(&self, filter: Option<&str>) -> bool {
        match (self.tenant_id.as_deref(), filter) {
            (None, _) | (_, None) => true,
            (Some(event_tenant), Some(wanted)) => event_tenant == wanted,
        }
    }
}

/// Loosely typed event as read off the wire.
///
/// Clients parse into this first so that an event from a newer server, whose
/// name is not in this build's taxonomy, still yields an id and a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl TryFrom<WireEvent> for Event {
    type Error = Error;

    fn try_from(wire: WireEvent) -> Result<Self> {
        Ok(Self {
            id: wire.id,
            kind: DomainEvent::from_parts(&wire.name, wire.payload)?,
            timestamp: wire.timestamp,
            tenant_id: wire.tenant_id,
            correlation_id: wire.correlation_id,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job_captured() -> DomainEvent {
        DomainEvent::JobCaptured(JobCaptured {
            job_id: "j1".to_string(),
            title: "Build a scraper".to_string(),
            job_type: JobType::FixedPrice,
            job_url: "https://example.com/jobs/j1".to_string(),
            skills_required: vec!["go".to_string()],
            captured_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            budget: None,
        })
    }

    #[test]
    fn test_event_name_round_trips_through_str() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), name);
        }
    }

    #[test]
    fn test_event_name_unknown_is_invalid_input() {
        let err = "job:deleted".parse::<EventName>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_event_name_serde_matches_as_str() {
        for name in EventName::ALL {
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
        }
    }

    #[test]
    fn test_category_derived_from_prefix() {
        for name in EventName::ALL {
            let prefix = name.as_str().split(':').next().unwrap();
            assert_eq!(name.category().as_str(), prefix);
        }
    }

    #[test]
    fn test_domain_event_adjacent_tagging() {
        let json = serde_json::to_value(sample_job_captured()).unwrap();
        assert_eq!(json["name"], "job:captured");
        assert_eq!(json["payload"]["jobId"], "j1");
        assert_eq!(json["payload"]["jobType"], "FIXED_PRICE");
        assert_eq!(json["payload"]["skillsRequired"][0], "go");
        // budget absent when None
        assert!(json["payload"].get("budget").is_none());
    }

    #[test]
    fn test_from_parts_rejects_mismatched_payload() {
        let payload = serde_json::json!({ "timestamp": "2024-01-01T00:00:00Z" });
        let err = DomainEvent::from_parts("job:captured", payload).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_parts_accepts_matching_payload() {
        let payload = serde_json::json!({ "timestamp": "2024-01-01T00:00:00Z" });
        let event = DomainEvent::from_parts("system:heartbeat", payload).unwrap();
        assert_eq!(event.name(), EventName::SystemHeartbeat);
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::new(sample_job_captured(), Some("t1".to_string()));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["name"], "job:captured");
        assert_eq!(json["tenantId"], "t1");
        assert_eq!(json["payload"]["title"], "Build a scraper");
        assert!(json["id"].is_string());
        assert!(json["timestamp"].is_string());
        assert!(json.get("correlationId").is_none());
    }

    #[test]
    fn test_event_parses_back_from_wire_json() {
        let event = Event::new(sample_job_captured(), None);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_wire_event_keeps_unknown_names() {
        let json = r#"{"id":"019508a0-1234-7def-8000-abcdef123456","name":"project:archived","payload":{"projectId":"p1"},"timestamp":"2024-01-01T00:00:00Z"}"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        assert_eq!(wire.name, "project:archived");
        assert!(Event::try_from(wire).is_err());
    }

    #[test]
    fn test_event_ids_are_v7() {
        let event = Event::new(DomainEvent::heartbeat(), None);
        assert_eq!(event.id.get_version_num(), 7);
    }

    #[test]
    fn test_visible_to_rules() {
        let unscoped = Event::new(DomainEvent::heartbeat(), None);
        assert!(unscoped.visible_to(None));
        assert!(unscoped.visible_to(Some("t1")));

        let scoped = Event::new(DomainEvent::heartbeat(), Some("t1".to_string()));
        assert!(scoped.visible_to(None));
        assert!(scoped.visible_to(Some("t1")));
        assert!(!scoped.visible_to(Some("t2")));
    }

    #[test]
    fn test_with_context_carries_correlation() {
        let ctx = EventContext {
            tenant_id: Some("t9".to_string()),
            correlation_id: Some(Uuid::nil()),
        };
        let event = Event::with_context(DomainEvent::heartbeat(), ctx);
        assert_eq!(event.tenant_id.as_deref(), Some("t9"));
        assert_eq!(event.correlation_id, Some(Uuid::nil()));
    }
}
