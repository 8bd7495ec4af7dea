//! Human-readable projection of events for the dashboard's notification list.
//!
//! [`to_notification`] runs on the client's receive path, so it is total:
//! every taxonomy member has a branch, every branch produces a non-empty
//! title and description, and names this build does not know fall back to
//! [`Notification::fallback`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{DomainEvent, Event, EventCategory};

/// A notification shown in the dashboard's bell menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Same as the originating event id.
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    /// In-app route for events that reference a job or proposal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Notification {
    /// Generic notification for events outside the known taxonomy.
    pub fn fallback(id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            title: "Notification".to_string(),
            description: "Something happened".to_string(),
            category: EventCategory::System,
            timestamp,
            read: false,
            href: None,
        }
    }
}

fn job_href(job_id: &str) -> String {
    format!("/jobs/{}", job_id)
}

fn proposal_href(proposal_id: &str) -> String {
    format!("/proposals/{}", proposal_id)
}

/// Producers occasionally send empty titles; never render an empty line.
fn or_placeholder(text: &str, placeholder: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Map an event to its notification.
pub fn to_notification(event: &Event) -> Notification {
    let (title, description, href) = match &event.kind {
        DomainEvent::JobCaptured(p) => (
            "New job captured".to_string(),
            format!(
                "{} ({})",
                or_placeholder(&p.title, "Untitled job"),
                p.job_type.label()
            ),
            Some(job_href(&p.job_id)),
        ),
        DomainEvent::JobStatusChanged(p) => (
            "Job status updated".to_string(),
            format!(
                "{}: {} -> {}",
                or_placeholder(&p.title, "Untitled job"),
                or_placeholder(&p.previous_status, "unknown"),
                or_placeholder(&p.new_status, "unknown")
            ),
            Some(job_href(&p.job_id)),
        ),
        DomainEvent::AiAnalysisStarted(p) => (
            "AI analysis started".to_string(),
            format!("{} analysis is running", p.analysis_type.label()),
            p.job_id.as_deref().map(job_href),
        ),
        DomainEvent::AiAnalysisComplete(p) => {
            let description = match (p.score, p.summary.as_deref().map(str::trim)) {
                (_, Some(summary)) if !summary.is_empty() => summary.to_string(),
                (Some(score), _) => {
                    format!("{} analysis scored {}/100", p.analysis_type.label(), score)
                }
                _ => format!("{} analysis finished", p.analysis_type.label()),
            };
            (
                "AI analysis complete".to_string(),
                description,
                p.job_id.as_deref().map(job_href),
            )
        }
        DomainEvent::AiAnalysisFailed(p) => (
            "AI analysis failed".to_string(),
            format!(
                "{}: {}",
                p.analysis_type.label(),
                or_placeholder(&p.error, "unknown error")
            ),
            p.job_id.as_deref().map(job_href),
        ),
        DomainEvent::ProposalGenerated(p) => (
            "Proposal generated".to_string(),
            format!(
                "Draft ready for {}",
                or_placeholder(&p.job_title, "untitled job")
            ),
            Some(proposal_href(&p.proposal_id)),
        ),
        DomainEvent::ProposalStatusChanged(p) => (
            "Proposal status updated".to_string(),
            format!(
                "{}: {} -> {}",
                or_placeholder(&p.job_title, "Untitled job"),
                or_placeholder(&p.previous_status, "unknown"),
                or_placeholder(&p.new_status, "unknown")
            ),
            Some(proposal_href(&p.proposal_id)),
        ),
        DomainEvent::SystemConnected(p) => (
            "Connected".to_string(),
            format!(
                "Live updates active (server {})",
                or_placeholder(&p.server_version, "unknown")
            ),
            None,
        ),
        DomainEvent::SystemHeartbeat(_) => {
            ("Heartbeat".to_string(), "Connection alive".to_string(), None)
        }
        DomainEvent::AlertJobMatch(p) => (
            "Job match found".to_string(),
            format!(
                "{} matches your profile ({}%)",
                or_placeholder(&p.title, "Untitled job"),
                p.match_score
            ),
            Some(job_href(&p.job_id)),
        ),
    };

    Notification {
        id: event.id,
        title,
        description,
        category: event.kind.category(),
        timestamp: event.timestamp,
        read: false,
        href,
    }
}
