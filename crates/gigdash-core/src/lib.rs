//! # gigdash-core
//!
//! Event taxonomy, notification mapping, and the in-process event bus for
//! the gigdash real-time dashboard.
//!
//! The API server streams bus events to browsers and the client crate turns
//! them back into notifications; both depend on the types defined here.

pub mod adapter;
pub mod bus;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod notification;

// Re-export commonly used types at crate root
pub use adapter::{BroadcastAdapter, BusAdapter, LocalAdapter, Subscriber, Subscription};
pub use bus::EventBus;
pub use error::{Error, Result};
pub use events::{
    AiAnalysisComplete, AiAnalysisFailed, AiAnalysisStarted, AlertJobMatch, AnalysisType,
    DomainEvent, Event, EventCategory, EventContext, EventName, JobCaptured, JobStatusChanged,
    JobType, ProposalGenerated, ProposalStatusChanged, SystemConnected, SystemHeartbeat, WireEvent,
};
pub use notification::{to_notification, Notification};
