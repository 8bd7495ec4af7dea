//! Receiver configuration.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use gigdash_core::{defaults, Error, EventName, Result};

use crate::backoff::BackoffPolicy;
use crate::received::ReceivedEvent;

/// Side-effect hook run for every decoded event, ignored names included.
pub type EventCallback = Arc<dyn Fn(&ReceivedEvent) + Send + Sync>;

#[derive(Clone)]
pub struct ReceiverConfig {
    pub url: String,
    pub tenant_id: Option<String>,
    pub max_notifications: usize,
    pub auto_connect: bool,
    /// Event names that update `last_event` and run callbacks but never
    /// become notifications.
    pub ignore_events: HashSet<String>,
    pub on_event: Option<EventCallback>,
    pub backoff: BackoffPolicy,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            url: defaults::EVENTS_URL.to_string(),
            tenant_id: None,
            max_notifications: defaults::MAX_NOTIFICATIONS,
            auto_connect: true,
            ignore_events: [EventName::SystemHeartbeat, EventName::SystemConnected]
                .iter()
                .map(|name| name.as_str().to_string())
                .collect(),
            on_event: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("url", &self.url)
            .field("tenant_id", &self.tenant_id)
            .field("max_notifications", &self.max_notifications)
            .field("auto_connect", &self.auto_connect)
            .field("ignore_events", &self.ignore_events)
            .field("on_event", &self.on_event.is_some())
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl ReceiverConfig {
    /// Defaults overridden by `GIGDASH_EVENTS_URL`, `GIGDASH_TENANT_ID` and
    /// `GIGDASH_MAX_NOTIFICATIONS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = var("GIGDASH_EVENTS_URL") {
            config.url = url.trim().to_string();
        }
        config.tenant_id = var("GIGDASH_TENANT_ID").map(|t| t.trim().to_string());
        if let Some(raw) = var("GIGDASH_MAX_NOTIFICATIONS") {
            let max: usize = raw.trim().parse().map_err(|e| {
                Error::Config(format!("GIGDASH_MAX_NOTIFICATIONS is invalid ('{}'): {}", raw, e))
            })?;
            config = config.with_max_notifications(max)?;
        }
        Ok(config)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_max_notifications(mut self, max: usize) -> Result<Self> {
        if max == 0 {
            return Err(Error::InvalidInput(
                "max_notifications must be at least 1".to_string(),
            ));
        }
        self.max_notifications = max;
        Ok(self)
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Add a name to the ignore set. The defaults stay in place.
    pub fn ignore_event(mut self, name: impl Into<String>) -> Self {
        self.ignore_events.insert(name.into());
        self
    }

    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ReceivedEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(callback));
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.max_notifications, 50);
        assert!(config.auto_connect);
        assert!(config.ignore_events.contains("system:heartbeat"));
        assert!(config.ignore_events.contains("system:connected"));
        assert_eq!(config.ignore_events.len(), 2);
    }

    #[test]
    fn test_ignore_event_extends_defaults() {
        let config = ReceiverConfig::default().ignore_event("ai:analysis_started");
        assert_eq!(config.ignore_events.len(), 3);
        assert!(config.ignore_events.contains("system:heartbeat"));
    }

    #[test]
    fn test_from_lookup() {
        let config = ReceiverConfig::from_lookup(lookup(&[
            ("GIGDASH_EVENTS_URL", "https://dash.example/api/v1/events"),
            ("GIGDASH_TENANT_ID", "t1"),
            ("GIGDASH_MAX_NOTIFICATIONS", "20"),
        ]))
        .unwrap();
        assert_eq!(config.url, "https://dash.example/api/v1/events");
        assert_eq!(config.tenant_id.as_deref(), Some("t1"));
        assert_eq!(config.max_notifications, 20);
    }

    #[test]
    fn test_from_lookup_rejects_zero_capacity() {
        let result = ReceiverConfig::from_lookup(lookup(&[("GIGDASH_MAX_NOTIFICATIONS", "0")]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = ReceiverConfig::from_lookup(lookup(&[("GIGDASH_MAX_NOTIFICATIONS", "lots")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
