//! Shared, observable notification state.
//!
//! One writer (the receiver) and any number of readers. Every mutation is a
//! single `watch` update, so readers observe whole snapshots only.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use gigdash_core::{logging, Notification};

use crate::received::ReceivedEvent;

/// Connection status exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    pub status: ConnectionStatus,
    /// Most recent first, at most `capacity` entries.
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub last_event: Option<ReceivedEvent>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            notifications: Vec::new(),
            unread_count: 0,
            last_event: None,
        }
    }
}

impl StoreState {
    fn recount_unread(&mut self) {
        self.unread_count = self.notifications.iter().filter(|n| !n.read).count();
    }
}

pub struct NotificationStore {
    tx: watch::Sender<StoreState>,
    capacity: usize,
}

impl NotificationStore {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = watch::channel(StoreState::default());
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> StoreState {
        self.tx.borrow().clone()
    }

    /// Observe changes. The receiver starts with the current state marked
    /// as seen.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tx.borrow().status
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.tx.send_if_modified(|state| {
            if state.status == status {
                return false;
            }
            state.status = status;
            true
        });
    }

    pub(crate) fn set_last_event(&self, event: ReceivedEvent) {
        self.tx.send_modify(|state| state.last_event = Some(event));
    }

    /// Prepend a notification, evicting the oldest beyond capacity.
    ///
    /// A notification whose id is already listed is ignored; replayed
    /// frames after a reconnect must not show twice.
    pub(crate) fn push_notification(&self, notification: Notification) {
        let capacity = self.capacity;
        self.tx.send_if_modified(|state| {
            if state.notifications.iter().any(|n| n.id == notification.id) {
                debug!(
                    subsystem = logging::SUBSYSTEM_CLIENT,
                    component = logging::COMPONENT_STORE,
                    notification_id = %notification.id,
                    "Duplicate notification skipped"
                );
                return false;
            }
            state.notifications.insert(0, notification);
            state.notifications.truncate(capacity);
            state.recount_unread();
            true
        });
    }

    pub fn mark_all_read(&self) {
        self.tx.send_if_modified(|state| {
            if state.unread_count == 0 && state.notifications.iter().all(|n| n.read) {
                return false;
            }
            for notification in &mut state.notifications {
                notification.read = true;
            }
            state.unread_count = 0;
            true
        });
    }

    /// Mark one notification read. Returns `false` for an unknown id, in
    /// which case observers are not woken.
    pub fn mark_read(&self, id: Uuid) -> bool {
        let mut found = false;
        self.tx.send_if_modified(|state| {
            let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            found = true;
            if notification.read {
                return false;
            }
            notification.read = true;
            state.recount_unread();
            true
        });
        found
    }

    pub fn clear_notifications(&self) {
        self.tx.send_if_modified(|state| {
            if state.notifications.is_empty() && state.unread_count == 0 {
                return false;
            }
            state.notifications.clear();
            state.unread_count = 0;
            true
        });
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(gigdash_core::defaults::MAX_NOTIFICATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gigdash_core::EventCategory;

    fn notification(n: u128) -> Notification {
        Notification {
            id: Uuid::from_u128(n),
            title: format!("t{}", n),
            description: "d".to_string(),
            category: EventCategory::Job,
            timestamp: Utc::now(),
            read: false,
            href: None,
        }
    }

    #[test]
    fn test_capacity_keeps_most_recent_first() {
        let store = NotificationStore::new(3);
        for n in 1..=5 {
            store.push_notification(notification(n));
        }
        let state = store.snapshot();
        let ids: Vec<_> = state.notifications.iter().map(|n| n.id).collect();
        assert_eq!(
            ids,
            vec![Uuid::from_u128(5), Uuid::from_u128(4), Uuid::from_u128(3)]
        );
        assert_eq!(state.unread_count, 3);
    }

    #[test]
    fn test_duplicate_id_ignored() {
        let store = NotificationStore::new(10);
        store.push_notification(notification(1));
        store.push_notification(notification(1));
        assert_eq!(store.snapshot().notifications.len(), 1);
        assert_eq!(store.snapshot().unread_count, 1);
    }

    #[test]
    fn test_mark_all_read_is_idempotent() {
        let store = NotificationStore::new(10);
        store.push_notification(notification(1));
        store.push_notification(notification(2));

        store.mark_all_read();
        store.mark_all_read();
        let state = store.snapshot();
        assert_eq!(state.unread_count, 0);
        assert!(state.notifications.iter().all(|n| n.read));
    }

    #[test]
    fn test_mark_read_recomputes_count() {
        let store = NotificationStore::new(10);
        for n in 1..=3 {
            store.push_notification(notification(n));
        }
        assert!(store.mark_read(Uuid::from_u128(2)));
        assert!(store.mark_read(Uuid::from_u128(2)));
        assert_eq!(store.snapshot().unread_count, 2);
    }

    #[test]
    fn test_mark_read_unknown_id_leaves_state_untouched() {
        let store = NotificationStore::new(10);
        store.push_notification(notification(1));
        let before = store.snapshot();
        let mut rx = store.subscribe();

        assert!(!store.mark_read(Uuid::from_u128(99)));
        assert_eq!(store.snapshot(), before);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_unread_count_after_eviction() {
        let store = NotificationStore::new(2);
        store.push_notification(notification(1));
        store.push_notification(notification(2));
        store.mark_read(Uuid::from_u128(2));
        store.push_notification(notification(3));
        // 1 was evicted, 2 is read, 3 is unread.
        assert_eq!(store.snapshot().unread_count, 1);
    }

    #[test]
    fn test_clear_notifications() {
        let store = NotificationStore::new(10);
        store.push_notification(notification(1));
        store.clear_notifications();
        let state = store.snapshot();
        assert!(state.notifications.is_empty());
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn test_status_change_wakes_observers_once() {
        let store = NotificationStore::default();
        let mut rx = store.subscribe();
        store.set_status(ConnectionStatus::Disconnected);
        assert!(!rx.has_changed().unwrap());

        store.set_status(ConnectionStatus::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, ConnectionStatus::Connecting);
    }
}
