//! Concurrent publish/subscribe against the default in-process adapter.
//!
//! Tests verify:
//! - Publishing from many threads while connections come and go never panics
//! - Long-lived subscribers see every event published while they are registered
//! - Every subscription is released once its handle is gone

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use gigdash_core::{DomainEvent, Event, EventBus};

const PUBLISHERS: usize = 8;
const EVENTS_PER_PUBLISHER: usize = 200;

#[test]
fn test_concurrent_publish_with_subscription_churn() {
    let bus = Arc::new(EventBus::new());

    let steady_hits = Arc::new(AtomicUsize::new(0));
    let steady_counter = steady_hits.clone();
    let steady = bus
        .subscribe(
            move |_: &Event| {
                steady_counter.fetch_add(1, Ordering::Relaxed);
            },
            None,
        )
        .unwrap();

    let publishers: Vec<_> = (0..PUBLISHERS)
        .map(|i| {
            let bus = bus.clone();
            thread::spawn(move || {
                let tenant = format!("t{}", i % 3);
                for _ in 0..EVENTS_PER_PUBLISHER {
                    bus.emit(DomainEvent::heartbeat(), Some(tenant.clone()));
                }
            })
        })
        .collect();

    // Connection churn: subscribe and drop repeatedly while publishers run.
    let churners: Vec<_> = (0..4)
        .map(|i| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let sub = bus
                        .subscribe(|_: &Event| {}, Some(format!("t{}", i % 3)))
                        .unwrap();
                    sub.unsubscribe();
                    sub.unsubscribe();
                }
            })
        })
        .collect();

    for handle in publishers.into_iter().chain(churners) {
        handle.join().unwrap();
    }

    assert_eq!(
        steady_hits.load(Ordering::Relaxed),
        PUBLISHERS * EVENTS_PER_PUBLISHER
    );
    assert_eq!(bus.subscriber_count(), 1);

    drop(steady);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn test_scoped_subscriber_under_concurrency() {
    let bus = Arc::new(EventBus::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let _sub = bus
        .subscribe(
            move |event: &Event| {
                assert_ne!(event.tenant_id.as_deref(), Some("t2"));
                counter.fetch_add(1, Ordering::Relaxed);
            },
            Some("t1".to_string()),
        )
        .unwrap();

    let handles: Vec<_> = ["t1", "t2"]
        .into_iter()
        .map(|tenant| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    bus.emit(DomainEvent::heartbeat(), Some(tenant.to_string()));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(hits.load(Ordering::Relaxed), 100);
}
