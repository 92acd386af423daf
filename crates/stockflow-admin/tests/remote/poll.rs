//! Tests for `PollingNotifier`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stockflow_admin::error::RemoteError;
use stockflow_admin::reactive::{ChangeEvent, ChangeKind};
use stockflow_admin::remote::memory::RemoteOp;
use stockflow_admin::remote::{ChangeCallback, ChangeNotifier, MemoryBackend, PollingNotifier};
use stockflow_admin::types::StaticSession;

const EVERY: Duration = Duration::from_secs(10);

fn setup() -> (Arc<MemoryBackend>, PollingNotifier) {
    let backend = Arc::new(MemoryBackend::new(StaticSession::signed_out().shared()));
    backend.seed("website_events", [json!({ "id": "e-1", "event_type": "click" })]);
    let notifier = PollingNotifier::new(backend.clone(), EVERY);
    (backend, notifier)
}

fn counter() -> (Arc<AtomicUsize>, ChangeCallback) {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let callback: ChangeCallback = Arc::new(move |e: &ChangeEvent| {
        assert_eq!(e.kind, ChangeKind::Resync);
        assert_eq!(e.table, "website_events");
        sink.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

#[tokio::test(start_paused = true)]
async fn first_poll_is_only_a_baseline() {
    let (_backend, notifier) = setup();
    let (count, callback) = counter();
    let _sub = notifier.subscribe("website_events", callback);

    tokio::time::sleep(EVERY * 3).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn a_changed_listing_fires_one_resync() {
    let (backend, notifier) = setup();
    let (count, callback) = counter();
    let _sub = notifier.subscribe("website_events", callback);
    tokio::time::sleep(Duration::from_secs(1)).await;

    backend.seed("website_events", [json!({ "id": "e-2", "event_type": "view" })]);
    tokio::time::sleep(EVERY).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(EVERY * 2).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_polls_are_skipped() {
    let (backend, notifier) = setup();
    let (count, callback) = counter();
    let _sub = notifier.subscribe("website_events", callback);
    tokio::time::sleep(Duration::from_secs(1)).await;

    backend.fail_next("website_events", RemoteOp::List, RemoteError::network("offline"));
    tokio::time::sleep(EVERY).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(backend.calls("website_events", RemoteOp::List), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_subscription_stops_polling() {
    let (backend, notifier) = setup();
    let (_count, callback) = counter();
    let sub = notifier.subscribe("website_events", callback);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.calls("website_events", RemoteOp::List), 1);

    drop(sub);
    tokio::time::sleep(EVERY * 5).await;

    assert_eq!(backend.calls("website_events", RemoteOp::List), 1);
}

#[test]
fn without_a_runtime_subscribing_is_a_no_op() {
    let (backend, notifier) = setup();
    let (_count, callback) = counter();

    let sub = notifier.subscribe("website_events", callback);

    assert!(!sub.is_active());
    assert_eq!(backend.calls("website_events", RemoteOp::List), 0);
}
