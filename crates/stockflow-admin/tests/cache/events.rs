//! Tests for cache lifecycle events.

use std::sync::Arc;

use parking_lot::Mutex;
use stockflow_admin::cache::{CacheEvent, QueryCache, QueryKey};
use stockflow_admin::error::{AdminError, RemoteError};

fn record(cache: &QueryCache) -> Arc<Mutex<Vec<CacheEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    cache.events().on(move |e: &CacheEvent| sink.lock().push(e.clone()));
    log
}

#[test]
fn each_invalidate_emits_exactly_one_event() {
    let cache = QueryCache::default();
    let log = record(&cache);
    let k = QueryKey::new("suppliers", "select=*");

    cache.invalidate(&k);
    cache.invalidate(&k);
    cache.invalidate(&k);

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|e| *e == CacheEvent::Invalidated(k.clone())));
}

#[test]
fn invalidate_table_touches_every_key_of_that_table_only() {
    let cache = QueryCache::default();
    let a = QueryKey::new("suppliers", "tenant=u-1");
    let b = QueryKey::new("suppliers", "tenant=u-2");
    let other = QueryKey::new("delivery_notes", "tenant=u-1");
    for k in [&a, &b, &other] {
        cache.invalidate(k);
    }
    let log = record(&cache);

    let touched = cache.invalidate_table("suppliers");

    assert_eq!(touched, vec![a.clone(), b.clone()]);
    assert_eq!(
        *log.lock(),
        vec![CacheEvent::Invalidated(a), CacheEvent::Invalidated(b)]
    );
}

#[tokio::test]
async fn fetch_outcomes_are_published() {
    let cache = QueryCache::default();
    let log = record(&cache);
    let k = QueryKey::new("suppliers", "select=*");

    cache
        .fetch(&k, || async { Ok::<_, AdminError>(vec![1u8]) })
        .await
        .unwrap();
    let err = cache
        .fetch::<u8, _, _>(&k, || async {
            Err(AdminError::fetch("suppliers", RemoteError::network("offline")))
        })
        .await
        .unwrap_err();

    assert_eq!(
        *log.lock(),
        vec![
            CacheEvent::Updated {
                key: k.clone(),
                version: 1
            },
            CacheEvent::Failed { key: k, error: err },
        ]
    );
}
