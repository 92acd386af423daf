//! Tests for `QueryCache::fetch` coalescing and invalidation races.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stockflow_admin::cache::{QueryCache, QueryKey};
use stockflow_admin::error::{AdminError, RemoteError};

// ============================================================================
// Helpers
// ============================================================================

fn key() -> QueryKey {
    QueryKey::new("suppliers", "select=*&order=name.asc")
}

const LATENCY: Duration = Duration::from_millis(50);

// ============================================================================
// Coalescing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_request() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let fetch = move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(LATENCY).await;
        Ok::<_, AdminError>(vec!["a", "b", "c"])
    };

    let k = key();
    let (a, b, c) = tokio::join!(
        cache.fetch(&k, fetch),
        cache.fetch(&k, fetch),
        cache.fetch(&k, fetch)
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let a = a.unwrap();
    assert!(Arc::ptr_eq(&a, &b.unwrap()));
    assert!(Arc::ptr_eq(&a, &c.unwrap()));
    assert_eq!(*a, vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn sequential_fetches_each_hit_the_source() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let fetch = move || async move {
        Ok::<_, AdminError>(vec![counter.fetch_add(1, Ordering::SeqCst)])
    };

    let k = key();
    cache.fetch(&k, fetch).await.unwrap();
    let second = cache.fetch(&k, fetch).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*second, vec![1]);
    assert_eq!(cache.snapshot::<usize>(&k).version, 2);
}

// ============================================================================
// Invalidation while in flight
// ============================================================================

#[tokio::test(start_paused = true)]
async fn invalidation_during_fetch_triggers_a_follow_up_fetch() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let fetch = move || async move {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(LATENCY).await;
        Ok::<_, AdminError>(vec![n])
    };

    let k = key();
    let first = cache.fetch(&k, fetch);
    let after_write = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate(&k);
        cache.fetch(&k, fetch).await
    };
    let (first, after_write) = tokio::join!(first, after_write);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*first.unwrap(), vec![1]);
    // The caller that invalidated never sees data fetched before its write.
    assert_eq!(*after_write.unwrap(), vec![2]);

    let snap = cache.snapshot::<usize>(&k);
    assert!(!snap.is_stale);
    assert_eq!(snap.records(), &[2]);
}

#[tokio::test(start_paused = true)]
async fn waiter_takes_over_when_the_fetching_caller_is_cancelled() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let fetch = move || async move {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(LATENCY).await;
        Ok::<_, AdminError>(vec![n])
    };

    let k = key();
    let (cancelled, waiter) = tokio::join!(
        tokio::time::timeout(Duration::from_millis(10), cache.fetch(&k, fetch)),
        cache.fetch(&k, fetch)
    );

    assert!(cancelled.is_err());
    assert_eq!(*waiter.unwrap(), vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.snapshot::<usize>(&k).is_fetching);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failed_fetch_keeps_previous_data_and_records_the_error() {
    let cache = QueryCache::default();
    let k = key();

    cache
        .fetch(&k, || async { Ok::<_, AdminError>(vec![1u32, 2]) })
        .await
        .unwrap();

    let err = cache
        .fetch::<u32, _, _>(&k, || async {
            Err(AdminError::fetch("suppliers", RemoteError::network("offline")))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::RemoteFetch { .. }));

    let snap = cache.snapshot::<u32>(&k);
    assert_eq!(snap.records(), &[1, 2]);
    assert_eq!(snap.error, Some(err));
    assert_eq!(snap.version, 1);

    cache
        .fetch(&k, || async { Ok::<_, AdminError>(vec![3u32]) })
        .await
        .unwrap();
    let snap = cache.snapshot::<u32>(&k);
    assert_eq!(snap.error, None);
    assert_eq!(snap.records(), &[3]);
}

#[tokio::test]
async fn snapshot_of_unknown_key_is_empty_and_stale() {
    let cache = QueryCache::default();
    let snap = cache.snapshot::<u32>(&key());
    assert!(snap.data.is_none());
    assert!(snap.is_stale);
    assert!(!snap.is_loading());
    assert!(snap.records().is_empty());
}

#[tokio::test]
async fn freshness_follows_invalidation() {
    let cache = QueryCache::default();
    let k = key();
    let stale_time = Duration::from_secs(60);

    assert!(!cache.is_fresh(&k, stale_time));
    cache
        .fetch(&k, || async { Ok::<_, AdminError>(vec![1u8]) })
        .await
        .unwrap();
    assert!(cache.is_fresh(&k, stale_time));
    assert!(!cache.is_fresh(&k, Duration::ZERO));

    cache.invalidate(&k);
    assert!(!cache.is_fresh(&k, stale_time));
    // Data survives invalidation until the refetch replaces it.
    assert_eq!(cache.snapshot::<u8>(&k).records(), &[1]);
}
