//! Tests for eviction of unobserved entries.

use std::sync::Arc;
use std::time::Duration;

use stockflow_admin::cache::{QueryCache, QueryKey};
use stockflow_admin::entity::Supplier;
use stockflow_admin::types::{Session, StaticSession};
use stockflow_admin::{AdminConfig, AdminContext};

fn key() -> QueryKey {
    QueryKey::new("suppliers", "select=*")
}

async fn load(cache: &QueryCache) {
    cache
        .fetch(&key(), || async { Ok(vec![1u32, 2, 3]) })
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn released_entry_is_evicted_after_gc_time() {
    let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
    let lease = cache.lease(key());
    load(&cache).await;

    drop(lease);
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(cache.contains(&key()));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!cache.contains(&key()));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn re_observed_entry_outlives_the_earlier_timer() {
    let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
    drop(cache.lease(key()));
    load(&cache).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    let lease = cache.lease(key());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(cache.contains(&key()));
    assert_eq!(cache.snapshot::<u32>(&key()).records(), &[1, 2, 3]);

    drop(lease);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!cache.contains(&key()));
}

#[tokio::test(start_paused = true)]
async fn unmounted_screen_releases_its_collection() {
    let session = StaticSession::signed_in(Session::new("u-1")).shared();
    let config = AdminConfig {
        gc_time: Duration::from_secs(5),
        ..AdminConfig::default()
    };
    let (ctx, _backend) = AdminContext::in_memory(session, config);

    let screen = ctx.screen::<Supplier>();
    screen.load().await.unwrap();
    assert_eq!(ctx.cache().len(), 1);

    drop(screen);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(ctx.cache().is_empty());
}
