//! Tests for `CollectionStore` reads against the in-memory backend.

use std::sync::Arc;

use serde_json::{json, Value};
use stockflow_admin::cache::QueryCache;
use stockflow_admin::entity::Supplier;
use stockflow_admin::error::{AdminError, RemoteError, RemoteErrorKind};
use stockflow_admin::remote::memory::{RemoteOp, TableConfig};
use stockflow_admin::remote::MemoryBackend;
use stockflow_admin::store::CollectionStore;
use stockflow_admin::types::{Session, StaticSession};

// ============================================================================
// Helpers
// ============================================================================

fn setup(session: Arc<StaticSession>) -> (Arc<MemoryBackend>, CollectionStore<Supplier>) {
    let backend = Arc::new(MemoryBackend::new(session.clone()));
    backend.configure("suppliers", TableConfig::scoped().require("name"));
    let store = CollectionStore::new(backend.clone(), Arc::new(QueryCache::default()), session);
    (backend, store)
}

fn signed_in(user: &str) -> Arc<StaticSession> {
    StaticSession::signed_in(Session::new(user)).shared()
}

fn supplier(id: &str, name: &str, owner: &str) -> Value {
    json!({ "id": id, "name": name, "user_id": owner, "products": [{ "count": 0 }] })
}

fn names(records: &[Supplier]) -> Vec<&str> {
    records.iter().map(|s| s.name.as_str()).collect()
}

// ============================================================================
// fetch_all / ensure_loaded
// ============================================================================

#[tokio::test]
async fn fetch_all_returns_own_rows_in_server_order() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed(
        "suppliers",
        [
            supplier("s-1", "Zenith Tools", "u-1"),
            supplier("s-2", "Acme Corp", "u-1"),
            supplier("s-3", "Other Tenant Ltd", "u-2"),
        ],
    );

    let all = store.fetch_all().await.unwrap();

    assert_eq!(names(&all), vec!["Acme Corp", "Zenith Tools"]);
    assert_eq!(store.snapshot().version, 1);
}

#[tokio::test]
async fn ensure_loaded_reuses_fresh_data() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed("suppliers", [supplier("s-1", "Acme Corp", "u-1")]);

    let first = store.ensure_loaded().await.unwrap();
    let second = store.ensure_loaded().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.calls("suppliers", RemoteOp::List), 1);
}

#[tokio::test]
async fn ensure_loaded_refetches_after_mark_stale() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed("suppliers", [supplier("s-1", "Acme Corp", "u-1")]);

    store.ensure_loaded().await.unwrap();
    store.mark_stale();
    store.ensure_loaded().await.unwrap();

    assert_eq!(backend.calls("suppliers", RemoteOp::List), 2);
}

#[tokio::test]
async fn two_stores_over_one_cache_share_the_entry() {
    let session = signed_in("u-1");
    let (backend, store) = setup(session.clone());
    backend.seed("suppliers", [supplier("s-1", "Acme Corp", "u-1")]);
    let other: CollectionStore<Supplier> =
        CollectionStore::new(backend.clone(), Arc::clone(store.cache()), session);

    store.fetch_all().await.unwrap();

    assert_eq!(store.key(), other.key());
    assert_eq!(names(other.snapshot().records()), vec!["Acme Corp"]);
}

#[tokio::test]
async fn cache_key_is_scoped_to_the_signed_in_user() {
    let session = signed_in("u-1");
    let (_backend, store) = setup(session.clone());
    let as_u1 = store.key();

    session.sign_in(Session::new("u-2"));
    let as_u2 = store.key();

    session.sign_out();
    let anonymous = store.key();

    assert_eq!(as_u1.table, "suppliers");
    assert!(as_u1.params.ends_with("tenant=u-1"));
    assert!(as_u2.params.ends_with("tenant=u-2"));
    assert!(anonymous.params.ends_with("tenant=anonymous"));
}

#[tokio::test]
async fn product_counts_are_folded_into_records() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed(
        "suppliers",
        [json!({ "id": "s-1", "name": "Acme", "user_id": "u-1", "products": [{ "count": 4 }] })],
    );

    let all = store.fetch_all().await.unwrap();
    assert_eq!(all[0].product_count, 4);
}

#[tokio::test]
async fn repeated_invalidation_matches_a_single_one() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed(
        "suppliers",
        [supplier("s-1", "Zenith Tools", "u-1"), supplier("s-2", "Acme Corp", "u-1")],
    );
    store.fetch_all().await.unwrap();

    let once = store.invalidate().await.unwrap();
    let expected = store.snapshot().records().to_vec();
    assert_eq!(names(&once), vec!["Acme Corp", "Zenith Tools"]);

    store.invalidate().await.unwrap();
    store.invalidate().await.unwrap();
    assert_eq!(store.snapshot().records(), expected.as_slice());

    let (a, b) = tokio::join!(store.invalidate(), store.invalidate());
    assert_eq!(a.unwrap().as_slice(), expected.as_slice());
    assert_eq!(b.unwrap().as_slice(), expected.as_slice());

    let snapshot = store.snapshot();
    assert_eq!(snapshot.records(), expected.as_slice());
    assert!(!snapshot.is_stale);
    assert!(snapshot.error.is_none());
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn anonymous_read_of_scoped_table_is_access_denied() {
    let (_backend, store) = setup(StaticSession::signed_out().shared());

    let err = store.fetch_all().await.unwrap_err();

    match err {
        AdminError::RemoteFetch { table, source } => {
            assert_eq!(table, "suppliers");
            assert_eq!(source.kind, RemoteErrorKind::AccessDenied);
            assert_eq!(source.code.as_deref(), Some("42501"));
        }
        other => panic!("expected RemoteFetch, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_error_is_kept_on_the_snapshot() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.fail_next("suppliers", RemoteOp::List, RemoteError::network("connection reset"));

    let err = store.fetch_all().await.unwrap_err();

    let snap = store.snapshot();
    assert_eq!(snap.error, Some(err));
    assert!(snap.data.is_none());
    assert!(!snap.is_fetching);
}

#[tokio::test]
async fn fetch_one_of_missing_id_is_not_found() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed("suppliers", [supplier("s-9", "Hidden", "u-2")]);

    let missing = store.fetch_one("nope").await.unwrap_err();
    let hidden = store.fetch_one("s-9").await.unwrap_err();

    assert_eq!(
        missing,
        AdminError::NotFound {
            table: "suppliers".into(),
            id: "nope".into()
        }
    );
    assert!(matches!(hidden, AdminError::NotFound { .. }));
}

#[tokio::test]
async fn fetch_one_bypasses_the_list_cache() {
    let (backend, store) = setup(signed_in("u-1"));
    backend.seed("suppliers", [supplier("s-1", "Acme Corp", "u-1")]);

    let record = store.fetch_one("s-1").await.unwrap();

    assert_eq!(record.name, "Acme Corp");
    assert_eq!(backend.calls("suppliers", RemoteOp::List), 0);
    assert!(store.cached("s-1").is_none());
}
