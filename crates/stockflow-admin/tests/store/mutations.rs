//! Tests for `CollectionStore` writes: session checks, invalidation and
//! error mapping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use stockflow_admin::cache::{CacheEvent, QueryCache};
use stockflow_admin::entity::{Supplier, SupplierDraft, SupplierPatch};
use stockflow_admin::error::{AdminError, RemoteError, RemoteErrorKind};
use stockflow_admin::remote::memory::{RemoteOp, TableConfig};
use stockflow_admin::remote::MemoryBackend;
use stockflow_admin::store::CollectionStore;
use stockflow_admin::types::{Session, StaticSession};
use tracing_test::traced_test;

// ============================================================================
// Helpers
// ============================================================================

fn setup(session: Arc<StaticSession>) -> (Arc<MemoryBackend>, CollectionStore<Supplier>) {
    let backend = Arc::new(MemoryBackend::new(session.clone()));
    backend.configure("suppliers", TableConfig::scoped().require("name"));
    let store = CollectionStore::new(backend.clone(), Arc::new(QueryCache::default()), session);
    (backend, store)
}

fn signed_in() -> Arc<StaticSession> {
    StaticSession::signed_in(Session::new("u-1")).shared()
}

fn supplier(id: &str, name: &str, products: u64) -> Value {
    json!({ "id": id, "name": name, "user_id": "u-1", "products": [{ "count": products }] })
}

/// Count `Invalidated` events emitted by the store's cache.
fn count_invalidations(store: &CollectionStore<Supplier>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    store.cache().events().on(move |e: &CacheEvent| {
        if matches!(e, CacheEvent::Invalidated(_)) {
            sink.fetch_add(1, Ordering::SeqCst);
        }
    });
    count
}

// ============================================================================
// Session checks
// ============================================================================

#[tokio::test]
async fn mutations_without_session_fail_before_any_remote_call() {
    let (backend, store) = setup(StaticSession::signed_out().shared());
    backend.seed("suppliers", [supplier("s-1", "Acme", 0)]);

    let create = store.create(SupplierDraft::named("Acme")).await.unwrap_err();
    let update = store
        .update("s-1", SupplierPatch::default().name("Acme 2"))
        .await
        .unwrap_err();
    let delete = store.delete("s-1").await.unwrap_err();

    assert_eq!(create.to_string(), "You must be signed in to add suppliers");
    assert!(matches!(update, AdminError::NotAuthenticated { .. }));
    assert!(matches!(delete, AdminError::NotAuthenticated { .. }));
    for op in [RemoteOp::Insert, RemoteOp::Update, RemoteOp::Delete, RemoteOp::Get] {
        assert_eq!(backend.calls("suppliers", op), 0, "{op:?} was called");
    }
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn create_assigns_owner_and_refetches() {
    let (backend, store) = setup(signed_in());
    store.fetch_all().await.unwrap();

    let created = store
        .create(SupplierDraft::named("Acme Corp").email("sales@acme.test"))
        .await
        .unwrap();

    assert_eq!(created.user_id.as_deref(), Some("u-1"));
    assert!(!created.id.is_empty());
    assert!(created.created_at.is_some());
    assert_eq!(backend.calls("suppliers", RemoteOp::List), 2);
    assert_eq!(store.cached(&created.id).map(|s| s.name), Some("Acme Corp".into()));
}

#[tokio::test]
async fn blank_name_is_rejected_locally() {
    let (backend, store) = setup(signed_in());

    let err = store.create(SupplierDraft::named("   ")).await.unwrap_err();

    assert!(matches!(err, AdminError::Validation { .. }));
    assert_eq!(err.user_message(), "Supplier name is required");
    assert_eq!(backend.calls("suppliers", RemoteOp::Insert), 0);
}

#[tokio::test]
async fn server_validation_message_is_kept_verbatim() {
    let (backend, store) = setup(signed_in());
    backend.fail_next(
        "suppliers",
        RemoteOp::Insert,
        RemoteError::validation("email must be unique per company").with_code("23514"),
    );

    let err = store.create(SupplierDraft::named("Acme")).await.unwrap_err();

    assert_eq!(err.user_message(), "email must be unique per company");
}

#[tokio::test]
async fn remote_failure_surfaces_as_remote_mutation() {
    let (backend, store) = setup(signed_in());
    backend.fail_next("suppliers", RemoteOp::Insert, RemoteError::network("connection reset"));

    let err = store.create(SupplierDraft::named("Acme")).await.unwrap_err();

    match err {
        AdminError::RemoteMutation { table, source, .. } => {
            assert_eq!(table, "suppliers");
            assert_eq!(source.kind, RemoteErrorKind::Network);
        }
        other => panic!("expected RemoteMutation, got {other:?}"),
    }
    // Nothing was written, so nothing was invalidated or refetched.
    assert_eq!(backend.calls("suppliers", RemoteOp::List), 0);
}

// ============================================================================
// Invalidation
// ============================================================================

#[tokio::test]
async fn each_mutation_invalidates_exactly_once() {
    let (_backend, store) = setup(signed_in());
    let invalidations = count_invalidations(&store);

    let created = store.create(SupplierDraft::named("Acme")).await.unwrap();
    assert_eq!(invalidations.load(Ordering::SeqCst), 1);

    store
        .update(&created.id, SupplierPatch::default().name("Acme Corp"))
        .await
        .unwrap();
    assert_eq!(invalidations.load(Ordering::SeqCst), 2);

    store.delete(&created.id).await.unwrap();
    assert_eq!(invalidations.load(Ordering::SeqCst), 3);
    assert!(store.snapshot().records().is_empty());
}

#[tokio::test]
#[traced_test]
async fn refetch_failure_does_not_fail_the_mutation() {
    let (backend, store) = setup(signed_in());
    store.fetch_all().await.unwrap();
    backend.fail_next("suppliers", RemoteOp::List, RemoteError::network("timeout"));

    let created = store.create(SupplierDraft::named("Acme")).await;

    assert!(created.is_ok());
    assert_eq!(backend.rows("suppliers").len(), 1);
    let snap = store.snapshot();
    assert!(matches!(snap.error, Some(AdminError::RemoteFetch { .. })));
    assert!(snap.is_stale);
    assert!(logs_contain("refetch after mutation failed"));
}

// ============================================================================
// Update / delete
// ============================================================================

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let (backend, store) = setup(signed_in());
    backend.seed(
        "suppliers",
        [json!({ "id": "s-2", "name": "Not mine", "user_id": "u-2" })],
    );

    let missing = store
        .update("nope", SupplierPatch::default().name("X"))
        .await
        .unwrap_err();
    let foreign = store
        .update("s-2", SupplierPatch::default().name("X"))
        .await
        .unwrap_err();

    assert_eq!(
        missing,
        AdminError::NotFound {
            table: "suppliers".into(),
            id: "nope".into()
        }
    );
    assert!(matches!(foreign, AdminError::NotFound { .. }));
}

#[tokio::test]
async fn update_returns_the_persisted_record() {
    let (backend, store) = setup(signed_in());
    backend.seed("suppliers", [supplier("s-1", "Acme", 0)]);

    let updated = store
        .update("s-1", SupplierPatch::default().email("info@acme.test"))
        .await
        .unwrap();

    assert_eq!(updated.name, "Acme");
    assert_eq!(updated.email.as_deref(), Some("info@acme.test"));
    assert_eq!(updated.user_id.as_deref(), Some("u-1"));
}

#[tokio::test]
async fn supplier_with_products_cannot_be_deleted() {
    let (backend, store) = setup(signed_in());
    backend.seed("suppliers", [supplier("s-1", "Acme", 3)]);
    store.fetch_all().await.unwrap();

    let err = store.delete("s-1").await.unwrap_err();

    assert!(matches!(err, AdminError::DeleteBlocked { .. }));
    assert_eq!(
        err.user_message(),
        "This supplier cannot be deleted because it is associated with products"
    );
    assert_eq!(backend.calls("suppliers", RemoteOp::Delete), 0);
    assert_eq!(backend.rows("suppliers").len(), 1);
}

#[tokio::test]
async fn delete_of_unloaded_record_looks_it_up_first() {
    let (backend, store) = setup(signed_in());
    backend.seed("suppliers", [supplier("s-1", "Acme", 0)]);

    store.delete("s-1").await.unwrap();

    assert_eq!(backend.calls("suppliers", RemoteOp::Get), 1);
    assert!(backend.rows("suppliers").is_empty());
}

#[tokio::test]
async fn delete_with_runs_callback_before_the_refetch() {
    let (backend, store) = setup(signed_in());
    backend.seed("suppliers", [supplier("s-1", "Acme", 0)]);
    store.fetch_all().await.unwrap();

    let mut seen = None;
    store
        .delete_with("s-1", |id| {
            seen = Some((id.to_string(), backend.calls("suppliers", RemoteOp::List)));
        })
        .await
        .unwrap();

    assert_eq!(seen, Some(("s-1".to_string(), 1)));
    assert_eq!(backend.calls("suppliers", RemoteOp::List), 2);
}
