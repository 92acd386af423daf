//! Remote collection access: the backend contract every screen depends on,
//! and the change feed that tells screens when to refetch.

pub mod memory;
pub mod poll;
pub mod request;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
pub use crate::reactive::{ChangeEvent, ChangeKind};
pub use memory::MemoryBackend;
pub use poll::PollingNotifier;
pub use request::{ListRequest, OrderBy, ServerFilter};

// ============================================================================
// RemoteSource: the collection access contract
// ============================================================================

/// A table-oriented remote data service.
///
/// Rows travel as JSON objects; typed parsing happens in the store. Visibility
/// scoping by tenant is the backend's job: `list` returns only what the current
/// caller may see, and `update`/`delete` on an invisible row report `NotFound`.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// All rows of `table` visible to the caller, filtered and ordered per `request`.
    async fn list(&self, table: &str, request: &ListRequest) -> Result<Vec<Value>, RemoteError>;

    /// One row by id, or `None` when it does not exist or is not visible.
    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, RemoteError>;

    /// Insert a row and return it as persisted (server-assigned id, timestamps, defaults).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError>;

    /// Merge `patch` into the row with `id` and return the persisted row.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: RemoteSource + ?Sized> RemoteSource for Arc<T> {
    async fn list(&self, table: &str, request: &ListRequest) -> Result<Vec<Value>, RemoteError> {
        (**self).list(table, request).await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, RemoteError> {
        (**self).get(table, id).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        (**self).insert(table, row).await
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError> {
        (**self).update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        (**self).delete(table, id).await
    }
}

// ============================================================================
// ChangeNotifier: "something changed in this table"
// ============================================================================

/// Callback invoked for every change on a subscribed table.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Push (or emulated push) notifications of table changes. Payloads carry no
/// guarantees beyond "something changed"; consumers refetch.
pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self, table: &str, on_change: ChangeCallback) -> Subscription;
}

impl<T: ChangeNotifier + ?Sized> ChangeNotifier for Arc<T> {
    fn subscribe(&self, table: &str, on_change: ChangeCallback) -> Subscription {
        (**self).subscribe(table, on_change)
    }
}

// ============================================================================
// Subscription: RAII unsubscribe handle
// ============================================================================

/// Releases a change subscription when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release now. Equivalent to dropping.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
