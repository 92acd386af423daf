//! CollectionStore: read-through cache of one remote table.
//!
//! Reads go through the shared [`QueryCache`]. Writes go straight to the
//! [`RemoteSource`]; once the server acknowledges one, the store invalidates
//! its cache key exactly once and refetches the whole collection. The cache is
//! never patched in place, so it always holds exactly what the server returned.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{QueryCache, QueryKey, QuerySnapshot};
use crate::entity::{Entity, Owned};
use crate::error::{AdminError, MutationKind, Result};
use crate::remote::{ListRequest, RemoteSource};
use crate::types::{Session, SessionProvider};

/// Tenant marker used in cache keys when nobody is signed in.
const ANONYMOUS: &str = "anonymous";

pub struct CollectionStore<E: Entity> {
    source: Arc<dyn RemoteSource>,
    cache: Arc<QueryCache>,
    session: Arc<dyn SessionProvider>,
    request: ListRequest,
    stale_time: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for CollectionStore<E> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            session: Arc::clone(&self.session),
            request: self.request.clone(),
            stale_time: self.stale_time,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> CollectionStore<E> {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        cache: Arc<QueryCache>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            source,
            cache,
            session,
            request: E::list_request(),
            stale_time: Duration::from_secs(5 * 60),
            _entity: PhantomData,
        }
    }

    /// Replace the list request (e.g. a date-windowed analytics query).
    pub fn with_request(mut self, request: ListRequest) -> Self {
        self.request = request;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn request(&self) -> &ListRequest {
        &self.request
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Cache key: table, canonical request and, for scoped tables, the tenant.
    pub fn key(&self) -> QueryKey {
        let mut params = self.request.canonical();
        if E::SCOPED {
            let tenant = self.session.current().map(|s| s.user_id);
            params.push_str("&tenant=");
            params.push_str(tenant.as_deref().unwrap_or(ANONYMOUS));
        }
        QueryKey::new(E::TABLE, params)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch the whole collection, joining an in-flight fetch if there is one.
    pub async fn fetch_all(&self) -> Result<Arc<Vec<E>>> {
        let key = self.key();
        self.cache.fetch(&key, || self.load()).await
    }

    /// Cached data if still fresh, otherwise a fetch.
    pub async fn ensure_loaded(&self) -> Result<Arc<Vec<E>>> {
        let key = self.key();
        if self.cache.is_fresh(&key, self.stale_time) {
            if let Some(data) = self.cache.snapshot::<E>(&key).data {
                return Ok(data);
            }
        }
        self.cache.fetch(&key, || self.load()).await
    }

    /// One record straight from the server, bypassing the list cache.
    pub async fn fetch_one(&self, id: &str) -> Result<E> {
        debug!(table = E::TABLE, id, "fetching record");
        let row = self
            .source
            .get(E::TABLE, id)
            .await
            .map_err(|e| AdminError::fetch(E::TABLE, e))?;
        match row {
            Some(row) => E::from_row(row),
            None => Err(AdminError::NotFound {
                table: E::TABLE.to_string(),
                id: id.to_string(),
            }),
        }
    }

    pub fn snapshot(&self) -> QuerySnapshot<E> {
        self.cache.snapshot(&self.key())
    }

    /// A record from the cached collection, if loaded.
    pub fn cached(&self, id: &str) -> Option<E> {
        self.snapshot()
            .data
            .and_then(|all| all.iter().find(|r| r.id() == id).cloned())
    }

    // -----------------------------------------------------------------------
    // Invalidation
    // -----------------------------------------------------------------------

    /// Mark the collection stale without fetching.
    pub fn mark_stale(&self) {
        self.cache.invalidate(&self.key());
    }

    /// Mark the collection stale and refetch it.
    pub async fn invalidate(&self) -> Result<Arc<Vec<E>>> {
        let key = self.key();
        self.cache.invalidate(&key);
        self.cache.fetch(&key, || self.load()).await
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert a new record owned by the current user. Returns the record as
    /// persisted, including server-assigned fields.
    pub async fn create(&self, draft: E::Draft) -> Result<E> {
        let session = self.require_session(MutationKind::Create)?;
        let draft = E::validate_draft(&draft)?;
        let row = match E::OWNER_COLUMN {
            Some(column) => Owned::new(column, &session.user_id, &draft).into_row(E::TABLE)?,
            None => serde_json::to_value(&draft).map_err(|e| {
                AdminError::Internal(format!("could not serialise {} draft: {e}", E::TABLE))
            })?,
        };

        info!(table = E::TABLE, user = %session.user_id, "creating record");
        let created = self
            .source
            .insert(E::TABLE, row)
            .await
            .map_err(|e| AdminError::mutation(E::TABLE, None, MutationKind::Create, e))?;

        self.refresh_after(MutationKind::Create).await;
        let record = E::from_row(created)?;
        info!(table = E::TABLE, id = %record.id(), "record created");
        Ok(record)
    }

    /// Apply a partial update. Fails with `NotFound` when the id does not exist
    /// or is not visible to the current user.
    pub async fn update(&self, id: &str, patch: E::Patch) -> Result<E> {
        self.require_session(MutationKind::Update)?;
        let patch = E::validate_patch(&patch)?;
        let body = serialize_patch::<E>(&patch)?;

        info!(table = E::TABLE, id, "updating record");
        let updated = self
            .source
            .update(E::TABLE, id, body)
            .await
            .map_err(|e| AdminError::mutation(E::TABLE, Some(id), MutationKind::Update, e))?;

        self.refresh_after(MutationKind::Update).await;
        E::from_row(updated)
    }

    /// Delete a record, unless the record reports a reason it must be kept.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delete_with(id, |_| {}).await
    }

    /// [`delete`](Self::delete), calling `on_deleted` once the server has
    /// acknowledged the delete and before the collection is refetched.
    pub async fn delete_with(&self, id: &str, on_deleted: impl FnOnce(&str)) -> Result<()> {
        self.require_session(MutationKind::Delete)?;

        let record = match self.cached(id) {
            Some(record) => record,
            None => self.fetch_one(id).await?,
        };
        if let Some(reason) = record.delete_blocker() {
            info!(table = E::TABLE, id, %reason, "delete blocked");
            return Err(AdminError::DeleteBlocked {
                table: E::TABLE.to_string(),
                id: id.to_string(),
                reason,
            });
        }

        info!(table = E::TABLE, id, "deleting record");
        self.source
            .delete(E::TABLE, id)
            .await
            .map_err(|e| AdminError::mutation(E::TABLE, Some(id), MutationKind::Delete, e))?;

        on_deleted(id);
        self.refresh_after(MutationKind::Delete).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    async fn load(&self) -> Result<Vec<E>> {
        let rows = self
            .source
            .list(E::TABLE, &self.request)
            .await
            .map_err(|e| AdminError::fetch(E::TABLE, e))?;
        debug!(table = E::TABLE, rows = rows.len(), "listed");
        rows.into_iter().map(E::from_row).collect()
    }

    fn require_session(&self, op: MutationKind) -> Result<Session> {
        self.session.current().ok_or_else(|| {
            warn!(table = E::TABLE, %op, "mutation attempted without a session");
            AdminError::NotAuthenticated {
                action: action_phrase(op, E::LABEL),
            }
        })
    }

    /// One invalidation plus a refetch. A failed refetch is recorded on the
    /// cache entry and does not fail the mutation that preceded it.
    async fn refresh_after(&self, op: MutationKind) {
        if let Err(err) = self.invalidate().await {
            warn!(table = E::TABLE, %op, error = %err, "refetch after mutation failed");
        }
    }
}

fn serialize_patch<E: Entity>(patch: &E::Patch) -> Result<Value> {
    serde_json::to_value(patch)
        .map_err(|e| AdminError::Internal(format!("could not serialise {} patch: {e}", E::TABLE)))
}

/// "add suppliers", "update delivery notes", ...
fn action_phrase(op: MutationKind, label: &str) -> String {
    let verb = match op {
        MutationKind::Create => "add",
        MutationKind::Update => "update",
        MutationKind::Delete => "delete",
    };
    format!("{verb} {label}s")
}

impl<E: Entity> std::fmt::Debug for CollectionStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("table", &E::TABLE)
            .field("request", &self.request.canonical())
            .finish()
    }
}
