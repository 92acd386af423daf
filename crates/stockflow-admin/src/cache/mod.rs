//! QueryCache: shared, injectable cache of fetched collections.
//!
//! Entries are keyed by [`QueryKey`] and hold the whole collection as one
//! `Arc<Vec<T>>`, replaced atomically on every successful fetch. Readers never
//! observe a partially updated collection.
//!
//! Concurrency rules:
//! - At most one fetch per key is in flight. Callers arriving meanwhile queue a
//!   `oneshot` waiter and receive that fetch's outcome.
//! - Every [`invalidate`](QueryCache::invalidate) bumps the entry's generation.
//!   A waiter whose fetch began before the current generation loops and starts
//!   (or joins) a follow-up fetch instead of accepting the stale result.
//! - The internal lock is never held across an `.await`.

mod lease;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{AdminError, Result};
use crate::reactive::EventEmitter;

pub use lease::CacheLease;

// ============================================================================
// Keys and events
// ============================================================================

/// Identifies one cached collection: a table plus the canonical request
/// parameters (including the tenant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub table: String,
    pub params: String,
}

impl QueryKey {
    pub fn new(table: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            params: params.into(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.table, self.params)
    }
}

/// Lifecycle notifications for cache entries.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// The entry was marked stale. Exactly one per `invalidate` call.
    Invalidated(QueryKey),
    /// New data replaced the previous collection.
    Updated { key: QueryKey, version: u64 },
    /// A fetch failed; previous data (if any) is kept.
    Failed { key: QueryKey, error: AdminError },
    Evicted(QueryKey),
}

/// Point-in-time view of an entry, typed for the caller.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub data: Option<Arc<Vec<T>>>,
    pub error: Option<AdminError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    /// Incremented on every successful fetch; 0 means never loaded.
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for QuerySnapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            version: 0,
            updated_at: None,
        }
    }
}

impl<T> QuerySnapshot<T> {
    /// Loading for the first time (nothing to show yet).
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    /// The cached records, or an empty slice when nothing has loaded.
    pub fn records(&self) -> &[T] {
        self.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// Internal entry state
// ============================================================================

type AnyData = Arc<dyn Any + Send + Sync>;

/// What a queued waiter receives: the generation the fetch started at, and its result.
type Outcome = (u64, std::result::Result<AnyData, AdminError>);

struct InFlight {
    generation: u64,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

struct Entry {
    data: Option<AnyData>,
    error: Option<AdminError>,
    stale: bool,
    generation: u64,
    version: u64,
    updated_at: Option<DateTime<Utc>>,
    fetched_at: Option<Instant>,
    in_flight: Option<InFlight>,
    observers: usize,
    unobserved_since: Option<Instant>,
    /// Bumped each time the last observer leaves; pairs a release with its
    /// eviction timer.
    releases: u64,
}

impl Entry {
    fn new() -> Self {
        Self {
            data: None,
            error: None,
            stale: true,
            generation: 0,
            version: 0,
            updated_at: None,
            fetched_at: None,
            in_flight: None,
            observers: 0,
            unobserved_since: Some(Instant::now()),
            releases: 0,
        }
    }
}

enum FetchAction {
    /// Caller becomes the fetcher for this generation.
    Run(u64),
    /// Caller waits on an in-flight fetch.
    Wait(oneshot::Receiver<Outcome>),
}

// ============================================================================
// QueryCache
// ============================================================================

pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    events: EventEmitter<CacheEvent>,
    gc_time: Duration,
}

impl QueryCache {
    /// `gc_time`: how long an unobserved entry survives before
    /// [`collect_garbage`](Self::collect_garbage) may evict it. Zero evicts as
    /// soon as the last lease is dropped.
    pub fn new(gc_time: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            events: EventEmitter::new(),
            gc_time,
        }
    }

    pub fn gc_time(&self) -> Duration {
        self.gc_time
    }

    /// Cache lifecycle notifications.
    pub fn events(&self) -> &EventEmitter<CacheEvent> {
        &self.events
    }

    /// Fetch the collection for `key` with single-flight coalescing.
    ///
    /// `fetcher` may be called more than once if invalidations keep landing
    /// while fetches are in flight. On failure the previous data stays cached
    /// and the error is recorded on the entry.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, mut fetcher: F) -> Result<Arc<Vec<T>>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        loop {
            match self.begin(key) {
                FetchAction::Run(generation) => {
                    debug!(key = %key, generation, "fetch start");
                    let mut guard = InFlightGuard {
                        cache: self,
                        key,
                        armed: true,
                    };
                    let result = fetcher().await;
                    guard.armed = false;
                    return self.complete(key, generation, result);
                }
                FetchAction::Wait(rx) => {
                    trace!(key = %key, "joining in-flight fetch");
                    let Ok((started_at, outcome)) = rx.await else {
                        // The fetching caller was cancelled; take over.
                        continue;
                    };
                    if self.generation(key) > started_at {
                        trace!(key = %key, "in-flight fetch predates invalidation; refetching");
                        continue;
                    }
                    return outcome.and_then(downcast::<T>);
                }
            }
        }
    }

    /// Mark the entry stale and bump its generation. Emits exactly one
    /// [`CacheEvent::Invalidated`]. Does not fetch.
    pub fn invalidate(&self, key: &QueryKey) {
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.generation += 1;
            entry.stale = true;
        }
        debug!(key = %key, "invalidated");
        self.events.emit(&CacheEvent::Invalidated(key.clone()));
    }

    /// Invalidate every entry of `table`. Returns the keys touched.
    pub fn invalidate_table(&self, table: &str) -> Vec<QueryKey> {
        let keys: Vec<QueryKey> = {
            let entries = self.entries.lock();
            let mut keys: Vec<QueryKey> =
                entries.keys().filter(|k| k.table == table).cloned().collect();
            keys.sort();
            keys
        };
        for key in &keys {
            self.invalidate(key);
        }
        keys
    }

    /// Typed view of the entry. Absent entries (or a type mismatch) yield an
    /// empty, stale snapshot.
    pub fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QuerySnapshot<T> {
        let entries = self.entries.lock();
        let Some(entry) = entries.get(key) else {
            return QuerySnapshot::default();
        };
        QuerySnapshot {
            data: entry
                .data
                .as_ref()
                .and_then(|d| Arc::clone(d).downcast::<Vec<T>>().ok()),
            error: entry.error.clone(),
            is_fetching: entry.in_flight.is_some(),
            is_stale: entry.stale,
            version: entry.version,
            updated_at: entry.updated_at,
        }
    }

    /// Loaded, not invalidated, and fetched less than `stale_time` ago.
    pub fn is_fresh(&self, key: &QueryKey, stale_time: Duration) -> bool {
        let entries = self.entries.lock();
        entries.get(key).is_some_and(|e| {
            e.data.is_some() && !e.stale && e.fetched_at.is_some_and(|t| t.elapsed() < stale_time)
        })
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of live leases on `key`.
    pub fn observers(&self, key: &QueryKey) -> usize {
        self.entries.lock().get(key).map_or(0, |e| e.observers)
    }

    /// Evict entries unobserved for at least `gc_time`. Returns how many were evicted.
    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Instant::now())
    }

    /// [`collect_garbage`](Self::collect_garbage) with an explicit clock.
    pub fn collect_garbage_at(&self, now: Instant) -> usize {
        let evicted: Vec<QueryKey> = {
            let mut entries = self.entries.lock();
            let expired: Vec<QueryKey> = entries
                .iter()
                .filter(|(_, e)| {
                    e.observers == 0
                        && e.in_flight.is_none()
                        && e.unobserved_since.is_some_and(|since| {
                            now.saturating_duration_since(since) >= self.gc_time
                        })
                })
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                entries.remove(key);
            }
            expired
        };
        for key in &evicted {
            debug!(key = %key, "evicted");
            self.events.emit(&CacheEvent::Evicted(key.clone()));
        }
        evicted.len()
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Decide whether the caller fetches or waits. Returns with no lock held.
    fn begin(&self, key: &QueryKey) -> FetchAction {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        match entry.in_flight.as_mut() {
            Some(in_flight) => {
                let (tx, rx) = oneshot::channel();
                in_flight.waiters.push(tx);
                FetchAction::Wait(rx)
            }
            None => {
                entry.in_flight = Some(InFlight {
                    generation: entry.generation,
                    waiters: Vec::new(),
                });
                FetchAction::Run(entry.generation)
            }
        }
    }

    fn generation(&self, key: &QueryKey) -> u64 {
        self.entries.lock().get(key).map_or(0, |e| e.generation)
    }

    /// Record a finished fetch, wake waiters and emit the matching event.
    fn complete<T>(
        &self,
        key: &QueryKey,
        generation: u64,
        result: Result<Vec<T>>,
    ) -> Result<Arc<Vec<T>>>
    where
        T: Send + Sync + 'static,
    {
        let outcome: std::result::Result<Arc<Vec<T>>, AdminError> = result.map(Arc::new);
        let shared: std::result::Result<AnyData, AdminError> = match &outcome {
            Ok(data) => Ok(Arc::clone(data) as AnyData),
            Err(e) => Err(e.clone()),
        };

        let (waiters, event) = {
            let mut entries = self.entries.lock();
            // The entry may have been evicted mid-fetch; recreate it so the
            // result is not lost for the waiters' follow-up reads.
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            let waiters = entry
                .in_flight
                .take()
                .map(|f| f.waiters)
                .unwrap_or_default();
            let event = match &shared {
                Ok(data) => {
                    entry.data = Some(Arc::clone(data));
                    entry.error = None;
                    entry.version += 1;
                    entry.updated_at = Some(Utc::now());
                    entry.fetched_at = Some(Instant::now());
                    entry.stale = entry.generation != generation;
                    CacheEvent::Updated {
                        key: key.clone(),
                        version: entry.version,
                    }
                }
                Err(error) => {
                    entry.error = Some(error.clone());
                    CacheEvent::Failed {
                        key: key.clone(),
                        error: error.clone(),
                    }
                }
            };
            (waiters, event)
        };

        match &event {
            CacheEvent::Failed { error, .. } => debug!(key = %key, error = %error, "fetch failed"),
            _ => debug!(key = %key, waiters = waiters.len(), "fetch finished"),
        }
        for waiter in waiters {
            // A waiter that gave up is fine to skip.
            let _ = waiter.send((generation, shared.clone()));
        }
        self.events.emit(&event);
        outcome
    }

    pub(crate) fn add_observer(&self, key: &QueryKey) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.observers += 1;
        entry.unobserved_since = None;
    }

    /// Drop one observer. When it was the last, returns the release number an
    /// eviction timer must present to [`expire`](Self::expire), unless the
    /// entry was evicted right away (zero `gc_time`).
    pub(crate) fn remove_observer(&self, key: &QueryKey) -> Option<u64> {
        let (evicted, release) = {
            let mut entries = self.entries.lock();
            let entry = entries.get_mut(key)?;
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers > 0 {
                return None;
            }
            entry.unobserved_since = Some(Instant::now());
            entry.releases += 1;
            let release = entry.releases;
            let evicted = self.gc_time.is_zero();
            if evicted {
                entries.remove(key);
            }
            (evicted, release)
        };
        if evicted {
            debug!(key = %key, "evicted on last release");
            self.events.emit(&CacheEvent::Evicted(key.clone()));
            return None;
        }
        Some(release)
    }

    /// Evict `key` if it is still unobserved since release number `release`
    /// and no fetch is running. Returns whether it was evicted.
    pub(crate) fn expire(&self, key: &QueryKey, release: u64) -> bool {
        {
            let mut entries = self.entries.lock();
            let expired = entries.get(key).is_some_and(|e| {
                e.observers == 0 && e.in_flight.is_none() && e.releases == release
            });
            if !expired {
                return false;
            }
            entries.remove(key);
        }
        debug!(key = %key, release, "evicted after gc time");
        self.events.emit(&CacheEvent::Evicted(key.clone()));
        true
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("gc_time", &self.gc_time)
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(data: AnyData) -> Result<Arc<Vec<T>>> {
    data.downcast::<Vec<T>>()
        .map_err(|_| AdminError::Internal("cached collection has a different record type".into()))
}

/// Clears the in-flight marker if the fetching future is dropped before
/// completing, so queued waiters wake up and one of them takes over.
struct InFlightGuard<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.cache.entries.lock();
        if let Some(entry) = entries.get_mut(self.key) {
            entry.in_flight = None;
        }
    }
}
