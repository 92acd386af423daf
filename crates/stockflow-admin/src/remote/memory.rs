//! In-process backend implementing both [`RemoteSource`] and [`ChangeNotifier`].
//!
//! Behaves like a row-level-secured REST-over-Postgres service closely enough
//! for screens and stores to be exercised without a network:
//!
//! - tables marked *scoped* only show rows whose `user_id` matches the current
//!   session, and reject anonymous access,
//! - ids (uuid v4) and `created_at` are assigned on insert, column defaults applied,
//! - required columns are checked after every write,
//! - every successful write is published on the change feed.
//!
//! Tests can inject one-shot failures per operation and inspect call counts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ChangeCallback, ChangeNotifier, ListRequest, RemoteSource, Subscription};
use crate::error::{RemoteError, RemoteErrorKind};
use crate::reactive::{ChangeEvent, EventEmitter};
use crate::types::SessionProvider;

/// Owner column consulted on scoped tables.
pub const OWNER_COLUMN: &str = "user_id";

// ============================================================================
// Table configuration
// ============================================================================

/// Per-table behaviour.
#[derive(Debug, Clone, Default)]
pub struct TableConfig {
    /// Rows are visible only to the session whose id is in `user_id`.
    pub scoped: bool,
    /// Columns that must be present and non-null after a write.
    pub required: Vec<String>,
    /// Values filled in on insert when the column is absent.
    pub defaults: Map<String, Value>,
}

impl TableConfig {
    pub fn scoped() -> Self {
        Self {
            scoped: true,
            ..Self::default()
        }
    }

    pub fn require(mut self, column: impl Into<String>) -> Self {
        self.required.push(column.into());
        self
    }

    pub fn default_value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(column.into(), value);
        self
    }
}

/// Operation selector for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    List,
    Get,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct Table {
    config: TableConfig,
    rows: Vec<Value>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Table>,
    faults: HashMap<(String, RemoteOp), VecDeque<RemoteError>>,
    calls: HashMap<(String, RemoteOp), usize>,
}

// ============================================================================
// MemoryBackend
// ============================================================================

pub struct MemoryBackend {
    session: Arc<dyn SessionProvider>,
    state: Mutex<State>,
    feed: Arc<EventEmitter<ChangeEvent>>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new(session: Arc<dyn SessionProvider>) -> Self {
        Self {
            session,
            state: Mutex::new(State::default()),
            feed: Arc::new(EventEmitter::new()),
            latency: Mutex::new(None),
        }
    }

    /// Register or replace a table's configuration. Existing rows are kept.
    pub fn configure(&self, table: &str, config: TableConfig) -> &Self {
        self.state.lock().tables.entry(table.to_string()).or_default().config = config;
        self
    }

    /// Delay every operation by `latency` (a `tokio::time::sleep`).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Insert rows directly, bypassing scoping, validation and the change feed.
    /// Missing `id` / `created_at` are still assigned.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.state.lock();
        let t = state.tables.entry(table.to_string()).or_default();
        for row in rows {
            let Value::Object(mut obj) = row else {
                continue;
            };
            assign_server_fields(&mut obj);
            t.rows.push(Value::Object(obj));
        }
    }

    /// Every stored row of `table`, ignoring scoping.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Make the next `op` on `table` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, table: &str, op: RemoteOp, error: RemoteError) {
        self.state
            .lock()
            .faults
            .entry((table.to_string(), op))
            .or_default()
            .push_back(error);
    }

    /// How many times `op` was invoked on `table` (including failed calls).
    pub fn calls(&self, table: &str, op: RemoteOp) -> usize {
        self.state
            .lock()
            .calls
            .get(&(table.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    /// Publish a change as if another session had made it.
    pub fn notify(&self, event: ChangeEvent) {
        self.feed.emit(&event);
    }

    /// Number of live change-feed subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.feed.len()
    }

    async fn pause(&self) {
        let latency = *self.latency.lock();
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }

    /// Count the call and pop an injected failure, if any.
    fn enter(state: &mut State, table: &str, op: RemoteOp) -> Result<(), RemoteError> {
        let key = (table.to_string(), op);
        *state.calls.entry(key.clone()).or_insert(0) += 1;
        match state.faults.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The owner id rows must carry on a scoped table, or `None` when unscoped.
    fn visibility(&self, config: &TableConfig, table: &str) -> Result<Option<String>, RemoteError> {
        if !config.scoped {
            return Ok(None);
        }
        match self.session.current() {
            Some(s) => Ok(Some(s.user_id)),
            None => Err(RemoteError::access_denied(format!(
                "permission denied for table {table}"
            ))
            .with_code("42501")),
        }
    }
}

fn visible_to(row: &Value, owner: Option<&str>) -> bool {
    match owner {
        None => true,
        Some(owner) => row.get(OWNER_COLUMN).and_then(Value::as_str) == Some(owner),
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn assign_server_fields(obj: &mut Map<String, Value>) {
    if !obj.get("id").is_some_and(Value::is_string) {
        obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
    }
    if !obj.contains_key("created_at") {
        obj.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
}

fn check_required(
    config: &TableConfig,
    table: &str,
    row: &Map<String, Value>,
) -> Result<(), RemoteError> {
    for column in &config.required {
        if row.get(column).map_or(true, Value::is_null) {
            return Err(RemoteError::validation(format!(
                "null value in column \"{column}\" of relation \"{table}\" violates not-null constraint"
            ))
            .with_code("23502"));
        }
    }
    Ok(())
}

fn expect_object(value: Value) -> Result<Map<String, Value>, RemoteError> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(RemoteError::validation(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[async_trait]
impl RemoteSource for MemoryBackend {
    async fn list(&self, table: &str, request: &ListRequest) -> Result<Vec<Value>, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock();
        Self::enter(&mut state, table, RemoteOp::List)?;
        let t = state.tables.entry(table.to_string()).or_default();
        let owner = self.visibility(&t.config, table)?;
        let mut rows: Vec<Value> = t
            .rows
            .iter()
            .filter(|r| visible_to(r, owner.as_deref()) && request.admits(r))
            .cloned()
            .collect();
        request.sort_rows(&mut rows);
        debug!(table, rows = rows.len(), "memory backend list");
        Ok(rows)
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock();
        Self::enter(&mut state, table, RemoteOp::Get)?;
        let t = state.tables.entry(table.to_string()).or_default();
        let owner = self.visibility(&t.config, table)?;
        Ok(t
            .rows
            .iter()
            .find(|r| row_id(r) == Some(id) && visible_to(r, owner.as_deref()))
            .cloned())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.pause().await;
        let inserted = {
            let mut state = self.state.lock();
            Self::enter(&mut state, table, RemoteOp::Insert)?;
            let t = state.tables.entry(table.to_string()).or_default();
            let owner = self.visibility(&t.config, table)?;
            let mut obj = expect_object(row)?;

            if let Some(owner) = owner.as_deref() {
                if obj.get(OWNER_COLUMN).and_then(Value::as_str) != Some(owner) {
                    return Err(RemoteError::access_denied(format!(
                        "new row violates row-level security policy for table \"{table}\""
                    ))
                    .with_code("42501"));
                }
            }
            for (column, value) in &t.config.defaults {
                obj.entry(column.clone()).or_insert_with(|| value.clone());
            }
            assign_server_fields(&mut obj);
            check_required(&t.config, table, &obj)?;

            if let Some(id) = obj.get("id").and_then(Value::as_str) {
                if t.rows.iter().any(|r| row_id(r) == Some(id)) {
                    return Err(RemoteError::new(
                        RemoteErrorKind::Conflict,
                        format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                    )
                    .with_code("23505"));
                }
            }
            let row = Value::Object(obj);
            t.rows.push(row.clone());
            row
        };
        debug!(table, id = row_id(&inserted).unwrap_or_default(), "memory backend insert");
        self.feed
            .emit(&ChangeEvent::insert(table, row_id(&inserted).unwrap_or_default()));
        Ok(inserted)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError> {
        self.pause().await;
        let updated = {
            let mut state = self.state.lock();
            Self::enter(&mut state, table, RemoteOp::Update)?;
            let t = state.tables.entry(table.to_string()).or_default();
            let owner = self.visibility(&t.config, table)?;
            let patch = expect_object(patch)?;

            let Some(slot) = t
                .rows
                .iter_mut()
                .find(|r| row_id(r) == Some(id) && visible_to(r, owner.as_deref()))
            else {
                return Err(RemoteError::not_found(format!("no {table} row with id {id}"))
                    .with_code("PGRST116"));
            };

            let mut merged = match slot {
                Value::Object(obj) => obj.clone(),
                _ => Map::new(),
            };
            for (column, value) in patch {
                // Identity and ownership are immutable through updates.
                if column == "id" || column == OWNER_COLUMN || column == "created_at" {
                    continue;
                }
                merged.insert(column, value);
            }
            check_required(&t.config, table, &merged)?;
            *slot = Value::Object(merged);
            slot.clone()
        };
        debug!(table, id, "memory backend update");
        self.feed.emit(&ChangeEvent::update(table, id));
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        self.pause().await;
        {
            let mut state = self.state.lock();
            Self::enter(&mut state, table, RemoteOp::Delete)?;
            let t = state.tables.entry(table.to_string()).or_default();
            let owner = self.visibility(&t.config, table)?;
            let before = t.rows.len();
            t.rows
                .retain(|r| !(row_id(r) == Some(id) && visible_to(r, owner.as_deref())));
            if t.rows.len() == before {
                return Err(RemoteError::not_found(format!("no {table} row with id {id}"))
                    .with_code("PGRST116"));
            }
        }
        debug!(table, id, "memory backend delete");
        self.feed.emit(&ChangeEvent::delete(table, id));
        Ok(())
    }
}

impl ChangeNotifier for MemoryBackend {
    fn subscribe(&self, table: &str, on_change: ChangeCallback) -> Subscription {
        let wanted = table.to_string();
        let id = self.feed.on(move |event: &ChangeEvent| {
            if event.table == wanted {
                on_change(event);
            }
        });
        let feed: Weak<EventEmitter<ChangeEvent>> = Arc::downgrade(&self.feed);
        Subscription::new(move || {
            if let Some(feed) = feed.upgrade() {
                feed.off(id);
            }
        })
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryBackend")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("subscribers", &self.feed.len())
            .finish()
    }
}
