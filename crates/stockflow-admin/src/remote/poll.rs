//! Change notification for backends without push: poll and compare.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{ChangeCallback, ChangeNotifier, ListRequest, RemoteSource, Subscription};
use crate::reactive::ChangeEvent;

/// A [`ChangeNotifier`] that lists the table every `interval` and fires a
/// [`ChangeKind::Resync`](crate::reactive::ChangeKind::Resync) event whenever
/// the result differs from the previous poll.
///
/// The first successful poll only records a baseline. Failed polls are logged
/// and skipped; they never fire an event.
pub struct PollingNotifier {
    source: Arc<dyn RemoteSource>,
    interval: Duration,
}

impl PollingNotifier {
    pub fn new(source: Arc<dyn RemoteSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Order-sensitive digest of a listing.
pub fn fingerprint(rows: &[Value]) -> u64 {
    let mut hasher = DefaultHasher::new();
    rows.len().hash(&mut hasher);
    for row in rows {
        row.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

impl ChangeNotifier for PollingNotifier {
    fn subscribe(&self, table: &str, on_change: ChangeCallback) -> Subscription {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(table, "no tokio runtime; polling change feed disabled");
                return Subscription::noop();
            }
        };

        let source = Arc::clone(&self.source);
        let interval = self.interval;
        let table = table.to_string();
        let task = handle.spawn(async move {
            let request = ListRequest::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut baseline: Option<u64> = None;
            loop {
                ticker.tick().await;
                let rows = match source.list(&table, &request).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        debug!(table = %table, error = %err, "poll failed");
                        continue;
                    }
                };
                let current = fingerprint(&rows);
                match baseline.replace(current) {
                    Some(previous) if previous != current => {
                        debug!(table = %table, "poll detected change");
                        on_change(&ChangeEvent::resync(table.as_str()));
                    }
                    _ => {}
                }
            }
        });

        Subscription::new(move || task.abort())
    }
}
