//! Toast notifications: the user-visible outcome of mutations.
//!
//! A bounded queue with per-toast TTL and a dedupe window. Callers pass the
//! current [`Instant`] so behaviour is deterministic under test.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::AdminConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Success,
    Info,
    Error,
}

pub type ToastId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub message: String,
    pub ttl: Duration,
    pub created: Instant,
}

impl Toast {
    /// 1.0 when just shown, 0.0 when expired.
    pub fn remaining(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.created).as_secs_f32();
        let ttl = self.ttl.as_secs_f32();
        if ttl == 0.0 {
            return 0.0;
        }
        (1.0 - elapsed / ttl).clamp(0.0, 1.0)
    }

    fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) < self.ttl
    }
}

struct Inner {
    queue: VecDeque<Toast>,
    next_id: ToastId,
}

/// Shared toast queue. Cheap to lock; never held across `.await`.
pub struct ToastQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
    dedupe_window: Duration,
}

impl ToastQueue {
    pub fn new(capacity: usize, ttl: Duration, dedupe_window: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                next_id: 1,
            }),
            capacity: capacity.max(1),
            ttl,
            dedupe_window,
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(
            config.toast_capacity,
            config.toast_ttl,
            config.toast_dedupe_window,
        )
    }

    /// Show `message`. An identical toast shown within the dedupe window is
    /// refreshed instead of duplicated. The oldest toast is dropped when full.
    pub fn push(&self, kind: ToastKind, message: impl Into<String>, now: Instant) -> ToastId {
        let message = message.into();
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.queue.iter_mut().find(|t| {
            t.kind == kind
                && t.message == message
                && now.saturating_duration_since(t.created) <= self.dedupe_window
        }) {
            existing.created = now;
            return existing.id;
        }

        let id = inner.next_id;
        inner.next_id += 1;
        if inner.queue.len() >= self.capacity {
            inner.queue.pop_front();
        }
        inner.queue.push_back(Toast {
            id,
            kind,
            message,
            ttl: self.ttl,
            created: now,
        });
        id
    }

    pub fn success(&self, message: impl Into<String>, now: Instant) -> ToastId {
        self.push(ToastKind::Success, message, now)
    }

    pub fn error(&self, message: impl Into<String>, now: Instant) -> ToastId {
        self.push(ToastKind::Error, message, now)
    }

    pub fn dismiss(&self, id: ToastId) {
        self.inner.lock().queue.retain(|t| t.id != id);
    }

    /// Drop expired toasts.
    pub fn retain_visible(&self, now: Instant) {
        self.inner.lock().queue.retain(|t| t.is_visible(now));
    }

    /// Unexpired toasts, oldest first.
    pub fn visible(&self, now: Instant) -> Vec<Toast> {
        self.inner
            .lock()
            .queue
            .iter()
            .filter(|t| t.is_visible(now))
            .cloned()
            .collect()
    }

    /// Most recent toast regardless of expiry.
    pub fn last(&self) -> Option<Toast> {
        self.inner.lock().queue.back().cloned()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::from_config(&AdminConfig::default())
    }
}

impl std::fmt::Debug for ToastQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastQueue")
            .field("len", &self.inner.lock().queue.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
