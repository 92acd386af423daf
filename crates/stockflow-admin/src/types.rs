//! Session and identity types shared by stores, backends and screens.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Server-assigned record identifier.
pub type RecordId = String;

/// Ordering direction, shared by server-side ordering and client-side sorting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Apply this direction to an ascending comparison result.
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Owner / tenant id attached to every record this user creates.
    pub user_id: String,
    pub email: Option<String>,
    /// Bearer token forwarded to the remote service, if it needs one.
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            access_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Source of the current session. Consulted on every call, never cached.
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<Session>;
}

/// A session slot that can be signed in and out at runtime.
#[derive(Debug, Default)]
pub struct StaticSession {
    inner: RwLock<Option<Session>>,
}

impl StaticSession {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }

    pub fn sign_in(&self, session: Session) {
        *self.inner.write() = Some(session);
    }

    pub fn sign_out(&self) {
        *self.inner.write() = None;
    }

    /// Convenience for handing the slot to components that take a trait object.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl SessionProvider for StaticSession {
    fn current(&self) -> Option<Session> {
        self.inner.read().clone()
    }
}

impl<T: SessionProvider + ?Sized> SessionProvider for Arc<T> {
    fn current(&self) -> Option<Session> {
        (**self).current()
    }
}
