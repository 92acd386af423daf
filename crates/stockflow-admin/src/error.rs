use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// RemoteError: what a RemoteSource reports
// ---------------------------------------------------------------------------

/// Classification of a failure reported by the remote data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// The request never produced a usable response (DNS, TLS, timeout, ...).
    Network,
    /// Rejected by row-level security or missing credentials.
    AccessDenied,
    /// The addressed row does not exist or is not visible to the caller.
    NotFound,
    /// The service rejected the payload (missing required column, check constraint).
    Validation,
    /// Unique or foreign-key conflict.
    Conflict,
    /// Anything else the service reported as its own failure.
    Server,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::AccessDenied => "access denied",
            Self::NotFound => "not found",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Server => "server",
        };
        f.write_str(s)
    }
}

/// Transport-level error returned by every [`RemoteSource`](crate::remote::RemoteSource) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
    /// Backend-specific error code (e.g. a Postgres SQLSTATE), when one was reported.
    pub code: Option<String>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::AccessDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Validation, message)
    }
}

// ---------------------------------------------------------------------------
// MutationKind
// ---------------------------------------------------------------------------

/// Which write was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// AdminError: top-level rollup
// ---------------------------------------------------------------------------

/// Every failure surfaced by stores, caches and screens.
///
/// `Clone` so that a single fetch outcome can be handed to every caller that
/// was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("Could not load {table}: {source}")]
    RemoteFetch {
        table: String,
        #[source]
        source: RemoteError,
    },

    #[error("You must be signed in to {action}")]
    NotAuthenticated { action: String },

    #[error("Invalid {table}: {message}")]
    Validation { table: String, message: String },

    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("Could not {op} {table}: {source}")]
    RemoteMutation {
        table: String,
        op: MutationKind,
        #[source]
        source: RemoteError,
    },

    #[error("Cannot delete {table}/{id}: {reason}")]
    DeleteBlocked {
        table: String,
        id: String,
        reason: String,
    },

    #[error("Malformed {table} row: {message}")]
    Decode { table: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdminError {
    /// Wrap a failed `list` call.
    pub fn fetch(table: impl Into<String>, source: RemoteError) -> Self {
        Self::RemoteFetch {
            table: table.into(),
            source,
        }
    }

    /// Classify a failed write. Not-found and validation failures keep their
    /// own variants so callers can react to them specifically.
    pub fn mutation(
        table: impl Into<String>,
        id: Option<&str>,
        op: MutationKind,
        source: RemoteError,
    ) -> Self {
        let table = table.into();
        match source.kind {
            RemoteErrorKind::NotFound => Self::NotFound {
                table,
                id: id.unwrap_or_default().to_string(),
            },
            RemoteErrorKind::Validation => Self::Validation {
                table,
                message: source.message,
            },
            _ => Self::RemoteMutation { table, op, source },
        }
    }

    /// Text suitable for a toast or inline alert.
    ///
    /// Server-reported validation messages are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::DeleteBlocked { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    /// True when the failure came from the remote service rather than local checks.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteFetch { .. } | Self::RemoteMutation { .. } | Self::NotFound { .. }
        )
    }
}

/// Convenience alias: the default error type is `AdminError`.
pub type Result<T, E = AdminError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
