//! ChangeEvent: a row in a remote table was written by someone.
//!
//! Consumers must not rely on anything beyond `table`: the payload is a hint,
//! the collection is always re-derived from the server.

use std::fmt;

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The notifier saw the table change but cannot say how (polling backends).
    Resync,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Resync => "RESYNC",
        };
        f.write_str(s)
    }
}

/// A change notification for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// Affected row, when the notifier knows it.
    pub id: Option<String>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind, id: Option<String>) -> Self {
        Self {
            table: table.into(),
            kind,
            id,
        }
    }

    pub fn insert(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(table, ChangeKind::Insert, Some(id.into()))
    }

    pub fn update(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(table, ChangeKind::Update, Some(id.into()))
    }

    pub fn delete(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(table, ChangeKind::Delete, Some(id.into()))
    }

    pub fn resync(table: impl Into<String>) -> Self {
        Self::new(table, ChangeKind::Resync, None)
    }
}
