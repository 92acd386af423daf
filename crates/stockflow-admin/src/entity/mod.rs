//! Typed records and the [`Entity`] trait that lets stores, views and screens
//! work with any of them.
//!
//! Rows arrive as JSON; each entity parses them exactly once, at the store
//! boundary, into a struct with required and optional fields declared up
//! front. Nested blobs (addresses, joined profiles) are resolved during that
//! parse and never re-parsed downstream.

pub mod address;
pub mod delivery_note;
pub mod onboarding;
pub mod supplier;
pub mod website_event;

use std::borrow::Cow;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AdminError, Result};
use crate::remote::{ListRequest, OrderBy};

pub use address::Address;
pub use delivery_note::{DeliveryNote, DeliveryNoteDraft, DeliveryNotePatch, DeliveryStatus};
pub use onboarding::{OnboardingDraft, OnboardingPatch, OnboardingResponse, OnboardingStats};
pub use supplier::{Supplier, SupplierDraft, SupplierPatch};
pub use website_event::{WebsiteEvent, WebsiteEventDraft, WebsiteEventPatch};

// ============================================================================
// SortColumn
// ============================================================================

/// The fixed set of columns a list screen can sort by.
pub trait SortColumn: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every sortable column, in display order.
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A record type backed by one remote table.
pub trait Entity: DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Singular, lower-case noun used in user-facing messages.
    const LABEL: &'static str;
    /// Column the store fills with the session's user id on create, if any.
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    /// Whether the listing is restricted to the current user's rows. Scoped
    /// collections are cached per user.
    const SCOPED: bool = true;

    type Draft: Serialize + Clone + Debug + Send + Sync + 'static;
    type Patch: Serialize + Clone + Debug + Send + Sync + 'static;
    type SortColumn: SortColumn;

    fn id(&self) -> &str;

    fn created_at(&self) -> Option<DateTime<Utc>>;

    /// Stable server-side order for `list`.
    fn default_order() -> OrderBy;

    /// The request a store issues unless told otherwise.
    fn list_request() -> ListRequest {
        ListRequest::ordered(Self::default_order())
    }

    /// Values the search box matches against. Absent fields are skipped.
    fn search_fields(&self) -> Vec<&str>;

    /// Text the client-side sort compares for `column`. Missing values sort as "".
    fn sort_value(&self, column: Self::SortColumn) -> Cow<'_, str>;

    /// Value of an equality facet (dropdown filter), if the entity has one by that name.
    fn facet(&self, _field: &str) -> Option<&str> {
        None
    }

    /// Reason this record must not be deleted, if any.
    fn delete_blocker(&self) -> Option<String> {
        None
    }

    /// Normalise a draft and check required fields.
    fn validate_draft(draft: &Self::Draft) -> Result<Self::Draft>;

    fn validate_patch(patch: &Self::Patch) -> Result<Self::Patch> {
        Ok(patch.clone())
    }

    /// Parse one row. Overridden by entities whose rows carry joins to flatten.
    fn from_row(row: Value) -> Result<Self> {
        serde_json::from_value(row).map_err(|e| decode_error(Self::TABLE, e))
    }
}

pub(crate) fn decode_error(table: &str, err: serde_json::Error) -> AdminError {
    AdminError::Decode {
        table: table.to_string(),
        message: err.to_string(),
    }
}

/// A draft paired with the owner it is created for.
#[derive(Debug)]
pub struct Owned<'a, D> {
    pub column: &'static str,
    pub owner: &'a str,
    pub draft: &'a D,
}

impl<'a, D: Serialize> Owned<'a, D> {
    pub fn new(column: &'static str, owner: &'a str, draft: &'a D) -> Self {
        Self {
            column,
            owner,
            draft,
        }
    }

    /// The JSON row sent to `insert`: the draft's fields plus the owner column.
    pub fn into_row(self, table: &str) -> Result<Value> {
        let mut row = serde_json::to_value(self.draft).map_err(|e| {
            AdminError::Internal(format!("could not serialise {table} draft: {e}"))
        })?;
        match &mut row {
            Value::Object(obj) => {
                obj.insert(self.column.to_string(), Value::String(self.owner.to_string()));
                Ok(row)
            }
            _ => Err(AdminError::Internal(format!(
                "{table} draft did not serialise to an object"
            ))),
        }
    }
}

// ============================================================================
// Field helpers shared by the entity modules
// ============================================================================

/// Trimmed text, or `None` when blank.
pub fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trimmed, non-blank required text.
pub fn require(table: &str, field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdminError::Validation {
            table: table.to_string(),
            message: format!("{field} is required"),
        });
    }
    Ok(trimmed.to_string())
}

/// Serialise `None` and blank text as `null`, anything else trimmed.
pub fn blank_as_null<S: Serializer>(
    value: &Option<String>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => s.serialize_str(text),
        _ => s.serialize_none(),
    }
}

/// Deserialise `null` as the type's default.
pub fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Sort text for a timestamp: RFC 3339 in UTC, which orders lexicographically.
pub fn timestamp_key(value: Option<DateTime<Utc>>) -> Cow<'static, str> {
    match value {
        Some(ts) => Cow::Owned(ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
        None => Cow::Borrowed(""),
    }
}

/// Sort text for optional text.
pub fn text_key(value: &Option<String>) -> Cow<'_, str> {
    Cow::Borrowed(value.as_deref().unwrap_or(""))
}

/// Collect the present optional fields for search.
pub fn present<'a>(
    fields: impl IntoIterator<Item = &'a Option<String>>,
) -> impl Iterator<Item = &'a str> {
    fields.into_iter().filter_map(|f| f.as_deref())
}
