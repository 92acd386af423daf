use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    blank_as_null, normalize, null_as_default, present, require, text_key, timestamp_key, Entity,
    SortColumn,
};
use crate::error::Result;
use crate::remote::OrderBy;
use crate::types::RecordId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Draft,
    Pending,
    Delivered,
    Cancelled,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryNote {
    pub id: RecordId,
    #[serde(default)]
    pub user_id: Option<String>,
    pub note_number: String,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryNoteColumn {
    NoteNumber,
    SupplierName,
    Status,
    DeliveryDate,
    CreatedAt,
}

impl SortColumn for DeliveryNoteColumn {
    const ALL: &'static [Self] = &[
        Self::NoteNumber,
        Self::SupplierName,
        Self::Status,
        Self::DeliveryDate,
        Self::CreatedAt,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::NoteNumber => "note_number",
            Self::SupplierName => "supplier_name",
            Self::Status => "status",
            Self::DeliveryDate => "delivery_date",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryNoteDraft {
    pub note_number: String,
    #[serde(serialize_with = "blank_as_null")]
    pub supplier_id: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub supplier_name: Option<String>,
    pub status: DeliveryStatus,
    pub delivery_date: Option<NaiveDate>,
    #[serde(serialize_with = "blank_as_null")]
    pub reference: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryNotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub notes: Option<String>,
}

impl Entity for DeliveryNote {
    const TABLE: &'static str = "delivery_notes";
    const LABEL: &'static str = "delivery note";

    type Draft = DeliveryNoteDraft;
    type Patch = DeliveryNotePatch;
    type SortColumn = DeliveryNoteColumn;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn default_order() -> OrderBy {
        OrderBy::desc("created_at")
    }

    fn search_fields(&self) -> Vec<&str> {
        std::iter::once(self.note_number.as_str())
            .chain(present([&self.supplier_name, &self.reference]))
            .collect()
    }

    fn sort_value(&self, column: DeliveryNoteColumn) -> Cow<'_, str> {
        match column {
            DeliveryNoteColumn::NoteNumber => Cow::Borrowed(&self.note_number),
            DeliveryNoteColumn::SupplierName => text_key(&self.supplier_name),
            DeliveryNoteColumn::Status => Cow::Borrowed(self.status.as_str()),
            DeliveryNoteColumn::DeliveryDate => self
                .delivery_date
                .map(|d| Cow::Owned(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Cow::Borrowed("")),
            DeliveryNoteColumn::CreatedAt => timestamp_key(self.created_at),
        }
    }

    fn facet(&self, field: &str) -> Option<&str> {
        match field {
            "status" => Some(self.status.as_str()),
            _ => None,
        }
    }

    fn validate_draft(draft: &DeliveryNoteDraft) -> Result<DeliveryNoteDraft> {
        Ok(DeliveryNoteDraft {
            note_number: require(Self::TABLE, "Delivery note number", &draft.note_number)?,
            supplier_id: normalize(&draft.supplier_id),
            supplier_name: normalize(&draft.supplier_name),
            status: draft.status,
            delivery_date: draft.delivery_date,
            reference: normalize(&draft.reference),
            notes: normalize(&draft.notes),
        })
    }
}
