use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::address::{self, Address};
use super::{
    blank_as_null, decode_error, normalize, null_as_default, present, require, text_key,
    timestamp_key, Entity, SortColumn,
};
use crate::error::Result;
use crate::remote::{ListRequest, OrderBy};
use crate::types::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: RecordId,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub peppol_enabled: bool,
    #[serde(default, deserialize_with = "address::lenient")]
    pub billing_address: Option<Address>,
    #[serde(default, deserialize_with = "address::lenient")]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Products referencing this supplier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupplierColumn {
    Name,
    Email,
    Company,
    CreatedAt,
}

impl SortColumn for SupplierColumn {
    const ALL: &'static [Self] = &[Self::Name, Self::Email, Self::Company, Self::CreatedAt];

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Company => "company",
            Self::CreatedAt => "created_at",
        }
    }
}

/// Fields a user fills in when adding a supplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupplierDraft {
    pub name: String,
    #[serde(serialize_with = "blank_as_null")]
    pub email: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub phone: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub mobile: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub company: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub municipality: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub group: Option<String>,
    pub peppol_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<Address>,
}

impl SupplierDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn municipality(mut self, municipality: impl Into<String>) -> Self {
        self.municipality = Some(municipality.into());
        self
    }
}

/// Partial update. `None` leaves a column untouched; blank text clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupplierPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub municipality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peppol_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<Address>,
}

impl SupplierPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Entity for Supplier {
    const TABLE: &'static str = "suppliers";
    const LABEL: &'static str = "supplier";

    type Draft = SupplierDraft;
    type Patch = SupplierPatch;
    type SortColumn = SupplierColumn;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn default_order() -> OrderBy {
        OrderBy::asc("name")
    }

    fn list_request() -> ListRequest {
        ListRequest::ordered(Self::default_order()).select("*,products(count)")
    }

    fn search_fields(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(present([&self.email, &self.company, &self.municipality]))
            .collect()
    }

    fn sort_value(&self, column: SupplierColumn) -> Cow<'_, str> {
        match column {
            SupplierColumn::Name => Cow::Borrowed(&self.name),
            SupplierColumn::Email => text_key(&self.email),
            SupplierColumn::Company => text_key(&self.company),
            SupplierColumn::CreatedAt => timestamp_key(self.created_at),
        }
    }

    fn facet(&self, field: &str) -> Option<&str> {
        match field {
            "group" => self.group.as_deref(),
            "municipality" => self.municipality.as_deref(),
            _ => None,
        }
    }

    fn delete_blocker(&self) -> Option<String> {
        (self.product_count > 0).then(|| {
            "This supplier cannot be deleted because it is associated with products".to_string()
        })
    }

    fn validate_draft(draft: &SupplierDraft) -> Result<SupplierDraft> {
        Ok(SupplierDraft {
            name: require(Self::TABLE, "Supplier name", &draft.name)?,
            email: normalize(&draft.email),
            phone: normalize(&draft.phone),
            mobile: normalize(&draft.mobile),
            company: normalize(&draft.company),
            municipality: normalize(&draft.municipality),
            group: normalize(&draft.group),
            peppol_enabled: draft.peppol_enabled,
            billing_address: draft.billing_address.clone().filter(|a| !a.is_empty()),
            delivery_address: draft.delivery_address.clone().filter(|a| !a.is_empty()),
        })
    }

    fn validate_patch(patch: &SupplierPatch) -> Result<SupplierPatch> {
        let mut patch = patch.clone();
        if let Some(name) = &patch.name {
            patch.name = Some(require(Self::TABLE, "Supplier name", name)?);
        }
        Ok(patch)
    }

    /// Rows listed with `products(count)` carry the count as an embedded
    /// `[{"count": n}]` array; it is folded into `product_count`.
    fn from_row(mut row: Value) -> Result<Self> {
        if let Value::Object(obj) = &mut row {
            if let Some(embedded) = obj.remove("products") {
                let count = embedded
                    .get(0)
                    .and_then(|c| c.get("count"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                obj.insert("product_count".into(), Value::from(count));
            }
        }
        serde_json::from_value(row).map_err(|e| decode_error(Self::TABLE, e))
    }
}
