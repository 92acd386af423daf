use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{blank_as_null, present, require, text_key, timestamp_key, Entity, SortColumn};
use crate::error::Result;
use crate::remote::{ListRequest, OrderBy, ServerFilter};
use crate::types::RecordId;

/// Host fragments that mark an event as coming from a development machine.
pub const LOCAL_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "::1"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteEvent {
    pub id: RecordId,
    pub event_type: String,
    pub page_url: String,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub element_text: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebsiteEventColumn {
    CreatedAt,
    EventType,
    PageUrl,
}

impl SortColumn for WebsiteEventColumn {
    const ALL: &'static [Self] = &[Self::CreatedAt, Self::EventType, Self::PageUrl];

    fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::EventType => "event_type",
            Self::PageUrl => "page_url",
        }
    }
}

/// A tracked interaction, as sent by the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebsiteEventDraft {
    pub event_type: String,
    pub page_url: String,
    #[serde(serialize_with = "blank_as_null")]
    pub element_id: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub element_text: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub user_agent: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub referrer: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Events are append-only; only metadata may be amended.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebsiteEventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Entity for WebsiteEvent {
    const TABLE: &'static str = "website_events";
    const LABEL: &'static str = "website event";
    const OWNER_COLUMN: Option<&'static str> = None;
    const SCOPED: bool = false;

    type Draft = WebsiteEventDraft;
    type Patch = WebsiteEventPatch;
    type SortColumn = WebsiteEventColumn;

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
        [self.page_url.as_str(), self.event_type.as_str()]
            .into_iter()
            .chain(present([&self.element_text]))
            .collect()
    }

    fn sort_value(&self, column: WebsiteEventColumn) -> Cow<'_, str> {
        match column {
            WebsiteEventColumn::CreatedAt => timestamp_key(self.created_at),
            WebsiteEventColumn::EventType => Cow::Borrowed(&self.event_type),
            WebsiteEventColumn::PageUrl => Cow::Borrowed(&self.page_url),
        }
    }

    fn facet(&self, field: &str) -> Option<&str> {
        match field {
            "event_type" => Some(&self.event_type),
            _ => None,
        }
    }

    fn validate_draft(draft: &WebsiteEventDraft) -> Result<WebsiteEventDraft> {
        let mut draft = draft.clone();
        draft.event_type = require(Self::TABLE, "Event type", &draft.event_type)?;
        draft.page_url = require(Self::TABLE, "Page URL", &draft.page_url)?;
        Ok(draft)
    }
}

impl WebsiteEvent {
    /// Events created between `from` and `to` (inclusive, whole days),
    /// excluding traffic from local development hosts.
    pub fn analytics_request(from: NaiveDate, to: NaiveDate) -> ListRequest {
        let mut request = ListRequest::ordered(Self::default_order())
            .filter(ServerFilter::gte("created_at", from.format("%Y-%m-%d").to_string()))
            .filter(ServerFilter::lte(
                "created_at",
                format!("{}T23:59:59", to.format("%Y-%m-%d")),
            ));
        for host in LOCAL_HOSTS {
            request = request.filter(ServerFilter::not_like("page_url", format!("%{host}%")));
        }
        request
    }

    pub fn is_local(&self) -> bool {
        LOCAL_HOSTS.iter().any(|h| self.page_url.contains(h))
    }
}
