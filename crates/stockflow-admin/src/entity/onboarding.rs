//! Onboarding questionnaire responses and the admin dashboard statistics
//! computed from them.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    blank_as_null, decode_error, normalize, null_as_default, present, require, text_key,
    timestamp_key, Entity, SortColumn,
};
use crate::error::Result;
use crate::remote::{ListRequest, OrderBy};
use crate::types::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingResponse {
    pub id: RecordId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
    pub sector: String,
    pub business_size: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub important_features: Vec<String>,
    #[serde(default)]
    pub specific_needs: Option<String>,
    #[serde(default)]
    pub expectations: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// From the joined profile.
    #[serde(default)]
    pub user_email: Option<String>,
    /// First and last name from the joined profile.
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnboardingColumn {
    CompletedAt,
    UserEmail,
    Sector,
    BusinessSize,
}

impl SortColumn for OnboardingColumn {
    const ALL: &'static [Self] = &[
        Self::CompletedAt,
        Self::UserEmail,
        Self::Sector,
        Self::BusinessSize,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::CompletedAt => "completed_at",
            Self::UserEmail => "user_email",
            Self::Sector => "sector",
            Self::BusinessSize => "business_size",
        }
    }
}

/// A questionnaire submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OnboardingDraft {
    #[serde(serialize_with = "blank_as_null")]
    pub profile_id: Option<String>,
    pub sector: String,
    pub business_size: String,
    pub important_features: Vec<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub specific_needs: Option<String>,
    #[serde(serialize_with = "blank_as_null")]
    pub expectations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OnboardingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub specific_needs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub expectations: Option<String>,
}

impl Entity for OnboardingResponse {
    const TABLE: &'static str = "onboarding_responses";
    const LABEL: &'static str = "onboarding response";
    // Admin dashboard: every user's responses.
    const SCOPED: bool = false;

    type Draft = OnboardingDraft;
    type Patch = OnboardingPatch;
    type SortColumn = OnboardingColumn;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn default_order() -> OrderBy {
        OrderBy::desc("completed_at")
    }

    fn list_request() -> ListRequest {
        ListRequest::ordered(Self::default_order())
            .select("*,profiles!onboarding_responses_profile_id_fkey(email,first_name,last_name)")
    }

    fn search_fields(&self) -> Vec<&str> {
        present([&self.user_email, &self.user_name])
            .chain(std::iter::once(self.sector.as_str()))
            .collect()
    }

    fn sort_value(&self, column: OnboardingColumn) -> Cow<'_, str> {
        match column {
            OnboardingColumn::CompletedAt => timestamp_key(self.completed_at),
            OnboardingColumn::UserEmail => text_key(&self.user_email),
            OnboardingColumn::Sector => Cow::Borrowed(&self.sector),
            OnboardingColumn::BusinessSize => Cow::Borrowed(&self.business_size),
        }
    }

    fn facet(&self, field: &str) -> Option<&str> {
        match field {
            "sector" => Some(&self.sector),
            "business_size" => Some(&self.business_size),
            _ => None,
        }
    }

    fn validate_draft(draft: &OnboardingDraft) -> Result<OnboardingDraft> {
        Ok(OnboardingDraft {
            profile_id: normalize(&draft.profile_id),
            sector: require(Self::TABLE, "Sector", &draft.sector)?,
            business_size: require(Self::TABLE, "Business size", &draft.business_size)?,
            important_features: draft
                .important_features
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            specific_needs: normalize(&draft.specific_needs),
            expectations: normalize(&draft.expectations),
            completed_at: draft.completed_at,
        })
    }

    /// Flattens the embedded `profiles` object into `user_email` / `user_name`.
    fn from_row(mut row: Value) -> Result<Self> {
        if let Value::Object(obj) = &mut row {
            if let Some(profile) = obj.remove("profiles") {
                let field = |name: &str| profile.get(name).and_then(Value::as_str).unwrap_or("");
                let email = field("email");
                if !email.is_empty() {
                    obj.insert("user_email".into(), Value::from(email));
                }
                let name = format!("{} {}", field("first_name"), field("last_name"));
                let name = name.trim();
                if !name.is_empty() {
                    obj.insert("user_name".into(), Value::from(name));
                }
            }
        }
        serde_json::from_value(row).map_err(|e| decode_error(Self::TABLE, e))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Dashboard figures over a set of responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OnboardingStats {
    pub total_responses: usize,
    /// Completed since midnight (UTC) today.
    pub completed_today: usize,
    /// Completed since midnight seven days ago.
    pub completed_this_week: usize,
    /// Completed since the same day last month.
    pub completed_this_month: usize,
    pub sector_breakdown: BTreeMap<String, usize>,
    pub business_size_breakdown: BTreeMap<String, usize>,
    pub feature_counts: BTreeMap<String, usize>,
}

impl OnboardingStats {
    pub fn compute(responses: &[OnboardingResponse], now: DateTime<Utc>) -> Self {
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let week_ago = today - Duration::days(7);
        let month_ago = today.checked_sub_months(Months::new(1)).unwrap_or(week_ago);

        let since = |cutoff: DateTime<Utc>| {
            responses
                .iter()
                .filter(|r| r.completed_at.is_some_and(|t| t >= cutoff))
                .count()
        };

        let mut stats = Self {
            total_responses: responses.len(),
            completed_today: since(today),
            completed_this_week: since(week_ago),
            completed_this_month: since(month_ago),
            ..Self::default()
        };
        for r in responses {
            *stats.sector_breakdown.entry(r.sector.clone()).or_insert(0) += 1;
            *stats
                .business_size_breakdown
                .entry(r.business_size.clone())
                .or_insert(0) += 1;
            for feature in &r.important_features {
                *stats.feature_counts.entry(feature.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    /// Features by descending count, ties by name.
    pub fn top_features(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .feature_counts
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }
}
