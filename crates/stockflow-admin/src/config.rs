//! Back-office configuration: list paging, cache timing and toast behaviour.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdminError, Result};

/// Runtime configuration shared by every screen mounted from one
/// [`AdminContext`](crate::screen::AdminContext).
///
/// Every field has a default, so an empty JSON object or an empty environment
/// produces a working configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Page sizes offered by list screens (default: `[12, 24]`).
    pub page_size_options: Vec<usize>,

    /// Page size a screen starts with; must be one of `page_size_options`.
    pub default_page_size: usize,

    /// How long fetched data counts as fresh (default: 5 minutes).
    #[serde(rename = "stale_time_secs", with = "secs")]
    pub stale_time: Duration,

    /// How long an unobserved cache entry is kept (default: 30 minutes).
    #[serde(rename = "gc_time_secs", with = "secs")]
    pub gc_time: Duration,

    /// Periodic refetch for every mounted screen, on top of live invalidation.
    #[serde(rename = "refetch_interval_secs", with = "opt_secs")]
    pub refetch_interval: Option<Duration>,

    /// How long a toast stays visible (default: 4 seconds).
    #[serde(rename = "toast_ttl_ms", with = "millis")]
    pub toast_ttl: Duration,

    /// Maximum toasts kept at once (default: 5).
    pub toast_capacity: usize,

    /// Identical toasts within this window are collapsed (default: 1 second).
    #[serde(rename = "toast_dedupe_ms", with = "millis")]
    pub toast_dedupe_window: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            page_size_options: vec![12, 24],
            default_page_size: 12,
            stale_time: Duration::from_secs(5 * 60),
            gc_time: Duration::from_secs(30 * 60),
            refetch_interval: None,
            toast_ttl: Duration::from_secs(4),
            toast_capacity: 5,
            toast_dedupe_window: Duration::from_secs(1),
        }
    }
}

impl AdminConfig {
    /// Build from `STOCKFLOW_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let page_size_options = match lookup("STOCKFLOW_PAGE_SIZES") {
            Some(raw) => parse_list(&raw)?,
            None => defaults.page_size_options,
        };
        let config = Self {
            page_size_options,
            default_page_size: parse_env(
                &lookup,
                "STOCKFLOW_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            ),
            stale_time: Duration::from_secs(parse_env(
                &lookup,
                "STOCKFLOW_STALE_TIME_SECS",
                defaults.stale_time.as_secs(),
            )),
            gc_time: Duration::from_secs(parse_env(
                &lookup,
                "STOCKFLOW_GC_TIME_SECS",
                defaults.gc_time.as_secs(),
            )),
            refetch_interval: match parse_env(&lookup, "STOCKFLOW_REFETCH_INTERVAL_SECS", 0u64) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            toast_ttl: Duration::from_millis(parse_env(
                &lookup,
                "STOCKFLOW_TOAST_TTL_MS",
                defaults.toast_ttl.as_millis() as u64,
            )),
            toast_capacity: parse_env(&lookup, "STOCKFLOW_TOAST_CAPACITY", defaults.toast_capacity),
            toast_dedupe_window: Duration::from_millis(parse_env(
                &lookup,
                "STOCKFLOW_TOAST_DEDUPE_MS",
                defaults.toast_dedupe_window.as_millis() as u64,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| AdminError::InvalidConfig(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size_options.is_empty() {
            return Err(AdminError::InvalidConfig(
                "page_size_options must not be empty".into(),
            ));
        }
        if self.page_size_options.contains(&0) {
            return Err(AdminError::InvalidConfig("page sizes must be positive".into()));
        }
        if !self.page_size_options.contains(&self.default_page_size) {
            return Err(AdminError::InvalidConfig(format!(
                "default_page_size {} is not one of {:?}",
                self.default_page_size, self.page_size_options
            )));
        }
        if self.toast_capacity == 0 {
            return Err(AdminError::InvalidConfig("toast_capacity must be positive".into()));
        }
        Ok(())
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| AdminError::InvalidConfig(format!("invalid page size {s:?}")))
        })
        .collect()
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
