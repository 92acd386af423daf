//! Connection settings, loaded from environment variables.

use std::time::Duration;

use reqwest::Url;

use crate::error::PostgrestError;

/// Where and how to reach the PostgREST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgrestConfig {
    /// Project URL without the `/rest/v1` suffix (default: `"http://localhost:54321"`).
    pub base_url: String,

    /// Public API key, sent as `apikey` on every request and as the bearer
    /// token when nobody is signed in.
    pub anon_key: String,

    /// Per-request timeout (default: 15 seconds).
    pub timeout: Duration,
}

impl Default for PostgrestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_owned(),
            anon_key: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl PostgrestConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            ..Self::default()
        }
    }

    /// Build from `STOCKFLOW_SUPABASE_URL`, `STOCKFLOW_SUPABASE_ANON_KEY` and
    /// `STOCKFLOW_HTTP_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_or("STOCKFLOW_SUPABASE_URL", &defaults.base_url),
            anon_key: env_or("STOCKFLOW_SUPABASE_ANON_KEY", ""),
            timeout: Duration::from_secs(parse_env(
                "STOCKFLOW_HTTP_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base}/rest/v1/{table}`.
    pub fn table_url(&self, table: &str) -> Result<Url, PostgrestError> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/rest/v1/{table}");
        Url::parse(&url).map_err(|e| PostgrestError::InvalidBaseUrl(format!("{url}: {e}")))
    }

    pub fn validate(&self) -> Result<(), PostgrestError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| PostgrestError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PostgrestError::InvalidBaseUrl(format!(
                "{}: scheme must be http or https",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(PostgrestError::InvalidTimeout);
        }
        Ok(())
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
