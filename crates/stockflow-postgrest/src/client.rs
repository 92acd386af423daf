//! The HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use stockflow_admin::error::{RemoteError, RemoteErrorKind};
use stockflow_admin::remote::{ListRequest, RemoteSource};
use stockflow_admin::types::SessionProvider;
use tracing::{debug, warn};

use crate::config::PostgrestConfig;
use crate::error::{from_response, from_transport, unexpected_body, PostgrestError};
use crate::query::{id_param, list_params};

const RETURN_REPRESENTATION: &str = "return=representation";

/// [`RemoteSource`] over a PostgREST endpoint.
///
/// Every request carries the project's `apikey` and a bearer token: the signed-in
/// user's access token when there is one, the anon key otherwise. Writes ask for
/// the affected rows back (`Prefer: return=representation`); an empty result on
/// update or delete means no visible row matched the id.
pub struct PostgrestSource {
    http: reqwest::Client,
    config: PostgrestConfig,
    session: Arc<dyn SessionProvider>,
}

impl PostgrestSource {
    pub fn new(
        config: PostgrestConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, PostgrestError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PostgrestError::Client(e.to_string()))?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn config(&self) -> &PostgrestConfig {
        &self.config
    }

    fn headers(&self) -> Result<HeaderMap, RemoteError> {
        let token = self
            .session
            .current()
            .and_then(|s| s.access_token)
            .unwrap_or_else(|| self.config.anon_key.clone());

        let invalid = |what: &str| {
            RemoteError::new(RemoteErrorKind::AccessDenied, format!("invalid {what} header value"))
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.config.anon_key).map_err(|_| invalid("apikey"))?,
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| invalid("authorization"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, RemoteError> {
        let url = self
            .config
            .table_url(table)
            .map_err(|e| RemoteError::new(RemoteErrorKind::Server, e.to_string()))?;
        Ok(self.http.request(method, url).headers(self.headers()?))
    }

    /// Send and decode the JSON body. An empty body decodes as `null`.
    async fn send(&self, table: &str, builder: RequestBuilder) -> Result<Value, RemoteError> {
        let response = builder.send().await.map_err(|e| {
            warn!(table, error = %e, "postgrest transport failure");
            from_transport(&e)
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| from_transport(&e))?;
        if !status.is_success() {
            let err = from_response(status, &body);
            debug!(table, %status, kind = %err.kind, "postgrest error response");
            return Err(err);
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| unexpected_body(&format!("invalid JSON: {e}")))
    }

    async fn send_rows(
        &self,
        table: &str,
        builder: RequestBuilder,
    ) -> Result<Vec<Value>, RemoteError> {
        match self.send(table, builder).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(unexpected_body(&format!("expected an array, got {other}"))),
        }
    }
}

fn no_row(table: &str, id: &str) -> RemoteError {
    RemoteError::not_found(format!("no {table} row with id {id}")).with_code("PGRST116")
}

#[async_trait]
impl RemoteSource for PostgrestSource {
    async fn list(&self, table: &str, request: &ListRequest) -> Result<Vec<Value>, RemoteError> {
        debug!(table, query = %request.canonical(), "postgrest list");
        let builder = self.request(Method::GET, table)?.query(&list_params(request));
        self.send_rows(table, builder).await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, RemoteError> {
        debug!(table, id, "postgrest get");
        let builder = self
            .request(Method::GET, table)?
            .query(&[("select".to_string(), "*".to_string()), id_param(id)]);
        Ok(self.send_rows(table, builder).await?.into_iter().next())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        debug!(table, "postgrest insert");
        let builder = self
            .request(Method::POST, table)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);
        self.send_rows(table, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| unexpected_body("insert returned no row"))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError> {
        debug!(table, id, "postgrest update");
        let builder = self
            .request(Method::PATCH, table)?
            .query(&[id_param(id)])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        self.send_rows(table, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| no_row(table, id))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        debug!(table, id, "postgrest delete");
        let builder = self
            .request(Method::DELETE, table)?
            .query(&[id_param(id)])
            .header("Prefer", RETURN_REPRESENTATION);
        if self.send_rows(table, builder).await?.is_empty() {
            return Err(no_row(table, id));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PostgrestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestSource")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}
