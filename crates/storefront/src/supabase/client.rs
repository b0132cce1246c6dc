//! REST client core: credentials, request execution, and generic table
//! operations.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::cache::{CacheKey, CacheValue};
use super::query::Query;
use super::{ApiErrorBody, SupabaseError};
use crate::config::SupabaseConfig;

/// Maximum characters of a response body to include in logs.
const LOG_BODY_LIMIT: usize = 500;

/// Whose authority a request runs under.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    /// Anonymous visitor; only public rows are visible.
    Anon,
    /// A signed-in customer's access token; row-level security applies.
    User(&'a str),
    /// Service role; bypasses row-level security. CLI only.
    ServiceRole,
}

/// Client for the managed backend.
///
/// Cheaply cloneable. Catalog reads are cached; cart, order, and profile
/// reads never are.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    rest_url: String,
    auth_url: String,
    anon_key: SecretString,
    service_role_key: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("rest_url", &self.inner.rest_url)
            .field("auth_url", &self.inner.auth_url)
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig, catalog_ttl: Duration) -> Result<Self, SupabaseError> {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(catalog_ttl)
            .build();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                http,
                rest_url: format!("{}/rest/v1", config.url),
                auth_url: format!("{}/auth/v1", config.url),
                anon_key: config.anon_key.clone(),
                service_role_key: config.service_role_key.clone(),
                cache,
            }),
        })
    }

    pub(super) fn cache(&self) -> &Cache<CacheKey, CacheValue> {
        &self.inner.cache
    }

    /// Drop every cached catalog entry.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Check the REST endpoint answers with our key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or rejects the key.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), SupabaseError> {
        let url = Url::parse(&format!("{}/", self.inner.rest_url))?;
        let request = self.authorize(self.inner.http.get(url), Credential::Anon)?;
        self.send(request).await.map(|_| ())
    }

    // =========================================================================
    // Generic table operations
    // =========================================================================

    /// Select rows from `table`.
    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        credential: Credential<'_>,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = self.table_url(table, query)?;
        let request = self.authorize(self.inner.http.get(url), credential)?;
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Select exactly one row, or `NotFound`.
    pub(crate) async fn select_one<T: DeserializeOwned>(
        &self,
        credential: Credential<'_>,
        table: &str,
        query: &Query,
        what: impl Into<String>,
    ) -> Result<T, SupabaseError> {
        self.select(credential, table, &query.clone().limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound(what.into()))
    }

    /// Insert rows and return them as stored.
    pub(crate) async fn insert<B, T>(
        &self,
        credential: Credential<'_>,
        table: &str,
        rows: &B,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.table_url(table, &Query::new())?;
        let request = self
            .authorize(self.inner.http.post(url), credential)?
            .header("Prefer", "return=representation")
            .json(rows);
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Insert rows, silently skipping ones that hit the `on_conflict` target.
    pub(crate) async fn insert_ignoring_duplicates<B, T>(
        &self,
        credential: Credential<'_>,
        table: &str,
        on_conflict: &str,
        rows: &B,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.table_url(table, &Query::new().on_conflict(on_conflict))?;
        let request = self
            .authorize(self.inner.http.post(url), credential)?
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(rows);
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Update rows matching `query` and return them.
    ///
    /// An empty result means no row matched.
    pub(crate) async fn update<B, T>(
        &self,
        credential: Credential<'_>,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !query.has_filters() {
            return Err(SupabaseError::Rejected(format!(
                "refusing unfiltered update on {table}"
            )));
        }

        let url = self.table_url(table, query)?;
        let request = self
            .authorize(self.inner.http.request(Method::PATCH, url), credential)?
            .header("Prefer", "return=representation")
            .json(patch);
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Delete rows matching `query`.
    pub(crate) async fn delete(
        &self,
        credential: Credential<'_>,
        table: &str,
        query: &Query,
    ) -> Result<(), SupabaseError> {
        if !query.has_filters() {
            return Err(SupabaseError::Rejected(format!(
                "refusing unfiltered delete on {table}"
            )));
        }

        let url = self.table_url(table, query)?;
        let request = self.authorize(self.inner.http.delete(url), credential)?;
        self.send(request).await.map(|_| ())
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    pub(super) fn auth_endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        Ok(Url::parse(&format!("{}/{path}", self.inner.auth_url))?)
    }

    pub(super) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    fn table_url(&self, table: &str, query: &Query) -> Result<Url, SupabaseError> {
        let mut url = Url::parse(&format!("{}/{table}", self.inner.rest_url))?;
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Attach `apikey` and bearer headers for `credential`.
    pub(super) fn authorize(
        &self,
        request: RequestBuilder,
        credential: Credential<'_>,
    ) -> Result<RequestBuilder, SupabaseError> {
        let (apikey, bearer) = match credential {
            Credential::Anon => {
                let key = self.inner.anon_key.expose_secret();
                (key, key)
            }
            Credential::User(token) => (self.inner.anon_key.expose_secret(), token),
            Credential::ServiceRole => {
                let key = self
                    .inner
                    .service_role_key
                    .as_ref()
                    .ok_or(SupabaseError::MissingCredential("SUPABASE_SERVICE_ROLE_KEY"))?
                    .expose_secret();
                (key, key)
            }
        };

        Ok(request
            .header("apikey", apikey)
            .bearer_auth(bearer)
            .header("Accept", "application/json"))
    }

    /// Send a request and return the body of a successful response.
    pub(super) async fn send(&self, request: RequestBuilder) -> Result<String, SupabaseError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(SupabaseError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let error: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = error
            .message()
            .unwrap_or_else(|| body.chars().take(200).collect());

        if status == StatusCode::UNAUTHORIZED {
            debug!(%message, "Backend rejected credentials");
            return Err(SupabaseError::Unauthorized(message));
        }

        tracing::error!(
            status = %status,
            body = %body.chars().take(LOG_BODY_LIMIT).collect::<String>(),
            "Backend returned non-success status"
        );

        Err(SupabaseError::Api {
            status: status.as_u16(),
            code: error.code(),
            message,
        })
    }
}

/// Parse a JSON body, logging a truncated copy on failure.
pub(super) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, SupabaseError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(LOG_BODY_LIMIT).collect::<String>(),
            "Failed to parse backend response"
        );
        SupabaseError::Parse(e)
    })
}
