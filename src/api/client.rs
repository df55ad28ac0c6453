//! Insight API client implementation.
//!
//! This module provides the transport layer for the Insight REST API. It
//! handles authentication, rate limiting, bounded request concurrency,
//! response caching, error mapping and retry logic. The resource operations
//! themselves live in `endpoints.rs`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, multipart, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::pagination::{Paginator, DEFAULT_PAGE_CONCURRENCY};
use super::rate_limit::RateLimiter;
use super::types::{ObjectCollection, ObjectPage, ObjectSchema, WorkspaceList};
use crate::cache::{cache_key, CacheStats, ResponseCache, DEFAULT_CACHE_TTL_SECS};
use crate::config::{Profile, Settings};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 75;

/// Default maximum attempts for transient failures.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries in milliseconds.
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Idle connections kept per host.
const MAX_IDLE_CONNECTIONS: usize = 20;

/// How long an idle connection is kept alive.
const KEEPALIVE_SECS: u64 = 60;

/// Backoff stops doubling after this many retries.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// API root on Data Center / Server instances.
pub const DATA_CENTER_API_ROOT: &str = "rest/insight/1.0";

/// Gateway for Assets on Atlassian Cloud.
pub const CLOUD_API_URL: &str = "https://api.atlassian.com";

/// Workspace discovery endpoint on cloud sites.
const WORKSPACE_PATH: &str = "rest/servicedeskapi/insight/workspace";

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// The request has no side effects beyond its first delivery.
    Always,
    /// The server may already have applied the request, so it is only resent
    /// when the server refused it with 429.
    RefusedOnly,
}

impl Replay {
    fn for_method(method: &Method) -> Self {
        if method.is_idempotent() {
            Replay::Always
        } else {
            Replay::RefusedOnly
        }
    }
}

/// Options controlling how a client talks to the API.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub verify_ssl: bool,
    /// Maximum number of requests in flight at once.
    pub max_concurrent_requests: usize,
    /// Requests allowed per `rate_limit_interval`.
    pub rate_limit_tokens: u32,
    pub rate_limit_interval: Duration,
    /// Maximum attempts per request, including the first.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Zero disables the response cache.
    pub cache_ttl: Duration,
    /// Pages fetched at once by `iql_all` and friends.
    pub page_concurrency: usize,
    /// Whether the site is Atlassian Cloud.
    pub cloud: bool,
    /// Gateway used after cloud workspace discovery.
    pub cloud_api_url: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_ssl: true,
            max_concurrent_requests: 20,
            rate_limit_tokens: 10,
            rate_limit_interval: Duration::from_secs(1),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            cloud: false,
            cloud_api_url: CLOUD_API_URL.to_string(),
        }
    }
}

impl ClientOptions {
    /// Build options from the configured settings and a profile.
    pub fn from_config(settings: &Settings, profile: &Profile) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            verify_ssl: profile.verify_ssl,
            max_concurrent_requests: settings.max_concurrent_requests,
            rate_limit_tokens: settings.rate_limit_tokens,
            rate_limit_interval: Duration::from_secs(settings.rate_limit_interval_secs),
            max_retries: settings.max_retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            page_concurrency: settings.page_concurrency,
            cloud: profile.cloud,
            ..Self::default()
        }
    }
}

/// The Insight API client.
///
/// Cheap to clone: clones share the connection pool, rate limiter,
/// concurrency limit and response cache.
#[derive(Debug, Clone)]
pub struct InsightClient {
    /// The HTTP client.
    client: Client,
    /// The Jira site URL the client was created for.
    site_url: String,
    /// Host that serves the Insight API (the site, or the cloud gateway).
    base_url: String,
    /// Path prefix of every Insight resource.
    api_root: String,
    /// Authentication credentials.
    auth: Auth,
    rate_limiter: Arc<RateLimiter>,
    /// Bounds the number of requests in flight.
    permits: Arc<Semaphore>,
    cache: Arc<ResponseCache>,
    max_retries: u32,
    retry_base_delay: Duration,
    page_concurrency: usize,
    cloud: bool,
    cloud_api_url: String,
    workspace_id: Option<String>,
}

impl InsightClient {
    /// Create a client from a profile and validate the connection.
    ///
    /// Resolves the secret via [`Auth::from_profile`], discovers the cloud
    /// workspace for cloud profiles, and lists the object schemas to verify
    /// the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No secret is available for the profile
    /// - The HTTP client cannot be built
    /// - Workspace discovery or connection validation fails
    #[instrument(skip(profile, settings), fields(profile_name = %profile.name))]
    pub async fn new(profile: &Profile, settings: &Settings) -> Result<Self> {
        info!("Creating Insight client for profile");

        let auth = Auth::from_profile(profile)?;
        let options = ClientOptions::from_config(settings, profile);
        let mut client = Self::with_auth(&profile.url, auth, options)?;

        client.initialize().await?;
        client.validate_connection().await?;

        info!("Insight client created and connection validated");
        Ok(client)
    }

    /// Create a client with explicit credentials.
    ///
    /// Does NOT validate the connection, and cloud clients still need
    /// [`InsightClient::initialize`] before use.
    pub fn with_auth(site_url: &str, auth: Auth, options: ClientOptions) -> Result<Self> {
        if options.max_concurrent_requests == 0 {
            return Err(ApiError::InvalidConfig(
                "max_concurrent_requests must be greater than zero".to_string(),
            ));
        }
        if options.max_retries == 0 {
            return Err(ApiError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }

        let client = Self::build_http_client(&options)?;
        let rate_limiter = RateLimiter::new(options.rate_limit_tokens, options.rate_limit_interval)?;
        let site_url = normalize_base_url(site_url)?;

        Ok(Self {
            client,
            base_url: site_url.clone(),
            site_url,
            api_root: DATA_CENTER_API_ROOT.to_string(),
            auth,
            rate_limiter: Arc::new(rate_limiter),
            permits: Arc::new(Semaphore::new(options.max_concurrent_requests)),
            cache: Arc::new(ResponseCache::new(options.cache_ttl)),
            max_retries: options.max_retries,
            retry_base_delay: options.retry_base_delay,
            page_concurrency: options.page_concurrency.max(1),
            cloud: options.cloud,
            cloud_api_url: options.cloud_api_url.trim_end_matches('/').to_string(),
            workspace_id: None,
        })
    }

    /// Build the HTTP client with appropriate settings.
    fn build_http_client(options: &ClientOptions) -> Result<Client> {
        Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_ssl)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .pool_idle_timeout(Duration::from_secs(KEEPALIVE_SECS))
            .build()
            .map_err(ApiError::Network)
    }

    /// Prepare a cloud client by discovering its Insight workspace.
    ///
    /// Points the client at `{cloud_api_url}/jsm/insight/workspace/{id}/v1`.
    /// A no-op for Data Center clients and for already initialized clients.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<()> {
        if !self.cloud || self.workspace_id.is_some() {
            return Ok(());
        }

        let workspace_id = self
            .workspace_ids()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse("no Insight workspace found".to_string()))?;

        info!(workspace_id = %workspace_id, "Using Insight cloud workspace");
        self.base_url = self.cloud_api_url.clone();
        self.api_root = format!("jsm/insight/workspace/{}/v1", workspace_id);
        self.workspace_id = Some(workspace_id);
        Ok(())
    }

    /// List the Insight workspace IDs of a cloud site.
    pub async fn workspace_ids(&self) -> Result<Vec<String>> {
        let url = join_url(&[&self.site_url, WORKSPACE_PATH]);
        let value = self
            .request(Method::GET, &url, None, Replay::Always)
            .await?;
        let list: WorkspaceList = decode(value)?;
        Ok(list.values.into_iter().map(|w| w.workspace_id).collect())
    }

    /// Validate the connection by listing the object schemas.
    #[instrument(skip(self))]
    pub async fn validate_connection(&self) -> Result<Vec<ObjectSchema>> {
        debug!("Validating Insight connection");

        let schemas = self.get_object_schemas().await.map_err(|e| {
            error!("Connection validation failed: {}", e);
            match e {
                ApiError::Unauthorized | ApiError::Forbidden => e,
                ApiError::Network(_) => ApiError::ConnectionFailed(format!(
                    "Cannot connect to {}: {}",
                    self.base_url, e
                )),
                _ => ApiError::ConnectionFailed(e.to_string()),
            }
        })?;

        info!("Connected, {} object schemas visible", schemas.len());
        Ok(schemas)
    }

    /// Absolute URL of an Insight resource.
    pub fn resource_url(&self, resource: &str) -> String {
        join_url(&[&self.base_url, &self.api_root, resource])
    }

    /// Fail with `Unsupported` on cloud clients.
    pub(super) fn require_data_center(&self) -> Result<()> {
        if self.cloud {
            Err(ApiError::Unsupported("Insight Cloud"))
        } else {
            Ok(())
        }
    }

    /// GET a resource, serving and filling the response cache.
    pub(super) async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        let url = self.resource_url(resource);
        let key = cache_key(&url, params);

        if let Some(cached) = self.cache.get(&key).await {
            return decode(cached);
        }

        // An invalidation while this request is in flight means the body may
        // predate a write, so it is returned but not cached.
        let generation = self.cache.generation().await;
        let value = self
            .request(Method::GET, &with_query(&url, params), None, Replay::Always)
            .await?;
        self.cache
            .insert_if_current(key, value.clone(), generation)
            .await;
        decode(value)
    }

    /// Send a request with a method other than GET.
    ///
    /// POSTs are not resent after server or network errors, since the server
    /// may already have applied them.
    pub(super) async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<T> {
        let url = with_query(&self.resource_url(resource), params);
        let replay = Replay::for_method(&method);
        decode(self.request(method, &url, body, replay).await?)
    }

    /// POST a read-only search. Retried like a GET, but never cached.
    pub(super) async fn search<T: DeserializeOwned>(
        &self,
        resource: &str,
        body: &Value,
    ) -> Result<T> {
        let url = self.resource_url(resource);
        decode(
            self.request(Method::POST, &url, Some(body), Replay::Always)
                .await?,
        )
    }

    /// POST a multipart form. Not retried, since the form is consumed.
    pub(super) async fn send_multipart(&self, resource: &str, form: multipart::Form) -> Result<Value> {
        let url = self.resource_url(resource);
        self.rate_limiter.acquire().await;
        let _permit = self.acquire_permit().await?;

        debug!(url = %url, "Uploading multipart form");
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json")
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Drop cached responses for a resource and its sub-resources.
    pub(super) async fn invalidate(&self, resource: &str) {
        self.cache.invalidate(&self.resource_url(resource)).await;
    }

    /// Fetch every page of an object query with bounded concurrency.
    pub(super) async fn collect_pages<F, Fut>(
        &self,
        max_pages: Option<u32>,
        fetch: F,
    ) -> Result<ObjectCollection>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<ObjectPage>>,
    {
        let mut paginator = Paginator::new(self.page_concurrency);
        if let Some(max) = max_pages {
            paginator = paginator.max_pages(max);
        }
        let pages = paginator.fetch_all(fetch).await?;
        Ok(ObjectCollection::from_pages(pages))
    }

    /// Perform a request with authentication, error handling and retries.
    ///
    /// Rate limiting, server errors and network failures are retried with
    /// exponential backoff, or after the server's `Retry-After` hint.
    #[instrument(skip(self, body), fields(method = %method, url = %url))]
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<Value> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!("Request attempt {}/{}", attempts, self.max_retries);

            match self.execute(method.clone(), url, body).await {
                Ok(value) => return Ok(value),
                Err(e) if Self::is_retryable(&e, replay) && attempts < self.max_retries => {
                    let delay = self.retry_delay(&e, attempts);
                    warn!(
                        "Request failed (attempt {}), retrying in {}ms: {}",
                        attempts,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a single request.
    async fn execute(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        self.rate_limiter.acquire().await;
        let _permit = self.acquire_permit().await?;

        let mut request = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| ApiError::InvalidConfig("request limiter closed".to_string()))
    }

    /// Handle the HTTP response, checking for errors and parsing JSON.
    ///
    /// An empty success body decodes as `null`; a body that is not JSON is
    /// returned as a string.
    async fn handle_response(&self, response: Response) -> Result<Value> {
        let status = response.status();
        let url = response.url().to_string();
        let retry_after = retry_after(response.headers());
        let body = response.text().await?;

        debug!(status = status.as_u16(), url = %url, "HTTP response");

        if status.is_success() {
            if body.trim().is_empty() {
                debug!("Received response with no content");
                return Ok(Value::Null);
            }
            Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
        } else {
            debug!("Error response body: {}", body);
            match Self::error_from_response(status, &url, &body) {
                ApiError::RateLimited(_) => Err(ApiError::RateLimited(retry_after)),
                e => Err(e),
            }
        }
    }

    /// Create an appropriate error from an HTTP response.
    fn error_from_response(status: StatusCode, url: &str, body: &str) -> ApiError {
        let context = error_message(body).unwrap_or_else(|| url.to_string());
        ApiError::from_status(status, &context)
    }

    /// Check if an error is retryable.
    fn is_retryable(error: &ApiError, replay: Replay) -> bool {
        match error {
            ApiError::RateLimited(_) => true,
            ApiError::ServerError(_) => replay == Replay::Always,
            ApiError::Network(e) => replay == Replay::Always && !e.is_builder(),
            _ => false,
        }
    }

    /// Calculate retry delay with exponential backoff.
    fn retry_delay(&self, error: &ApiError, attempt: u32) -> Duration {
        match error {
            ApiError::RateLimited(Some(hint)) => *hint,
            _ => {
                let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
                self.retry_base_delay.saturating_mul(1u32 << exponent)
            }
        }
    }

    /// Get the Jira site URL.
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Get the host serving the Insight API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the Insight API root path.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Get the cloud workspace ID, once initialized.
    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    pub fn is_cloud(&self) -> bool {
        self.cloud
    }

    /// Response cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Clear the response cache.
    pub async fn close(&self) {
        self.cache.clear().await;
    }
}

/// Decode a JSON value into a response type.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

/// Extract a readable message from a Jira error body.
///
/// Understands `errorMessages` arrays and `errors` given as a field map, a
/// `{"message": ...}` object or a list. Falls back to the string fields of
/// the body, which is how the cloud gateway reports errors.
fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let as_text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mut messages: Vec<String> = json
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    match json.get("errors") {
        Some(Value::Object(obj)) => match obj.get("message") {
            Some(message) => messages.push(as_text(message)),
            None => messages.extend(obj.iter().map(|(k, v)| format!("{}: {}", k, as_text(v)))),
        },
        Some(Value::Array(list)) => messages.extend(list.iter().filter_map(|v| match v {
            Value::Object(o) => o.get("message").map(as_text),
            Value::String(s) => Some(s.clone()),
            _ => None,
        })),
        _ => {}
    }

    if messages.is_empty() {
        if let Some(obj) = json.as_object() {
            messages.extend(
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| format!("{}: {}", k, s))),
            );
        }
    }

    messages.retain(|m| !m.is_empty());
    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Join URL segments with single slashes.
fn join_url(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Append URL-encoded query parameters.
fn with_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

/// Normalize the base URL by removing trailing slashes.
///
/// Warns about plain HTTP outside local development.
fn normalize_base_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');

    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ApiError::InvalidUrl(url.to_string()));
    }

    if url.starts_with("http://") && !url.contains("localhost") && !url.contains("127.0.0.1") {
        warn!("URL does not use HTTPS: {}. This is insecure for production use.", url);
    }

    Ok(url.to_string())
}
