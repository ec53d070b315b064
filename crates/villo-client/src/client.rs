//! Main client implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;
use villo_auth::bundle::{DEFAULT_LANDING_PATH, DEFAULT_TIMEOUT};
use villo_auth::{
    BundleLocator, DEFAULT_REFRESH_WINDOW_MINS, DiscoveredConfig, DiscoveryOptions, HttpNegotiator,
    RefreshPolicy, Session, TokenCodec, TokenNegotiator,
};

use crate::api::{BikesApi, StationsApi};
use crate::error::{Error, Result};

/// Longest slice of an error body kept in [`Error::ApiCall`].
const ERROR_BODY_LIMIT: usize = 512;

/// Authenticated client for the station and bike endpoints.
///
/// Cloning is cheap; clones share the session, so a refresh triggered
/// through one clone is seen by all of them.
///
/// # Example
///
/// ```no_run
/// use villo_client::BikeShareClient;
///
/// # async fn example() -> villo_client::Result<()> {
/// let client = BikeShareClient::builder()
///     .base_url("https://www.villo.be")
///     .connect()
///     .await?;
///
/// let stations = client.list_stations().await?;
/// let bikes = client.list_bikes_at_station("34").await?;
/// println!("{} stations, {} bikes at 34", stations.len(), bikes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BikeShareClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) discovered: DiscoveredConfig,
    /// Guards the refresh decision and the header read as one step.
    pub(crate) session: Mutex<Session>,
    pub(crate) negotiator: Arc<dyn TokenNegotiator>,
    pub(crate) timeout: Duration,
}

impl fmt::Debug for BikeShareClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BikeShareClient")
            .field("discovered", &self.inner.discovered)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl BikeShareClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Assemble a client from already discovered parts.
    pub fn from_parts(
        http: reqwest::Client,
        discovered: DiscoveredConfig,
        session: Session,
        negotiator: Arc<dyn TokenNegotiator>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                discovered,
                session: Mutex::new(session),
                negotiator,
                timeout: DEFAULT_TIMEOUT,
            }),
        }
    }

    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }

    /// Configuration recovered from the site bundle.
    pub fn discovered(&self) -> &DiscoveredConfig {
        &self.inner.discovered
    }

    /// Current access token expiry.
    pub async fn session_expires_at(&self) -> Result<DateTime<Utc>> {
        Ok(self.inner.session.lock().await.expires_at()?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the stations API.
    pub fn stations(&self) -> StationsApi {
        StationsApi::new(self.clone())
    }

    /// Access the bikes API.
    pub fn bikes(&self) -> BikesApi {
        BikesApi::new(self.clone())
    }

    /// Raw station records for the discovered contract.
    pub async fn list_stations(&self) -> Result<Vec<Value>> {
        self.stations().list().await
    }

    /// Raw bike records currently docked at `station_number`.
    pub async fn list_bikes_at_station(&self, station_number: impl fmt::Display) -> Result<Vec<Value>> {
        self.bikes().at_station(station_number).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// `Authorization` header value, refreshing the session if needed.
    pub(crate) async fn authorization(&self) -> Result<String> {
        let mut session = self.inner.session.lock().await;
        session
            .authorization_header_value(self.inner.negotiator.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!(kind = e.kind(), error = %e, "Could not produce authorization header");
                Error::Auth(e)
            })
    }

    /// Auth host of the current session.
    pub(crate) async fn auth_host(&self) -> String {
        self.inner.session.lock().await.auth_host().to_string()
    }

    /// Authenticated GET returning a JSON array of opaque records.
    pub(crate) async fn get_records<Q>(
        &self,
        url: Url,
        query: &Q,
        extra_headers: HeaderMap,
    ) -> Result<Vec<Value>>
    where
        Q: serde::Serialize + ?Sized,
    {
        let authorization = HeaderValue::from_str(&self.authorization().await?)
            .map_err(|e| Error::api_call(&url, None, format!("invalid authorization header: {}", e)))?;

        tracing::debug!(url = %url, "GETing");
        let response = self
            .inner
            .http
            .get(url.clone())
            .query(query)
            .headers(extra_headers)
            .header(AUTHORIZATION, authorization)
            .timeout(self.inner.timeout)
            .send()
            .await
            .map_err(|e| Error::api_call(&url, None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::api_call(&url, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(Error::api_call(
                &url,
                Some(status.as_u16()),
                format!("HTTP {}: {}", status, truncate(&body, ERROR_BODY_LIMIT)),
            ));
        }

        let records: Vec<Value> = serde_json::from_str(&body).map_err(|e| {
            Error::api_call(&url, Some(status.as_u16()), format!("body is not a JSON array: {}", e))
        })?;
        tracing::debug!(url = %url, count = records.len(), "Response received");
        Ok(records)
    }

    /// `Accept` header for the versioned bikes API.
    pub(crate) fn accept(media_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(media_type));
        headers
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Builder for creating a [`BikeShareClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    landing_path: String,
    timeout: Duration,
    user_agent: Option<String>,
    refresh_policy: RefreshPolicy,
    refresh_window: TimeDelta,
    discovery: DiscoveryOptions,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            refresh_policy: RefreshPolicy::default(),
            refresh_window: TimeDelta::minutes(DEFAULT_REFRESH_WINDOW_MINS),
            discovery: DiscoveryOptions::default(),
        }
    }

    /// Set the operator site URL (e.g. `https://www.villo.be`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the landing page that references the script fragments.
    pub fn landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the staleness rule.
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Set the staleness window.
    pub fn refresh_window(mut self, window: TimeDelta) -> Self {
        self.refresh_window = window;
        self
    }

    /// Search other fragments for `contract`/`stations` when the `oAuth`
    /// fragment lacks them.
    pub fn endpoint_fallback(mut self, enabled: bool) -> Self {
        self.discovery.endpoint_fallback = enabled;
        self
    }

    /// Discover the site configuration, obtain a session and build the
    /// client.
    pub async fn connect(self) -> Result<BikeShareClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("villo-client/{}", env!("CARGO_PKG_VERSION")));
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let locator = BundleLocator::new(http.clone(), &base_url)?
            .with_landing_path(self.landing_path)
            .with_timeout(self.timeout);
        let discovered = villo_auth::discover(&locator, self.discovery).await?;

        let negotiator: Arc<dyn TokenNegotiator> =
            Arc::new(HttpNegotiator::new(http.clone()).with_timeout(self.timeout));
        let session = Session::establish(
            negotiator.as_ref(),
            &discovered.client,
            Arc::new(TokenCodec::new()),
        )
        .await?
        .with_refresh_policy(self.refresh_policy, self.refresh_window);

        Ok(BikeShareClient {
            inner: Arc::new(ClientInner {
                http,
                discovered,
                session: Mutex::new(session),
                negotiator,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
