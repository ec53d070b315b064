//! Landing page fetch and script fragment discovery.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::error::{AuthError, Result};

/// Landing page that references the application chunks.
pub const DEFAULT_LANDING_PATH: &str = "fr/mapping";

/// Default timeout for page and fragment downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// The page lists its chunks as `<link rel="modulepreload" href="chunk-….js">`.
static CHUNK_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(chunk-[^"]+\.js)""#).expect("valid chunk regex"));

/// Fetches the site's landing page and its script fragments.
#[derive(Debug, Clone)]
pub struct BundleLocator {
    http: reqwest::Client,
    base_url: Url,
    landing_path: String,
    timeout: Duration,
}

impl BundleLocator {
    /// Create a locator for `base_url` (e.g. `https://www.villo.be`).
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AuthError::Discovery(format!("invalid site URL '{}': {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        Ok(Self {
            http,
            base_url,
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Use a different landing page path.
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The normalized site URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fragment paths referenced by the landing page, in order of first
    /// appearance.
    pub async fn fragment_paths(&self) -> Result<Vec<String>> {
        let html = self.fetch(&self.landing_path).await?;
        let fragments = find_fragment_paths(&html);
        if fragments.is_empty() {
            return Err(AuthError::Discovery(format!(
                "no script fragment referenced by {}",
                self.url(&self.landing_path)?
            )));
        }

        tracing::debug!(count = fragments.len(), ?fragments, "Found script fragments");
        Ok(fragments)
    }

    /// Download one fragment's script text.
    pub async fn fetch_fragment(&self, path: &str) -> Result<String> {
        self.fetch(path).await
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AuthError::Discovery(format!("invalid path '{}': {}", path, e)))
    }

    async fn fetch(&self, path: &str) -> Result<String> {
        let url = self.url(path)?;
        tracing::debug!(url = %url, "Downloading");

        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::Discovery(format!("failed to download {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Discovery(format!(
                "failed to download {}: HTTP {}",
                url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Discovery(format!("failed to read {}: {}", url, e)))?;
        tracing::debug!(url = %url, bytes = body.len(), "Downloaded");
        Ok(body)
    }
}

/// Chunk references in page markup, first appearance order, no duplicates.
pub fn find_fragment_paths(html: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for capture in CHUNK_PATH_RE.captures_iter(html) {
        let path = &capture[1];
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}
