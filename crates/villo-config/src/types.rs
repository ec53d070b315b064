//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [site]
//! preset = "brussels"          # or base_url = "https://www.villo.be"
//! landing_path = "fr/mapping"
//!
//! [http]
//! timeout_secs = 30
//! user_agent = "villo/0.1"
//!
//! [session]
//! refresh_policy = "proactive" # or "lagging"
//! refresh_window_mins = 30
//!
//! [discovery]
//! endpoint_fallback = false
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default staleness window in minutes.
pub const DEFAULT_REFRESH_WINDOW_MINS: i64 = 30;

/// Widest accepted staleness window (one day). Access tokens live for
/// about two hours.
pub const MAX_REFRESH_WINDOW_MINS: i64 = 24 * 60;

/// Default landing page.
pub const DEFAULT_LANDING_PATH: &str = "fr/mapping";

/// Root configuration structure.
///
/// All sections are optional so partial (project-local) files can be
/// layered on top of the user file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VilloConfig {
    pub site: Option<SiteConfig>,
    pub http: Option<HttpConfig>,
    pub session: Option<SessionConfig>,
    pub discovery: Option<DiscoveryConfig>,
}

/// Known operator deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitePreset {
    /// Villo!, Brussels.
    #[default]
    Brussels,
    /// Vélo'v, Lyon.
    Lyon,
}

impl SitePreset {
    pub fn base_url(self) -> &'static str {
        match self {
            SitePreset::Brussels => "https://www.villo.be",
            SitePreset::Lyon => "https://velov.grandlyon.com",
        }
    }
}

/// `[site]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub preset: Option<SitePreset>,
    /// Explicit site URL; wins over `preset`.
    pub base_url: Option<String>,
    pub landing_path: Option<String>,
}

/// `[http]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `proactive` or `lagging`.
    pub refresh_policy: Option<String>,
    pub refresh_window_mins: Option<i64>,
}

/// `[discovery]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub endpoint_fallback: Option<bool>,
}

impl VilloConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: VilloConfig) {
        if other.site.is_some() {
            self.site = other.site;
        }

        if other.http.is_some() {
            self.http = other.http;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.discovery.is_some() {
            self.discovery = other.discovery;
        }
    }

    /// Site URL: explicit `base_url`, else the preset, else Brussels.
    pub fn base_url(&self) -> String {
        let site = self.site.as_ref();
        site.and_then(|s| s.base_url.clone())
            .unwrap_or_else(|| {
                site.and_then(|s| s.preset)
                    .unwrap_or_default()
                    .base_url()
                    .to_string()
            })
    }

    pub fn landing_path(&self) -> String {
        self.site
            .as_ref()
            .and_then(|s| s.landing_path.clone())
            .unwrap_or_else(|| DEFAULT_LANDING_PATH.to_string())
    }

    pub fn timeout(&self) -> Result<Duration> {
        let secs = self
            .http
            .as_ref()
            .and_then(|h| h.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if secs == 0 {
            return Err(ConfigError::Invalid {
                field: "http.timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.http.as_ref().and_then(|h| h.user_agent.as_deref())
    }

    /// Raw policy name; parsed by the session layer.
    pub fn refresh_policy(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.refresh_policy.as_deref())
    }

    pub fn refresh_window_mins(&self) -> Result<i64> {
        let mins = self
            .session
            .as_ref()
            .and_then(|s| s.refresh_window_mins)
            .unwrap_or(DEFAULT_REFRESH_WINDOW_MINS);
        if !(0..=MAX_REFRESH_WINDOW_MINS).contains(&mins) {
            return Err(ConfigError::Invalid {
                field: "session.refresh_window_mins".to_string(),
                message: format!(
                    "must be between 0 and {}, got {}",
                    MAX_REFRESH_WINDOW_MINS, mins
                ),
            });
        }
        Ok(mins)
    }

    pub fn endpoint_fallback(&self) -> bool {
        self.discovery
            .as_ref()
            .and_then(|d| d.endpoint_fallback)
            .unwrap_or(false)
    }
}
