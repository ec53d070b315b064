//! CLI command handlers.

pub mod bikes;
pub mod discover;
pub mod stations;
pub mod token;

use std::str::FromStr;

use anyhow::{Context as _, Result, anyhow};
use chrono::TimeDelta;
use villo_auth::RefreshPolicy;
use villo_client::{BikeShareClient, ClientBuilder};
use villo_config::VilloConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged file configuration.
    pub config: VilloConfig,
    /// `--site` override.
    pub site: Option<String>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Site URL after applying the CLI override.
    pub fn base_url(&self) -> String {
        self.site.clone().unwrap_or_else(|| self.config.base_url())
    }

    /// Client builder from the merged configuration.
    pub fn builder(&self) -> Result<ClientBuilder> {
        let config = &self.config;
        let window_mins = config.refresh_window_mins()?;
        let window = TimeDelta::try_minutes(window_mins).ok_or_else(|| {
            anyhow!("session.refresh_window_mins out of range: {}", window_mins)
        })?;
        let mut builder = BikeShareClient::builder()
            .base_url(self.base_url())
            .landing_path(config.landing_path())
            .timeout(config.timeout()?)
            .refresh_window(window)
            .endpoint_fallback(config.endpoint_fallback());

        if let Some(agent) = config.user_agent() {
            builder = builder.user_agent(agent);
        }
        if let Some(name) = config.refresh_policy() {
            let policy = RefreshPolicy::from_str(name)
                .map_err(|e| anyhow!(e))
                .context("invalid session.refresh_policy")?;
            builder = builder.refresh_policy(policy);
        }
        Ok(builder)
    }

    /// Discover, authenticate and return a ready client.
    pub async fn connect(&self) -> Result<BikeShareClient> {
        let base_url = self.base_url();
        self.builder()?
            .connect()
            .await
            .with_context(|| format!("failed to connect to {}", base_url))
    }
}

/// Print raw records as pretty JSON.
pub(crate) fn print_records(records: &[serde_json::Value]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}
