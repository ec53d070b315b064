//! Discover command - shows what the site bundle exposes.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use villo_auth::{DiscoveredConfig, redact};

use super::Context;

/// Arguments for the discover command.
#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Output as JSON (secrets stay redacted)
    #[arg(long)]
    pub json: bool,
}

/// Discovery report for JSON output.
#[derive(Debug, Serialize)]
struct DiscoverOutput {
    site: String,
    fragment: String,
    auth_host: String,
    env: String,
    client_code: String,
    client_key: String,
    contract: Option<String>,
    stations_url: Option<String>,
    stations_api_key: Option<String>,
    session_expires_at: String,
}

impl DiscoverOutput {
    fn new(site: String, discovered: &DiscoveredConfig, expires_at: String) -> Self {
        Self {
            site,
            fragment: discovered.fragment.clone(),
            auth_host: discovered.client.auth_host.clone(),
            env: discovered.client.env.clone(),
            client_code: discovered.client.client_code.clone(),
            client_key: redact(&discovered.client.client_key),
            contract: discovered.contract.as_ref().map(|c| c.name.clone()),
            stations_url: discovered.stations.as_ref().map(|s| s.url.clone()),
            stations_api_key: discovered.stations.as_ref().map(|s| redact(&s.api_key)),
            session_expires_at: expires_at,
        }
    }
}

/// Run the discover command.
pub async fn run(args: DiscoverArgs, ctx: &Context) -> Result<()> {
    let client = ctx.connect().await?;
    let expires_at = client.session_expires_at().await?.to_rfc3339();
    let output = DiscoverOutput::new(ctx.base_url(), client.discovered(), expires_at);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let missing = Style::new().yellow().apply_to("not found").to_string();

    println!();
    println!("{}", style("Site Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Site:"), output.site);
    println!("  {} {}", dim.apply_to("Fragment:"), output.fragment);
    println!("  {} {}", dim.apply_to("Auth host:"), output.auth_host);
    println!("  {} {}", dim.apply_to("Environment:"), output.env);
    println!("  {} {}", dim.apply_to("Client code:"), output.client_code);
    println!("  {} {}", dim.apply_to("Client key:"), output.client_key);
    println!(
        "  {} {}",
        dim.apply_to("Contract:"),
        output.contract.as_deref().unwrap_or(&missing)
    );
    println!(
        "  {} {}",
        dim.apply_to("Stations:"),
        output.stations_url.as_deref().unwrap_or(&missing)
    );
    if ctx.verbose
        && let Some(key) = &output.stations_api_key
    {
        println!("  {} {}", dim.apply_to("Stations key:"), key);
    }
    println!();
    println!(
        "  {} {}",
        dim.apply_to("Session expires:"),
        Style::new().green().apply_to(&output.session_expires_at)
    );
    println!();

    Ok(())
}
