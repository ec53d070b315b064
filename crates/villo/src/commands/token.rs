//! Token command - offline access token inspection.

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use console::{Style, style};
use villo_auth::TokenCodec;

use super::Context;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Access token (three dot-separated segments)
    pub token: String,

    /// Output the decoded header and claims as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the token command.
pub async fn run(args: TokenArgs, _ctx: &Context) -> Result<()> {
    let decoded = TokenCodec::inspect(args.token.trim()).context("failed to decode token")?;
    if !decoded.is_deflated() {
        tracing::warn!(header = %decoded.header, "Token header does not declare DEF compression");
    }
    let expires_at = decoded.expires_at()?;

    if args.json {
        let output = serde_json::json!({
            "header": decoded.header,
            "claims": decoded.claims,
            "expires_at": expires_at.to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let remaining = expires_at - Utc::now();
    let status = if remaining.num_seconds() > 0 {
        Style::new()
            .green()
            .apply_to(format!("valid for {} min", remaining.num_minutes()))
    } else {
        Style::new()
            .red()
            .apply_to(format!("expired {} min ago", -remaining.num_minutes()))
    };

    println!();
    println!("{}", style("Access Token").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Header:"), decoded.header);
    println!("  {}", dim.apply_to("Claims:"));
    println!("{}", serde_json::to_string_pretty(&decoded.claims)?);
    println!();
    println!("  {} {} ({})", dim.apply_to("Expires:"), expires_at.to_rfc3339(), status);
    println!();

    Ok(())
}
