//! villo - bike-share station and bike tracker
//!
//! Main entry point for the villo CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{bikes, discover, stations, token};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// villo - query Cyclocity bike-share stations and bikes
#[derive(Parser)]
#[command(name = "villo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Operator site URL (overrides config)
    #[arg(long, global = true, env = "VILLO_SITE")]
    pub site: Option<String>,

    /// User config directory (overrides VILLO_CONFIG_DIR)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover the site configuration and open a session
    Discover(discover::DiscoverArgs),

    /// List stations of the discovered contract
    Stations(stations::StationsArgs),

    /// List bikes docked at a station
    Bikes(bikes::BikesArgs),

    /// Decode an access token offline
    Token(token::TokenArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "villo=debug,villo_auth=debug,villo_client=debug,villo_config=debug,info"
    } else {
        "villo=info,villo_auth=info,villo_client=info,warn"
    };

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(villo_config::xdg_config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "villo.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "villo=trace,villo_auth=trace,villo_client=trace,villo_config=trace,info",
                )),
        )
        .init();

    let loaded = villo_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    for path in loaded.loaded_from() {
        tracing::debug!(path = %path.display(), "Loaded config layer");
    }

    let ctx = commands::Context {
        config: loaded.config,
        site: cli.site,
        verbose: cli.verbose,
    };

    let outcome = match cli.command {
        Commands::Discover(args) => discover::run(args, &ctx).await,
        Commands::Stations(args) => stations::run(args, &ctx).await,
        Commands::Bikes(args) => bikes::run(args, &ctx).await,
        Commands::Token(args) => token::run(args, &ctx).await,
    };

    if let Err(ref e) = outcome {
        tracing::error!(error = format!("{:#}", e), "Command failed");
    }
    outcome
}
