//! Stations command - raw station records.

use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, print_records};

/// Arguments for the stations command.
#[derive(Args, Debug)]
pub struct StationsArgs {
    /// Print only the number of stations
    #[arg(short, long)]
    pub count: bool,
}

/// Run the stations command.
pub async fn run(args: StationsArgs, ctx: &Context) -> Result<()> {
    let client = ctx.connect().await?;
    let stations = client
        .list_stations()
        .await
        .context("failed to list stations")?;
    tracing::info!(count = stations.len(), "Stations fetched");

    if args.count {
        println!("{}", stations.len());
        return Ok(());
    }
    print_records(&stations)
}
