//! Bikes command - raw bike records at one station.

use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, print_records};

/// Arguments for the bikes command.
#[derive(Args, Debug)]
pub struct BikesArgs {
    /// Station number
    pub station: String,

    /// Print only the number of bikes
    #[arg(short, long)]
    pub count: bool,
}

/// Run the bikes command.
pub async fn run(args: BikesArgs, ctx: &Context) -> Result<()> {
    let client = ctx.connect().await?;
    let bikes = client
        .list_bikes_at_station(&args.station)
        .await
        .with_context(|| format!("failed to list bikes at station {}", args.station))?;
    tracing::info!(station = %args.station, count = bikes.len(), "Bikes fetched");

    if args.count {
        println!("{}", bikes.len());
        return Ok(());
    }
    print_records(&bikes)
}
