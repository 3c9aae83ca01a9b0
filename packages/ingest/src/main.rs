#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crash data ingestion tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crash_insights_ingest::{config, run_geocode, run_load};

#[derive(Parser)]
#[command(name = "crash_insights_ingest", about = "Crash data ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a crash-report CSV: normalize, deduplicate, geocode, and
    /// write the fact table
    Load {
        /// Path to the crash-report CSV
        csv: PathBuf,
        /// Maximum number of raw rows to read (for testing)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Re-run geocode enrichment against the already-loaded crash table
    Geocode,
    /// Print row counts for the loaded crash table
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Load { csv, limit } => {
            let geocode_config = config::GeocodeConfig::from_env();
            log::info!(
                "Geocode mode: {} (max {} new lookups)",
                geocode_config.mode,
                geocode_config.max_new_lookups
            );
            let conn = crash_insights_database::open(&config::db_path())?;
            let client = config::build_client()?;
            run_load(&conn, &client, &geocode_config, &csv, limit).await?;
        }
        Commands::Geocode => {
            let geocode_config = config::GeocodeConfig::from_env();
            let conn = crash_insights_database::open(&config::db_path())?;
            let client = config::build_client()?;
            run_geocode(&conn, &client, &geocode_config).await?;
        }
        Commands::Stats => {
            let conn = crash_insights_database::open(&config::db_path())?;
            let stats = crash_insights_database::crashes::stats(&conn)?;
            println!("Rows:                 {}", stats.total);
            println!("Distinct cases:       {}", stats.distinct_cases);
            println!("With coordinates:     {}", stats.with_coordinates);
        }
    }

    Ok(())
}
