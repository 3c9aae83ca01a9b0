#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for loading municipal crash-report CSVs into the crash
//! database, with geocode enrichment through a persistent cache.
//!
//! The pipeline: read and normalize the CSV, deduplicate by case number,
//! resolve location coordinates (cache first, then capped rate-limited
//! external lookups), merge coordinates back onto the records, and load
//! the result into the `crashes` fact table.

pub mod config;
pub mod enrich;
pub mod prepare;

use std::path::{Path, PathBuf};
use std::time::Instant;

use crash_insights_database::{DbError, crashes};
use duckdb::Connection;

/// Errors that can occur during ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Input CSV does not exist.
    #[error("Missing input CSV at {}", path.display())]
    MissingInput {
        /// The path that was checked.
        path: PathBuf,
    },

    /// Input CSV lacks required columns.
    #[error("CSV missing expected columns: {missing:?}")]
    MissingColumns {
        /// The absent column names.
        missing: Vec<String>,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store operation failed.
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Runs the full load pipeline: prepare → schema → enrich → insert.
///
/// The `crashes` fact table is dropped and recreated; the geocode cache
/// survives, so coordinates resolved in earlier runs are reused. Fatal
/// input errors (missing file, missing columns) surface before any
/// store mutation.
///
/// # Errors
///
/// Returns [`IngestError`] if reading the CSV or any store operation
/// fails. Per-location geocode failures are recorded, not propagated.
#[allow(clippy::future_not_send)]
pub async fn run_load(
    conn: &Connection,
    client: &reqwest::Client,
    config: &config::GeocodeConfig,
    csv_path: &Path,
    limit: Option<usize>,
) -> Result<crashes::LoadStats, IngestError> {
    let start = Instant::now();

    let mut records = prepare::read_and_prepare(csv_path, limit)?;

    crashes::create_schema(conn)?;
    enrich::enrich_with_coordinates(conn, client, config, &mut records).await?;

    let inserted = crashes::insert_crashes(conn, &records)?;
    let stats = crashes::stats(conn)?;

    log::info!(
        "Load complete: {inserted} inserted | {} distinct case numbers | {} with lat/lon | took {:.1}s",
        stats.distinct_cases,
        stats.with_coordinates,
        start.elapsed().as_secs_f64()
    );

    Ok(stats)
}

/// Re-runs geocode enrichment against the existing crash table.
///
/// Reads the distinct locations already loaded, resolves whatever the
/// lookup policy permits, and copies coordinates from the cache onto the
/// fact table — incremental enrichment across runs without re-ingesting
/// the CSV.
///
/// # Errors
///
/// Returns [`IngestError`] if a store operation fails (including when
/// the crash table has not been loaded yet).
#[allow(clippy::future_not_send)]
pub async fn run_geocode(
    conn: &Connection,
    client: &reqwest::Client,
    config: &config::GeocodeConfig,
) -> Result<crashes::LoadStats, IngestError> {
    let start = Instant::now();

    let locations = crashes::distinct_locations(conn)?;
    enrich::resolve_locations(conn, client, config, &locations).await?;

    let updated = crashes::apply_cached_coordinates(conn)?;
    let stats = crashes::stats(conn)?;

    log::info!(
        "Geocode pass complete: {updated} rows updated | {}/{} with lat/lon | took {:.1}s",
        stats.with_coordinates,
        stats.total,
        start.elapsed().as_secs_f64()
    );

    Ok(stats)
}
