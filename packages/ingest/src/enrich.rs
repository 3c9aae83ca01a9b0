//! Geocode enrichment: cache read → capped lookups → cache write → merge.
//!
//! The cache is the cross-run memory of the pipeline: every lookup
//! attempt is recorded (failures as null coordinates), so a location is
//! resolved externally at most once no matter how many runs it appears
//! in. Lookups are sequential and rate-limited; one failing location
//! never affects the others.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crash_insights_database::geocode_cache::{self, CacheEntry};
use crash_insights_geocoder::nominatim;
use crash_insights_models::{CrashRecord, LookupMode};
use duckdb::Connection;

use crate::IngestError;
use crate::config::GeocodeConfig;

/// Log a progress line every this many external lookups.
const PROGRESS_INTERVAL: usize = 25;

/// Counters describing one enrichment pass, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    /// Distinct locations in the dataset.
    pub unique_locations: usize,
    /// Locations already present in the cache (hits and recorded misses).
    pub cached: usize,
    /// Locations with no cache entry before this run.
    pub missing: usize,
    /// External lookups performed this run.
    pub looked_up: usize,
    /// Lookups that errored (recorded as null, run continued).
    pub failed: usize,
    /// Records that ended up with both coordinates after the merge.
    pub resolved_rows: u64,
}

/// Extracts the distinct non-empty location strings from the records,
/// in order of first appearance.
#[must_use]
pub fn distinct_locations(records: &[CrashRecord]) -> Vec<String> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut locations = Vec::new();
    for record in records {
        if !record.crash_location.is_empty() && seen.insert(&record.crash_location) {
            locations.push(record.crash_location.clone());
        }
    }
    locations
}

/// Applies the lookup policy to the list of uncached locations.
///
/// - `cache_only`: nothing is looked up.
/// - `limited`: the first `cap` locations, in list order — the remainder
///   stays uncached for a future run.
/// - `all`: everything.
#[must_use]
pub fn select_lookups(mode: LookupMode, cap: usize, missing: &[String]) -> Vec<String> {
    match mode {
        LookupMode::CacheOnly => Vec::new(),
        LookupMode::Limited => missing.iter().take(cap).cloned().collect(),
        LookupMode::All => missing.to_vec(),
    }
}

/// Looks up each location sequentially against the external geocoder.
///
/// Enforces the configured inter-request delay, and records every
/// outcome: a match as coordinates, a confirmed no-match or an error as
/// null. Errors are isolated per location — the batch always completes.
/// Returns the cache entries to persist plus the error count.
#[allow(clippy::future_not_send)]
pub async fn lookup_locations(
    client: &reqwest::Client,
    config: &GeocodeConfig,
    to_lookup: &[String],
) -> (Vec<CacheEntry>, usize) {
    let mut entries: Vec<CacheEntry> = Vec::with_capacity(to_lookup.len());
    let mut failed = 0usize;

    for (i, location) in to_lookup.iter().enumerate() {
        tokio::time::sleep(Duration::from_millis(config.rate_limit_ms)).await;

        let query = nominatim::build_query(location, &config.region_suffix);
        match nominatim::geocode_freeform(client, &config.base_url, &query).await {
            Ok(Some(point)) => {
                entries.push((location.clone(), Some(point.latitude), Some(point.longitude)));
            }
            Ok(None) => {
                log::debug!("No match for '{location}'");
                entries.push((location.clone(), None, None));
            }
            Err(e) => {
                log::warn!("Geocode error for '{location}': {e}");
                entries.push((location.clone(), None, None));
                failed += 1;
            }
        }

        let done = i + 1;
        if done % PROGRESS_INTERVAL == 0 || done == to_lookup.len() {
            log::info!("Geocoded {done}/{} locations", to_lookup.len());
        }
    }

    (entries, failed)
}

/// Resolves a set of locations through the cache and the external
/// geocoder, persisting every new outcome.
///
/// This is the incremental-enrichment core: locations already cached
/// (including recorded failures) are skipped; of the rest, the lookup
/// policy decides how many are sent to the network this run.
///
/// # Errors
///
/// Returns [`IngestError`] if a cache read or write fails. External
/// lookup failures are recorded, not propagated.
#[allow(clippy::future_not_send)]
pub async fn resolve_locations(
    conn: &Connection,
    client: &reqwest::Client,
    config: &GeocodeConfig,
    locations: &[String],
) -> Result<EnrichSummary, IngestError> {
    let cached = geocode_cache::cache_lookup(conn, locations)?;
    let missing: Vec<String> = locations
        .iter()
        .filter(|loc| !cached.contains_key(*loc))
        .cloned()
        .collect();

    log::info!(
        "Geocode: {} unique locations | {} cached | {} missing",
        locations.len(),
        cached.len(),
        missing.len()
    );

    let to_lookup = select_lookups(config.mode, config.max_new_lookups, &missing);
    match config.mode {
        LookupMode::CacheOnly => {
            log::info!("cache_only mode: skipping all network lookups");
        }
        LookupMode::Limited if !to_lookup.is_empty() => {
            log::info!(
                "limited mode: looking up {} of {} missing locations this run",
                to_lookup.len(),
                missing.len()
            );
        }
        LookupMode::All if !to_lookup.is_empty() => {
            log::info!("all mode: looking up {} missing locations", to_lookup.len());
        }
        _ => {}
    }

    let (new_entries, failed) = if to_lookup.is_empty() {
        (Vec::new(), 0)
    } else {
        lookup_locations(client, config, &to_lookup).await
    };

    if failed > 0 {
        log::warn!(
            "{failed}/{} lookups failed and were cached as unresolved",
            new_entries.len()
        );
    }

    geocode_cache::cache_upsert(conn, &new_entries)?;

    Ok(EnrichSummary {
        unique_locations: locations.len(),
        cached: cached.len(),
        missing: missing.len(),
        looked_up: new_entries.len(),
        failed,
        resolved_rows: 0,
    })
}

/// Left-joins cached coordinates onto the records by location key.
///
/// Rows whose location was never resolved keep null coordinates — that
/// is expected, not an error. Returns the count of fully-resolved rows.
#[must_use]
pub fn merge_coordinates(
    records: &mut [CrashRecord],
    cache: &BTreeMap<String, (Option<f64>, Option<f64>)>,
) -> u64 {
    let mut resolved = 0u64;
    for record in records.iter_mut() {
        if let Some(&(lat, lon)) = cache.get(&record.crash_location) {
            record.lat = lat;
            record.lon = lon;
        }
        if record.lat.is_some() && record.lon.is_some() {
            resolved += 1;
        }
    }
    resolved
}

/// Runs the full enrichment pass over in-memory records: resolve their
/// distinct locations, then merge the entire cache back onto them.
///
/// # Errors
///
/// Returns [`IngestError`] if cache reads or writes fail.
#[allow(clippy::future_not_send)]
pub async fn enrich_with_coordinates(
    conn: &Connection,
    client: &reqwest::Client,
    config: &GeocodeConfig,
    records: &mut [CrashRecord],
) -> Result<EnrichSummary, IngestError> {
    let locations = distinct_locations(records);
    let mut summary = resolve_locations(conn, client, config, &locations).await?;

    let cache: BTreeMap<String, (Option<f64>, Option<f64>)> = geocode_cache::read_all(conn)?
        .into_iter()
        .map(|(key, lat, lon)| (key, (lat, lon)))
        .collect();

    summary.resolved_rows = merge_coordinates(records, &cache);
    log::info!(
        "Rows with lat/lon after merge: {}/{}",
        summary.resolved_rows,
        records.len()
    );

    Ok(summary)
}
