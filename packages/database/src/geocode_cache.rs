//! Geocoding result cache.
//!
//! Caches both successful geocodes (with coordinates) and confirmed
//! failures (null coordinates) keyed by normalized location text, so the
//! same location is never sent to the external geocoder twice. Entries
//! are never deleted; a re-lookup overwrites the existing row.

use std::collections::BTreeMap;

use duckdb::Connection;

use crate::DbError;

/// A cache row: `(crash_location, lat, lon)`. Null coordinates record a
/// lookup that was attempted and found nothing.
pub type CacheEntry = (String, Option<f64>, Option<f64>);

/// Keys per `IN (...)` chunk, kept safely under the parameter-count
/// ceilings of SQLite-family engines so the batching strategy transfers
/// unchanged across store backends.
const LOOKUP_BATCH_SIZE: usize = 900;

/// Creates the `geocode_cache` table if it does not exist.
///
/// Unlike the `crashes` fact table this is never dropped — the cache is
/// the cross-run memory of the pipeline.
///
/// # Errors
///
/// Returns [`DbError`] if schema creation fails.
pub fn ensure_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS geocode_cache (
            crash_location TEXT PRIMARY KEY,
            latitude       DOUBLE,
            longitude      DOUBLE,
            ts             TEXT
        );",
    )?;
    Ok(())
}

/// Looks up cached geocoding results for the given location keys.
///
/// Queries in chunks of [`LOOKUP_BATCH_SIZE`] keys and merges the results
/// into a single map. Only locations present in the cache appear in the
/// result; a mapped `(None, None)` means the location was looked up
/// before and confirmed unresolvable.
///
/// # Errors
///
/// Returns [`DbError`] if a chunk query fails.
pub fn cache_lookup(
    conn: &Connection,
    locations: &[String],
) -> Result<BTreeMap<String, (Option<f64>, Option<f64>)>, DbError> {
    let mut found: BTreeMap<String, (Option<f64>, Option<f64>)> = BTreeMap::new();

    if locations.is_empty() {
        return Ok(found);
    }

    for chunk in locations.chunks(LOOKUP_BATCH_SIZE) {
        let placeholders: String = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT crash_location, latitude, longitude \
             FROM geocode_cache WHERE crash_location IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;

        for (i, key) in chunk.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, key)?;
        }

        stmt.raw_execute()?;
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let lat: Option<f64> = row.get(1)?;
            let lon: Option<f64> = row.get(2)?;
            found.insert(key, (lat, lon));
        }
    }

    Ok(found)
}

/// Upserts geocoding results (both hits and misses) into the cache,
/// stamping each row with the current UTC time.
///
/// Keyed by location: a second write for the same location replaces the
/// first. Safe to call with an empty list (no-op).
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn cache_upsert(conn: &Connection, entries: &[CacheEntry]) -> Result<(), DbError> {
    if entries.is_empty() {
        return Ok(());
    }

    let ts = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO geocode_cache (crash_location, latitude, longitude, ts)
         VALUES (?, ?, ?, ?)",
    )?;

    for (key, lat, lon) in entries {
        stmt.execute(duckdb::params![key, lat, lon, ts])?;
    }

    Ok(())
}

/// Reads the entire cache for the merge step.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn read_all(conn: &Connection) -> Result<Vec<CacheEntry>, DbError> {
    let mut stmt = conn.prepare("SELECT crash_location, latitude, longitude FROM geocode_cache")?;

    let mut entries = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let lat: Option<f64> = row.get(1)?;
        let lon: Option<f64> = row.get(2)?;
        entries.push((key, lat, lon));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        crate::open_in_memory().unwrap()
    }

    #[test]
    fn lookup_on_empty_cache_returns_nothing() {
        let conn = conn();
        let found = cache_lookup(&conn, &["HOWELL AVE".to_string()]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn lookup_results_are_subset_of_input() {
        let conn = conn();
        cache_upsert(
            &conn,
            &[
                ("HOWELL AVE".to_string(), Some(42.95), Some(-87.90)),
                ("N 27TH ST".to_string(), None, None),
            ],
        )
        .unwrap();

        let keys = vec![
            "HOWELL AVE".to_string(),
            "UNSEEN LOCATION".to_string(),
            "N 27TH ST".to_string(),
        ];
        let found = cache_lookup(&conn, &keys).unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["HOWELL AVE"], (Some(42.95), Some(-87.90)));
        // Failed lookups are present with null coordinates
        assert_eq!(found["N 27TH ST"], (None, None));
        assert!(!found.contains_key("UNSEEN LOCATION"));
    }

    #[test]
    fn upsert_twice_keeps_one_entry_with_second_coordinates() {
        let conn = conn();
        cache_upsert(&conn, &[("HOWELL AVE".to_string(), None, None)]).unwrap();
        cache_upsert(
            &conn,
            &[("HOWELL AVE".to_string(), Some(43.0), Some(-87.9))],
        )
        .unwrap();

        let entries = read_all(&conn).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0],
            ("HOWELL AVE".to_string(), Some(43.0), Some(-87.9))
        );
    }

    #[test]
    fn upsert_with_empty_list_is_noop() {
        let conn = conn();
        cache_upsert(&conn, &[]).unwrap();
        assert!(read_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn lookup_spans_multiple_chunks() {
        let conn = conn();
        let entries: Vec<CacheEntry> = (0..LOOKUP_BATCH_SIZE + 10)
            .map(|i| (format!("LOC {i}"), Some(43.0), Some(-87.9)))
            .collect();
        cache_upsert(&conn, &entries).unwrap();

        let keys: Vec<String> = entries.iter().map(|(k, _, _)| k.clone()).collect();
        let found = cache_lookup(&conn, &keys).unwrap();
        assert_eq!(found.len(), LOOKUP_BATCH_SIZE + 10);
    }
}
