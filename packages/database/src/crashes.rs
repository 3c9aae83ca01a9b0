//! Crash fact table schema and queries.
//!
//! The `crashes` table is dropped and recreated on every full load — the
//! CSV is the source of truth and the table is a derived artifact. The
//! geocode cache is deliberately excluded from that drop.

use crash_insights_models::CrashRecord;
use duckdb::Connection;

use crate::DbError;

/// Rows per INSERT transaction chunk.
const INSERT_CHUNK_SIZE: usize = 2000;

/// Timestamp format used for the `crash_datetime` text column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A crash row as stored in the fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashRow {
    /// Unique case identifier.
    pub case_number: String,
    /// Crash timestamp as `YYYY-MM-DD HH:MM:SS` text.
    pub crash_datetime: String,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: i32,
    /// English weekday name.
    pub day_of_week: String,
    /// Hour of day (0-23).
    pub hour_of_day: i32,
    /// Weekend flag (0/1).
    pub is_weekend: i32,
    /// Normalized location text.
    pub crash_location: String,
    /// Latitude, if geocoded.
    pub lat: Option<f64>,
    /// Longitude, if geocoded.
    pub lon: Option<f64>,
}

/// Summary counts for observability after a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Total rows in the fact table.
    pub total: u64,
    /// Distinct case numbers.
    pub distinct_cases: u64,
    /// Rows with both coordinates present.
    pub with_coordinates: u64,
}

/// Drops and recreates the `crashes` fact table.
///
/// # Errors
///
/// Returns [`DbError`] if schema creation fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS crashes;
         CREATE TABLE crashes (
            case_number    TEXT PRIMARY KEY,
            crash_datetime TEXT,
            year           INTEGER,
            month          INTEGER,
            day_of_week    TEXT,
            hour_of_day    INTEGER,
            is_weekend     INTEGER,
            crash_location TEXT,
            lat            DOUBLE,
            lon            DOUBLE
         );",
    )?;
    Ok(())
}

/// Inserts crash records in transaction chunks.
///
/// Records are expected to be deduplicated by case number already; a
/// duplicate key is a pipeline bug and surfaces as a constraint error.
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails. Store write failures are
/// fatal to the run — there is no partial-write recovery.
pub fn insert_crashes(conn: &Connection, records: &[CrashRecord]) -> Result<u64, DbError> {
    let mut total = 0u64;

    for chunk in records.chunks(INSERT_CHUNK_SIZE) {
        conn.execute_batch("BEGIN TRANSACTION")?;

        let mut stmt = conn.prepare(
            "INSERT INTO crashes (case_number, crash_datetime, year, month, day_of_week,
                                  hour_of_day, is_weekend, crash_location, lat, lon)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;

        for record in chunk {
            stmt.execute(duckdb::params![
                record.case_number,
                record.crash_datetime.format(DATETIME_FORMAT).to_string(),
                record.year(),
                record.month(),
                record.day_of_week(),
                record.hour_of_day(),
                i32::from(record.is_weekend()),
                record.crash_location,
                record.lat,
                record.lon,
            ])?;
            total += 1;
        }

        conn.execute_batch("COMMIT")?;
    }

    log::debug!("Inserted {total} crash rows");
    Ok(total)
}

/// Queries crash rows, newest first, with an optional row limit.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn query_crashes(conn: &Connection, limit: Option<u64>) -> Result<Vec<CrashRow>, DbError> {
    let sql = limit.map_or_else(
        || {
            "SELECT case_number, crash_datetime, year, month, day_of_week, hour_of_day,
                    is_weekend, crash_location, lat, lon
             FROM crashes ORDER BY crash_datetime DESC"
                .to_string()
        },
        |n| {
            format!(
                "SELECT case_number, crash_datetime, year, month, day_of_week, hour_of_day,
                        is_weekend, crash_location, lat, lon
                 FROM crashes ORDER BY crash_datetime DESC LIMIT {n}"
            )
        },
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut results = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        results.push(CrashRow {
            case_number: row.get(0)?,
            crash_datetime: row.get(1)?,
            year: row.get(2)?,
            month: row.get(3)?,
            day_of_week: row.get(4)?,
            hour_of_day: row.get(5)?,
            is_weekend: row.get(6)?,
            crash_location: row.get(7)?,
            lat: row.get(8)?,
            lon: row.get(9)?,
        });
    }

    Ok(results)
}

/// Returns the distinct non-empty location strings in the fact table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn distinct_locations(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT crash_location FROM crashes
         WHERE crash_location IS NOT NULL AND crash_location != ''
         ORDER BY crash_location",
    )?;

    let mut locations = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        locations.push(row.get(0)?);
    }

    Ok(locations)
}

/// Copies coordinates from the geocode cache onto matching crash rows.
///
/// Left-join semantics: rows whose location has no successful cache entry
/// keep null coordinates. Returns the number of rows updated.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub fn apply_cached_coordinates(conn: &Connection) -> Result<u64, DbError> {
    let updated = conn.execute(
        "UPDATE crashes
         SET lat = c.latitude, lon = c.longitude
         FROM geocode_cache c
         WHERE crashes.crash_location = c.crash_location
           AND c.latitude IS NOT NULL AND c.longitude IS NOT NULL",
        [],
    )?;

    log::debug!("Applied cached coordinates to {updated} crash rows");
    Ok(updated as u64)
}

/// Returns summary counts over the fact table.
///
/// # Errors
///
/// Returns [`DbError`] if a count query fails.
pub fn stats(conn: &Connection) -> Result<LoadStats, DbError> {
    let total: u64 = conn.query_row("SELECT COUNT(*) FROM crashes", [], |row| row.get(0))?;
    let distinct_cases: u64 = conn.query_row(
        "SELECT COUNT(DISTINCT case_number) FROM crashes",
        [],
        |row| row.get(0),
    )?;
    let with_coordinates: u64 = conn.query_row(
        "SELECT COUNT(*) FROM crashes WHERE lat IS NOT NULL AND lon IS NOT NULL",
        [],
        |row| row.get(0),
    )?;

    Ok(LoadStats {
        total,
        distinct_cases,
        with_coordinates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode_cache;
    use chrono::NaiveDate;

    fn record(case: &str, day: u32, hour: u32, location: &str) -> CrashRecord {
        let dt = NaiveDate::from_ymd_opt(2023, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        CrashRecord::new(case, dt, location)
    }

    fn conn_with_schema() -> Connection {
        let conn = crate::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn inserts_and_queries_rows_newest_first() {
        let conn = conn_with_schema();
        let records = vec![
            record("CASE001", 1, 8, "HOWELL AVE"),
            record("CASE002", 2, 9, "N 27TH ST"),
        ];
        assert_eq!(insert_crashes(&conn, &records).unwrap(), 2);

        let rows = query_crashes(&conn, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].case_number, "CASE002");
        assert_eq!(rows[0].crash_datetime, "2023-05-02 09:00:00");
        assert_eq!(rows[0].hour_of_day, 9);
        assert_eq!(rows[0].is_weekend, 0);
        assert_eq!(rows[0].lat, None);

        let limited = query_crashes(&conn, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn distinct_locations_deduplicates() {
        let conn = conn_with_schema();
        let records = vec![
            record("CASE001", 1, 8, "HOWELL AVE"),
            record("CASE002", 2, 9, "HOWELL AVE"),
            record("CASE003", 3, 10, "N 27TH ST"),
        ];
        insert_crashes(&conn, &records).unwrap();

        let locations = distinct_locations(&conn).unwrap();
        assert_eq!(
            locations,
            vec!["HOWELL AVE".to_string(), "N 27TH ST".to_string()]
        );
    }

    #[test]
    fn applies_cached_coordinates_with_left_join_semantics() {
        let conn = conn_with_schema();
        let records = vec![
            record("CASE001", 1, 8, "HOWELL AVE & LAYTON"),
            record("CASE002", 2, 9, "UNRESOLVED PLACE"),
        ];
        insert_crashes(&conn, &records).unwrap();

        geocode_cache::cache_upsert(
            &conn,
            &[
                ("HOWELL AVE & LAYTON".to_string(), Some(42.95), Some(-87.90)),
                ("UNRESOLVED PLACE".to_string(), None, None),
            ],
        )
        .unwrap();

        let updated = apply_cached_coordinates(&conn).unwrap();
        assert_eq!(updated, 1);

        let rows = query_crashes(&conn, None).unwrap();
        let resolved = rows
            .iter()
            .find(|r| r.case_number == "CASE001")
            .unwrap();
        assert_eq!(resolved.lat, Some(42.95));
        assert_eq!(resolved.lon, Some(-87.90));

        // The unresolved row survives with null coordinates
        let unresolved = rows
            .iter()
            .find(|r| r.case_number == "CASE002")
            .unwrap();
        assert_eq!(unresolved.lat, None);
        assert_eq!(unresolved.lon, None);
    }

    #[test]
    fn stats_counts_rows_and_coordinates() {
        let conn = conn_with_schema();
        let mut with_coords = record("CASE001", 1, 8, "HOWELL AVE");
        with_coords.lat = Some(43.0);
        with_coords.lon = Some(-87.9);
        let records = vec![with_coords, record("CASE002", 2, 9, "N 27TH ST")];
        insert_crashes(&conn, &records).unwrap();

        let stats = stats(&conn).unwrap();
        assert_eq!(
            stats,
            LoadStats {
                total: 2,
                distinct_cases: 2,
                with_coordinates: 1,
            }
        );
    }
}
