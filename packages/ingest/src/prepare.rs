//! CSV reading, normalization, and deduplication.
//!
//! Turns the raw municipal crash-report CSV into clean [`CrashRecord`]s:
//! headers are matched case-insensitively, timestamps parsed strictly,
//! rows missing essentials dropped (with logged counts), and duplicate
//! case numbers collapsed to the latest-timestamped row.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use crash_insights_database::crashes::DATETIME_FORMAT;
use crash_insights_models::CrashRecord;

use crate::IngestError;

/// Columns the input CSV must provide (after trim + lowercase).
const REQUIRED_COLUMNS: [&str; 3] = ["casenumber", "casedate", "crashloc"];

/// Reads and prepares crash records from a CSV file.
///
/// `limit` caps the number of raw rows read (for testing on large files).
///
/// # Errors
///
/// Returns [`IngestError::MissingInput`] if the file does not exist, and
/// [`IngestError::MissingColumns`] if a required column is absent. Both
/// are fatal and occur before any store mutation.
pub fn read_and_prepare(path: &Path, limit: Option<usize>) -> Result<Vec<CrashRecord>, IngestError> {
    if !path.exists() {
        return Err(IngestError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let file = std::fs::File::open(path)?;
    let records = prepare_from_reader(file, limit)?;
    log::info!("Prepared {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parses, cleans, and deduplicates crash rows from any CSV reader.
///
/// # Errors
///
/// Returns [`IngestError`] if the CSV cannot be read or a required
/// column is missing. Individual malformed rows are dropped, not fatal.
pub fn prepare_from_reader<R: Read>(
    reader: R,
    limit: Option<usize>,
) -> Result<Vec<CrashRecord>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| (*col).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns { missing });
    }

    let index_of = |name: &str| headers.iter().position(|h| h == name);
    let case_idx = index_of("casenumber").unwrap_or_default();
    let date_idx = index_of("casedate").unwrap_or_default();
    let loc_idx = index_of("crashloc").unwrap_or_default();

    let mut raw_count = 0usize;
    let mut dropped = 0usize;
    // Dedup by case number, keeping the latest-timestamped row. Ties go
    // to the later row in file order.
    let mut by_case: BTreeMap<String, CrashRecord> = BTreeMap::new();

    for result in csv_reader.records() {
        if limit.is_some_and(|l| raw_count >= l) {
            log::info!("Reached row limit ({raw_count}), stopping CSV parse");
            break;
        }
        let row = result?;
        raw_count += 1;

        let case_number = row.get(case_idx).unwrap_or("").trim();
        if case_number.is_empty() {
            dropped += 1;
            continue;
        }

        let raw_date = row.get(date_idx).unwrap_or("").trim();
        let Ok(crash_datetime) = NaiveDateTime::parse_from_str(raw_date, DATETIME_FORMAT) else {
            dropped += 1;
            continue;
        };

        let location = row.get(loc_idx).unwrap_or("");
        let record = CrashRecord::new(case_number, crash_datetime, location);

        match by_case.get(&record.case_number) {
            Some(existing) if existing.crash_datetime > record.crash_datetime => {}
            _ => {
                by_case.insert(record.case_number.clone(), record);
            }
        }
    }

    let duplicates = raw_count - dropped - by_case.len();
    if dropped > 0 {
        log::info!("Dropped {dropped} rows missing case number or with unparseable timestamps");
    }
    if duplicates > 0 {
        log::info!("Collapsed {duplicates} duplicate case numbers (latest timestamp wins)");
    }

    Ok(by_case.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepare(csv: &str) -> Result<Vec<CrashRecord>, IngestError> {
        prepare_from_reader(csv.as_bytes(), None)
    }

    #[test]
    fn deduplicates_by_case_number_keeping_latest() {
        let csv = "casenumber,casedate,crashloc\n\
                   CASE001,2023-05-01 08:15:00,HOWELL AVE\n\
                   CASE001,2023-05-02 09:00:00,HOWELL AVE & LAYTON\n";
        let records = prepare(csv).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.case_number, "CASE001");
        assert_eq!(record.crash_location, "HOWELL AVE & LAYTON");
        assert_eq!(record.hour_of_day(), 9);
        assert_eq!(record.is_weekend(), 0);
        // 2023-05-02 was a Tuesday
        assert_eq!(record.day_of_week(), "Tuesday");
    }

    #[test]
    fn keeps_existing_row_when_duplicate_is_older() {
        let csv = "casenumber,casedate,crashloc\n\
                   CASE001,2023-05-02 09:00:00,HOWELL AVE & LAYTON\n\
                   CASE001,2023-05-01 08:15:00,HOWELL AVE\n";
        let records = prepare(csv).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].crash_location, "HOWELL AVE & LAYTON");
    }

    #[test]
    fn normalizes_headers_and_locations() {
        let csv = " CaseNumber , CASEDATE ,CrashLoc\n\
                   CASE002,2023-05-06 23:30:00,  howell ave \n";
        let records = prepare(csv).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].crash_location, "HOWELL AVE");
        assert_eq!(records[0].is_weekend(), 1);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "casenumber,casedate\nCASE001,2023-05-01 08:15:00\n";
        let err = prepare(csv).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingColumns { ref missing } if missing == &["crashloc".to_string()]
        ));
    }

    #[test]
    fn drops_rows_with_unparseable_timestamps() {
        let csv = "casenumber,casedate,crashloc\n\
                   CASE001,not-a-date,HOWELL AVE\n\
                   CASE002,2023-05-01 08:15:00,N 27TH ST\n";
        let records = prepare(csv).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].case_number, "CASE002");
    }

    #[test]
    fn drops_rows_with_empty_case_number() {
        let csv = "casenumber,casedate,crashloc\n\
                   ,2023-05-01 08:15:00,HOWELL AVE\n\
                   CASE002,2023-05-01 09:00:00,N 27TH ST\n";
        let records = prepare(csv).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].case_number, "CASE002");
    }

    #[test]
    fn missing_input_file_is_fatal_and_names_the_path() {
        let err = read_and_prepare(Path::new("/nonexistent/crashes.csv"), None).unwrap_err();
        assert!(matches!(err, IngestError::MissingInput { .. }));
        assert!(err.to_string().contains("/nonexistent/crashes.csv"));
    }

    #[test]
    fn honors_row_limit() {
        let csv = "casenumber,casedate,crashloc\n\
                   CASE001,2023-05-01 08:15:00,HOWELL AVE\n\
                   CASE002,2023-05-01 09:00:00,N 27TH ST\n\
                   CASE003,2023-05-01 10:00:00,S 1ST ST\n";
        let records = prepare_from_reader(csv.as_bytes(), Some(2)).unwrap();

        assert_eq!(records.len(), 2);
    }
}
