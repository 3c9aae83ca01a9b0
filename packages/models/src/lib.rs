#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Core domain types for the crash insights pipeline.
//!
//! Defines the canonical crash record produced by the CSV normalizer,
//! the geocode lookup policy modes, and the cache-key normalization rule
//! shared by the ingest pipeline and the geocode cache.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Normalizes a free-text location string into its geocode cache key.
///
/// The cache key is the trimmed, uppercased location text. Identical
/// source strings always map to the same cache entry, so a location is
/// never geocoded twice across runs.
#[must_use]
pub fn cache_key(location: &str) -> String {
    location.trim().to_uppercase()
}

/// Run-time policy controlling how many new external geocode lookups are
/// permitted in a single pipeline run.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LookupMode {
    /// No network calls; merge whatever the cache already holds.
    CacheOnly,
    /// Look up at most the configured cap of new locations, in list order.
    #[default]
    Limited,
    /// Look up every location missing from the cache.
    All,
}

/// A single normalized crash report.
///
/// Created from one raw CSV row, deduplicated by case number (latest
/// timestamp wins), and immutable afterwards except for the lat/lon
/// merge from the geocode cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Unique case identifier.
    pub case_number: String,
    /// When the crash occurred.
    pub crash_datetime: NaiveDateTime,
    /// Normalized location text (trimmed, uppercased).
    pub crash_location: String,
    /// Latitude, if the location has been geocoded.
    pub lat: Option<f64>,
    /// Longitude, if the location has been geocoded.
    pub lon: Option<f64>,
}

impl CrashRecord {
    /// Creates a record from raw CSV fields, normalizing the location
    /// into cache-key form.
    #[must_use]
    pub fn new(case_number: &str, crash_datetime: NaiveDateTime, location: &str) -> Self {
        Self {
            case_number: case_number.trim().to_string(),
            crash_datetime,
            crash_location: cache_key(location),
            lat: None,
            lon: None,
        }
    }

    /// Calendar year of the crash.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.crash_datetime.year()
    }

    /// Calendar month (1-12).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.crash_datetime.month()
    }

    /// English weekday name (e.g., "Monday").
    #[must_use]
    pub fn day_of_week(&self) -> String {
        self.crash_datetime.format("%A").to_string()
    }

    /// Hour of day (0-23).
    #[must_use]
    pub fn hour_of_day(&self) -> u32 {
        self.crash_datetime.hour()
    }

    /// Weekend flag: 1 for Saturday/Sunday, 0 otherwise.
    #[must_use]
    pub fn is_weekend(&self) -> u8 {
        matches!(
            self.crash_datetime.weekday(),
            Weekday::Sat | Weekday::Sun
        )
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn cache_key_trims_and_uppercases() {
        assert_eq!(cache_key("  howell Ave & Layton "), "HOWELL AVE & LAYTON");
        assert_eq!(cache_key("HOWELL AVE"), "HOWELL AVE");
    }

    #[test]
    fn lookup_mode_parses_snake_case() {
        assert_eq!("cache_only".parse(), Ok(LookupMode::CacheOnly));
        assert_eq!("limited".parse(), Ok(LookupMode::Limited));
        assert_eq!("all".parse(), Ok(LookupMode::All));
        assert!("everything".parse::<LookupMode>().is_err());
    }

    #[test]
    fn lookup_mode_default_is_limited() {
        assert_eq!(LookupMode::default(), LookupMode::Limited);
    }

    #[test]
    fn derives_calendar_fields_for_weekday() {
        // 2023-05-01 was a Monday
        let record = CrashRecord::new("CASE001", dt(2023, 5, 1, 8, 15), "HOWELL AVE");
        assert_eq!(record.year(), 2023);
        assert_eq!(record.month(), 5);
        assert_eq!(record.day_of_week(), "Monday");
        assert_eq!(record.hour_of_day(), 8);
        assert_eq!(record.is_weekend(), 0);
    }

    #[test]
    fn derives_weekend_flag_for_saturday() {
        // 2023-05-06 was a Saturday
        let record = CrashRecord::new("CASE002", dt(2023, 5, 6, 23, 0), "N 27TH ST");
        assert_eq!(record.day_of_week(), "Saturday");
        assert_eq!(record.is_weekend(), 1);
    }

    #[test]
    fn new_normalizes_case_number_and_location() {
        let record = CrashRecord::new(" CASE003 ", dt(2023, 1, 2, 0, 0), " s 1st st ");
        assert_eq!(record.case_number, "CASE003");
        assert_eq!(record.crash_location, "S 1ST ST");
        assert_eq!(record.lat, None);
        assert_eq!(record.lon, None);
    }
}
