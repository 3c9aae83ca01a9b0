#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crash insights server.
//!
//! These types are serialized to JSON for the REST API. They are
//! separate from the database row types to allow independent evolution
//! of the API contract.

use crash_insights_database::crashes::{CrashRow, LoadStats};
use serde::{Deserialize, Serialize};

/// A crash row as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCrash {
    /// Unique case identifier.
    pub case_number: String,
    /// Crash timestamp as `YYYY-MM-DD HH:MM:SS`.
    pub crash_datetime: String,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: i32,
    /// English weekday name.
    pub day_of_week: String,
    /// Hour of day (0-23).
    pub hour_of_day: i32,
    /// Whether the crash occurred on a weekend.
    pub is_weekend: bool,
    /// Normalized location text.
    pub crash_location: String,
    /// Latitude, if geocoded.
    pub lat: Option<f64>,
    /// Longitude, if geocoded.
    pub lon: Option<f64>,
}

impl From<CrashRow> for ApiCrash {
    fn from(row: CrashRow) -> Self {
        Self {
            case_number: row.case_number,
            crash_datetime: row.crash_datetime,
            year: row.year,
            month: row.month,
            day_of_week: row.day_of_week,
            hour_of_day: row.hour_of_day,
            is_weekend: row.is_weekend != 0,
            crash_location: row.crash_location,
            lat: row.lat,
            lon: row.lon,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version string.
    pub version: String,
}

/// Summary counts over the crash table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSummary {
    /// Total rows in the fact table.
    pub total: u64,
    /// Distinct case numbers.
    pub distinct_cases: u64,
    /// Rows with both coordinates present.
    pub with_coordinates: u64,
}

impl From<LoadStats> for ApiSummary {
    fn from(stats: LoadStats) -> Self {
        Self {
            total: stats.total,
            distinct_cases: stats.distinct_cases,
            with_coordinates: stats.with_coordinates,
        }
    }
}

/// Query parameters for the crashes endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashQueryParams {
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
}
