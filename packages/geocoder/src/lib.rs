#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding client for crash location text.
//!
//! Resolves free-form location strings (street addresses, intersections)
//! to WGS84 coordinates via a Nominatim-compatible search endpoint.
//! Requests go through [`retry::send_json`] for automatic retry with
//! exponential backoff on transient failures; the caller enforces the
//! inter-request rate limit (1 req/sec for the public instance).

pub mod nominatim;
pub mod retry;

use thiserror::Error;

/// A resolved coordinate pair (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodedPoint {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-retryable or retry-exhausted status.
    #[error("HTTP status {status}")]
    Status {
        /// The offending status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}
