//! Environment-sourced configuration for the geocode enrichment pipeline.
//!
//! | Variable               | Default                              |
//! |------------------------|--------------------------------------|
//! | `GEOCODE_MODE`         | `limited`                            |
//! | `GEOCODE_MAX`          | `100`                                |
//! | `GEOCODE_RATE_LIMIT_MS`| `1000`                               |
//! | `NOMINATIM_URL`        | public Nominatim search endpoint     |
//! | `GEOCODE_REGION`       | `Milwaukee, Wisconsin, USA`          |
//! | `CRASH_DB`             | `data/db/crashes.duckdb`             |

use std::path::PathBuf;
use std::time::Duration;

use crash_insights_models::LookupMode;

/// Public Nominatim search endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Region suffix appended to every free-form geocode query.
pub const DEFAULT_REGION_SUFFIX: &str = "Milwaukee, Wisconsin, USA";

/// Default cap on new external lookups per run.
pub const DEFAULT_MAX_NEW_LOOKUPS: usize = 100;

/// Default minimum delay between external lookups (Nominatim allows
/// 1 request per second on the public instance).
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// User agent sent with every geocoding request, as required by the
/// Nominatim usage policy.
pub const USER_AGENT: &str = "crash-insights/0.1 (crash report enrichment pipeline)";

/// Per-request timeout for geocoding calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Geocode enrichment settings, sourced from the environment.
#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    /// Nominatim-compatible search endpoint.
    pub base_url: String,
    /// Region suffix appended to each query.
    pub region_suffix: String,
    /// Lookup policy for this run.
    pub mode: LookupMode,
    /// Cap on new lookups in `limited` mode.
    pub max_new_lookups: usize,
    /// Minimum delay between external lookups.
    pub rate_limit_ms: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            region_suffix: DEFAULT_REGION_SUFFIX.to_string(),
            mode: LookupMode::default(),
            max_new_lookups: DEFAULT_MAX_NEW_LOOKUPS,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
        }
    }
}

impl GeocodeConfig {
    /// Reads the configuration from environment variables, falling back
    /// to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("NOMINATIM_URL")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_URL.to_string()),
            region_suffix: std::env::var("GEOCODE_REGION")
                .unwrap_or_else(|_| DEFAULT_REGION_SUFFIX.to_string()),
            mode: std::env::var("GEOCODE_MODE")
                .map_or_else(|_| LookupMode::default(), |raw| parse_mode(&raw)),
            max_new_lookups: std::env::var("GEOCODE_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_NEW_LOOKUPS),
            rate_limit_ms: std::env::var("GEOCODE_RATE_LIMIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_MS),
        }
    }
}

/// Parses a lookup mode string.
///
/// An unrecognized mode falls back to `limited` with a warning rather
/// than aborting — a typo in `GEOCODE_MODE` should degrade to the safe
/// default (capped lookups), not kill a scheduled run.
#[must_use]
pub fn parse_mode(raw: &str) -> LookupMode {
    raw.trim().parse().unwrap_or_else(|_| {
        log::warn!("Unknown GEOCODE_MODE '{raw}', defaulting to 'limited'");
        LookupMode::Limited
    })
}

/// Returns the crash database path, honoring the `CRASH_DB` override.
#[must_use]
pub fn db_path() -> PathBuf {
    std::env::var("CRASH_DB").map_or_else(
        |_| crash_insights_database::paths::crash_db_path(),
        PathBuf::from,
    )
}

/// Builds the HTTP client used for all geocoding requests.
///
/// Constructed once per run and passed down explicitly so tests can
/// substitute a client pointed at a fake endpoint.
///
/// # Errors
///
/// Returns a [`reqwest::Error`] if the client cannot be built.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}
