//! Nominatim / OpenStreetMap geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance. The caller is responsible for pacing requests;
//! this module only handles the request/response cycle.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use crate::{GeocodeError, GeocodedPoint, retry};

/// Builds the free-form search query for a location, appending the
/// configured region suffix so street-level text resolves inside the
/// right municipality (e.g., `"HOWELL AVE, Milwaukee, Wisconsin, USA"`).
#[must_use]
pub fn build_query(location: &str, region_suffix: &str) -> String {
    if region_suffix.is_empty() {
        location.to_string()
    } else {
        format!("{location}, {region_suffix}")
    }
}

/// Geocodes a free-form query using the Nominatim search endpoint.
///
/// Issues a single GET with `format=jsonv2` and `limit=1`, retrying on
/// transient failures via [`retry::send_json`]. Returns `Ok(None)` when
/// the service finds no match (empty result array).
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request fails after retries or
/// the response cannot be parsed.
#[allow(clippy::future_not_send)]
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    query: &str,
) -> Result<Option<GeocodedPoint>, GeocodeError> {
    let body = retry::send_json(|| {
        client
            .get(base_url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
    })
    .await?;

    parse_response(&body)
}

/// Parses a Nominatim JSON response array.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedPoint>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let longitude = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    Ok(Some(GeocodedPoint {
        latitude,
        longitude,
    }))
}
