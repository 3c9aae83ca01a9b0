//! HTTP handler functions for the crash insights API.

use actix_web::{HttpResponse, web};
use crash_insights_database::crashes;
use crash_insights_server_models::{ApiHealth, ApiSummary, CrashQueryParams};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/crashes`
///
/// Returns crash rows from the TTL-cached read, newest first, optionally
/// limited to the first `limit` rows.
pub async fn crashes(
    state: web::Data<AppState>,
    params: web::Query<CrashQueryParams>,
) -> HttpResponse {
    match state.cached_crashes() {
        Ok(rows) => match params.limit {
            Some(limit) if limit < rows.len() => HttpResponse::Ok().json(&rows[..limit]),
            _ => HttpResponse::Ok().json(rows.as_slice()),
        },
        Err(e) => {
            log::error!("Failed to query crashes: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to query crashes"
            }))
        }
    }
}

/// `GET /api/summary`
///
/// Returns total, distinct-case, and geocoded row counts.
pub async fn summary(state: web::Data<AppState>) -> HttpResponse {
    let stats = {
        let conn = state.pool.acquire();
        crashes::stats(&conn)
    };

    match stats {
        Ok(stats) => HttpResponse::Ok().json(ApiSummary::from(stats)),
        Err(e) => {
            log::error!("Failed to query summary: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to query summary"
            }))
        }
    }
}
