//! HTTP retry helper for transient errors.
//!
//! Geocoding requests should go through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets
//! automatic retry with exponential backoff for transient failures
//! (timeouts, connection resets, rate limiting, server errors).

use std::time::Duration;

use crate::GeocodeError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (1.6s, 3.2s, 6.4s) the total wait before
/// giving up is just over 11 seconds.
const MAX_RETRIES: u32 = 3;

/// Base backoff in milliseconds; doubled on each attempt.
const BACKOFF_BASE_MS: u64 = 800;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Retry behaviour
///
/// Retries up to [`MAX_RETRIES`] times with exponential backoff on
/// connection-level errors, HTTP 429, and HTTP 5xx. Does **not** retry
/// other 4xx statuses — those are permanent.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body is not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, GeocodeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<GeocodeError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_millis(BACKOFF_BASE_MS << attempt);
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    log::warn!("  transient error: {e}");
                    last_error = Some(GeocodeError::Http(e));
                    continue;
                }
                return Err(GeocodeError::Http(e));
            }
        };

        let status = response.status();

        // 429 and 5xx are transient server-side conditions — retry.
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if attempt < MAX_RETRIES {
                log::warn!("  HTTP {status}, retrying");
                last_error = Some(GeocodeError::Status {
                    status: status.as_u16(),
                });
                continue;
            }
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        // Other 4xx are permanent.
        if status.is_client_error() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        return response.json().await.map_err(GeocodeError::Http);
    }

    Err(last_error.unwrap_or(GeocodeError::Parse {
        message: "request failed after all retries".to_string(),
    }))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::GeocodeError;

    /// Serves one canned HTTP response per request on a loopback port,
    /// repeating the last response once the script runs out. Returns the
    /// base URL and the request counter.
    fn spawn_scripted_server(responses: &'static [&'static str]) -> (String, Arc<AtomicUsize>) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 1024];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let i = counter.fetch_add(1, Ordering::SeqCst);
                let response = responses[i.min(responses.len() - 1)];
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (format!("http://{addr}/"), hits)
    }

    const OK_EMPTY_ARRAY: &str = "HTTP/1.1 200 OK\r\n\
         content-type: application/json\r\ncontent-length: 2\r\n\
         connection: close\r\n\r\n[]";
    const TOO_MANY_REQUESTS: &str = "HTTP/1.1 429 Too Many Requests\r\n\
         content-length: 0\r\nconnection: close\r\n\r\n";
    const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\n\
         content-length: 0\r\nconnection: close\r\n\r\n";
    const SERVICE_UNAVAILABLE: &str = "HTTP/1.1 503 Service Unavailable\r\n\
         content-length: 0\r\nconnection: close\r\n\r\n";

    #[tokio::test]
    async fn retries_rate_limited_response_then_succeeds() {
        let (url, hits) = spawn_scripted_server(&[TOO_MANY_REQUESTS, OK_EMPTY_ARRAY]);
        let client = reqwest::Client::new();

        let body = send_json(|| client.get(&url)).await.unwrap();

        assert_eq!(body, serde_json::json!([]));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let (url, hits) = spawn_scripted_server(&[NOT_FOUND]);
        let client = reqwest::Client::new();

        let err = send_json(|| client.get(&url)).await.unwrap_err();

        assert!(matches!(err, GeocodeError::Status { status: 404 }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persistent_server_error_fails_after_all_retries() {
        let (url, hits) = spawn_scripted_server(&[SERVICE_UNAVAILABLE]);
        let client = reqwest::Client::new();

        let err = send_json(|| client.get(&url)).await.unwrap_err();

        assert!(matches!(err, GeocodeError::Status { status: 503 }));
        // Initial attempt plus every retry.
        assert_eq!(hits.load(Ordering::SeqCst), 1 + MAX_RETRIES as usize);
    }
}
