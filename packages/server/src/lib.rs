#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the crash insights dashboard.
//!
//! Serves the crash fact table from the `DuckDB` file produced by the
//! ingest pipeline. Crash reads go through an in-process cache refreshed
//! on a fixed interval, so dashboard polling does not hammer the store.

mod handlers;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crash_insights_database::{DbError, crashes};
use crash_insights_server_models::ApiCrash;

/// How long a cached crash read stays fresh before the next request
/// triggers a re-query.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Simple round-robin pool of read-only `DuckDB` connections.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so each connection is
/// wrapped in a `Mutex`. The pool hands out connections round-robin via
/// an atomic counter, allowing concurrent queries on different
/// connections.
pub struct DuckDbPool {
    connections: Vec<Mutex<duckdb::Connection>>,
    next: AtomicUsize,
}

impl DuckDbPool {
    /// Opens `size` read-only connections to the `DuckDB` file at `path`.
    ///
    /// # Panics
    ///
    /// Panics if any connection fails to open.
    #[must_use]
    pub fn new(path: &Path, size: usize) -> Self {
        let connections = (0..size)
            .map(|_| {
                let conn = duckdb::Connection::open_with_flags(
                    path,
                    duckdb::Config::default()
                        .access_mode(duckdb::AccessMode::ReadOnly)
                        .expect("Failed to set DuckDB access mode"),
                )
                .expect("Failed to open DuckDB connection for pool");
                Mutex::new(conn)
            })
            .collect();
        Self {
            connections,
            next: AtomicUsize::new(0),
        }
    }

    /// Acquires the next connection from the pool (round-robin).
    ///
    /// # Panics
    ///
    /// Panics if the `Mutex` is poisoned.
    pub fn acquire(&self) -> std::sync::MutexGuard<'_, duckdb::Connection> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[idx]
            .lock()
            .expect("DuckDB pool mutex poisoned")
    }
}

/// A crash read snapshot with its fetch time.
struct CachedCrashes {
    fetched_at: Instant,
    rows: Arc<Vec<ApiCrash>>,
}

/// Shared application state.
pub struct AppState {
    /// Pool of read-only connections to the crash database.
    pub pool: Arc<DuckDbPool>,
    /// TTL-cached crash read shared by all requests.
    crash_cache: Mutex<Option<CachedCrashes>>,
}

/// Returns `true` when a snapshot fetched at `fetched_at` has outlived
/// the refresh interval.
fn is_stale(fetched_at: Instant, now: Instant, ttl: Duration) -> bool {
    now.duration_since(fetched_at) >= ttl
}

impl AppState {
    /// Creates state around an open connection pool.
    #[must_use]
    pub fn new(pool: Arc<DuckDbPool>) -> Self {
        Self {
            pool,
            crash_cache: Mutex::new(None),
        }
    }

    /// Returns the cached crash rows, re-querying the store if the
    /// snapshot is older than [`CACHE_TTL`] (or absent).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the refresh query fails.
    ///
    /// # Panics
    ///
    /// Panics if the cache `Mutex` is poisoned.
    pub fn cached_crashes(&self) -> Result<Arc<Vec<ApiCrash>>, DbError> {
        let mut cache = self.crash_cache.lock().expect("crash cache mutex poisoned");

        let now = Instant::now();
        if let Some(cached) = cache.as_ref()
            && !is_stale(cached.fetched_at, now, CACHE_TTL)
        {
            return Ok(Arc::clone(&cached.rows));
        }

        let rows: Vec<ApiCrash> = {
            let conn = self.pool.acquire();
            crashes::query_crashes(&conn, None)?
                .into_iter()
                .map(ApiCrash::from)
                .collect()
        };

        log::debug!("Refreshed crash cache: {} rows", rows.len());
        let rows = Arc::new(rows);
        *cache = Some(CachedCrashes {
            fetched_at: now,
            rows: Arc::clone(&rows),
        });

        Ok(rows)
    }
}

/// Returns the crash database path, honoring the `CRASH_DB` override.
#[must_use]
pub fn db_path() -> PathBuf {
    std::env::var("CRASH_DB").map_or_else(
        |_| crash_insights_database::paths::crash_db_path(),
        PathBuf::from,
    )
}

/// Starts the crash insights API server.
///
/// Opens the read-only connection pool and serves the REST API. This is
/// a regular async function — the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if the crash database cannot be opened.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    use actix_cors::Cors;
    use actix_web::{App, HttpServer, middleware, web};

    let path = db_path();
    log::info!("Opening crash database at {}", path.display());
    let pool = Arc::new(DuckDbPool::new(&path, 4));

    let state = web::Data::new(AppState::new(pool));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/crashes", web::get().to(handlers::crashes))
                    .route("/summary", web::get().to(handlers::summary)),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
