#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` store for the crash insights pipeline.
//!
//! Two tables live in one database file:
//!
//! - `crashes` — the fact table (primary key `case_number`), dropped and
//!   recreated on every full load.
//! - `geocode_cache` — location text → lat/lon, shared across runs and
//!   never dropped, so previously resolved (or failed) lookups are reused.

pub mod crashes;
pub mod geocode_cache;
pub mod paths;

use std::path::Path;

use duckdb::Connection;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("Database error: {0}")]
    Duckdb(#[from] duckdb::Error),

    /// I/O error (e.g., creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens (or creates) the crash database at `path`.
///
/// Ensures the parent directory and the `geocode_cache` table exist. The
/// `crashes` fact table is created separately by
/// [`crashes::create_schema`] because a full load drops it first.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    geocode_cache::ensure_schema(&conn)?;
    Ok(conn)
}

/// Opens an in-memory database with the cache schema, for tests and dry
/// runs.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    geocode_cache::ensure_schema(&conn)?;
    Ok(conn)
}
