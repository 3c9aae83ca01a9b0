#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the crash database.
//!
//! All paths are relative to the workspace root's `data/` directory.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the default path of the crash `DuckDB` file.
///
/// Holds both the `crashes` fact table and the `geocode_cache` table.
/// Overridable at run time via the `CRASH_DB` environment variable
/// (handled by the ingest configuration, not here).
#[must_use]
pub fn crash_db_path() -> PathBuf {
    data_dir().join("db").join("crashes.duckdb")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
