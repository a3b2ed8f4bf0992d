//! Cross-Platform Path Utilities
//!
//! Functions for resolving the engine's data directories across platforms.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the engine data directory (~/.bardin-engine/)
pub fn engine_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".bardin-engine"))
}

/// Get the database file path (~/.bardin-engine/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(engine_dir()?.join("data.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the engine data directory, creating if it doesn't exist
pub fn ensure_engine_dir() -> AppResult<PathBuf> {
    let path = engine_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
