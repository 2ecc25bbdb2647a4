mod config;
pub mod database;

pub use config::Config;
pub use database::{Database, SessionOutcome, SessionRow};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/somnia[-dev]/` based on SOMNIA_ENV.
///
/// Set SOMNIA_ENV=dev to use a development data directory.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SOMNIA_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("somnia-dev")
    } else {
        base_dir.join("somnia")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
