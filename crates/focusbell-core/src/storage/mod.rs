mod config;
pub mod document;
pub mod migrations;
pub mod modes;
mod statistics;

pub use config::{AlertsConfig, Config, StorageConfig, TimerConfig};
pub use document::{CustomMode, DailyRecord, ModeHistory, StatsDocument, TotalStats, HISTORY_LIMIT};
pub use modes::{ImportSummary, ModeBundle, ModeDetails, ModeRegistry};
pub use statistics::{SharedStore, StatisticsStore, STATISTICS_FILE};

use std::path::PathBuf;

/// Returns `~/.config/focusbell[-dev]/` based on FOCUSBELL_ENV.
///
/// Set FOCUSBELL_ENV=dev to use the development data directory, or
/// FOCUSBELL_HOME to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("FOCUSBELL_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSBELL_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("focusbell-dev")
            } else {
                base_dir.join("focusbell")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
