pub mod config;
pub mod mode;
pub mod stats;
pub mod timer;

use focusbell_core::{Config, StatisticsStore};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Open the statistics document named by the config, or the default one.
pub fn open_store(config: &Config) -> Result<StatisticsStore, Box<dyn std::error::Error>> {
    let path = config
        .statistics_path()
        .ok_or("cannot determine the statistics file location")?;
    Ok(StatisticsStore::load(path))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
