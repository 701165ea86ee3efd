use clap::Subcommand;
use focusbell_core::storage::DailyRecord;
use focusbell_core::Config;
use serde::Serialize;

use super::{open_store, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
    /// Per-day records, most recent first
    Days {
        /// Number of days to show
        #[arg(long, default_value = "7")]
        limit: usize,
    },
}

#[derive(Serialize)]
struct DayRow<'a> {
    date: &'a str,
    #[serde(flatten)]
    record: DailyRecord,
}

pub fn run(action: StatsAction) -> CmdResult {
    let config = Config::load_or_default();
    let store = open_store(&config)?;

    match action {
        StatsAction::Today => print_json(&store.today())?,
        StatsAction::All => print_json(store.totals())?,
        StatsAction::Days { limit } => {
            let rows: Vec<DayRow<'_>> = store
                .document()
                .daily_records
                .iter()
                .rev()
                .take(limit)
                .map(|(date, record)| DayRow {
                    date,
                    record: *record,
                })
                .collect();
            print_json(&rows)?;
        }
    }
    Ok(())
}
