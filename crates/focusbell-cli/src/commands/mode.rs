use std::path::PathBuf;

use clap::{Args, Subcommand};
use focusbell_core::storage::{ModeDetails, ModeRegistry};
use focusbell_core::{Config, CustomMode, ModeParameters, Preset};
use serde::Serialize;

use super::{open_store, print_json, CmdResult};

/// Timing parameters given on the command line.
#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    /// Session length in minutes
    #[arg(long)]
    pub total: u32,
    /// Minutes between reminders
    #[arg(long)]
    pub interval: u32,
    /// Maximum random delay added to each reminder, in minutes
    #[arg(long, default_value = "0")]
    pub random: u32,
    /// Suggested rest after the session, in minutes
    #[arg(long, default_value = "5")]
    pub rest: u32,
    /// Delay of the follow-up reminder in seconds (0 disables it)
    #[arg(long, default_value = "0")]
    pub second: u32,
}

impl From<&ParamArgs> for ModeParameters {
    fn from(args: &ParamArgs) -> Self {
        ModeParameters::new(args.total, args.interval, args.random, args.rest, args.second)
    }
}

#[derive(Subcommand)]
pub enum ModeAction {
    /// List custom modes
    List,
    /// List built-in presets
    Presets,
    /// Show one custom mode by key or name
    Show {
        mode: String,
    },
    /// Create a custom mode, or update the one with the same name
    Save {
        name: String,
        #[command(flatten)]
        params: ParamArgs,
        #[arg(long, default_value = "")]
        description: String,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Delete a custom mode by key
    Delete {
        key: String,
    },
    /// Most recently used modes
    Recent,
    /// Most frequently used modes
    Frequent,
    /// Export custom modes to a JSON file
    Export {
        path: PathBuf,
        /// Only export these keys
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
    },
    /// Import custom modes from a JSON file
    Import {
        path: PathBuf,
        /// Replace modes that share a name with an imported one
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Serialize)]
struct ModeRow<'a> {
    key: &'a str,
    #[serde(flatten)]
    mode: &'a CustomMode,
}

#[derive(Serialize)]
struct PresetRow {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    #[serde(flatten)]
    parameters: ModeParameters,
}

fn rows<'a>(registry: &'a ModeRegistry<'_>, keys: &'a [String]) -> Vec<ModeRow<'a>> {
    keys.iter()
        .filter_map(|key| registry.get(key).map(|mode| ModeRow { key, mode }))
        .collect()
}

fn print_presets() -> CmdResult {
    let presets: Vec<PresetRow> = Preset::ALL
        .iter()
        .map(|p| PresetRow {
            id: p.id(),
            name: p.display_name(),
            description: p.description(),
            parameters: p.parameters(),
        })
        .collect();
    print_json(&presets)
}

pub fn run(action: ModeAction) -> CmdResult {
    let config = Config::load_or_default();
    let mut store = open_store(&config)?;
    let mut registry = ModeRegistry::new(&mut store);

    match action {
        ModeAction::Presets => print_presets()?,
        ModeAction::List => {
            let modes: Vec<ModeRow<'_>> = registry
                .list()
                .into_iter()
                .map(|(key, mode)| ModeRow { key, mode })
                .collect();
            print_json(&modes)?;
        }
        ModeAction::Show { mode } => {
            let found = match registry.get(&mode) {
                Some(found) => Some((mode.as_str(), found)),
                None => registry
                    .find_by_name(&mode)
                    .map(|(key, found)| (key.as_str(), found)),
            };
            let (key, mode) = found.ok_or_else(|| format!("mode not found: {mode}"))?;
            print_json(&ModeRow { key, mode })?;
        }
        ModeAction::Save {
            name,
            params,
            description,
            tags,
            notes,
        } => {
            let details = ModeDetails {
                description,
                tags,
                notes,
            };
            let key = registry.save(&name, ModeParameters::from(&params), details)?;
            println!("{key}");
        }
        ModeAction::Delete { key } => {
            if !registry.delete(&key)? {
                return Err(format!("mode not found: {key}").into());
            }
            println!("deleted {key}");
        }
        ModeAction::Recent => {
            let keys = registry.recent().to_vec();
            print_json(&rows(&registry, &keys))?;
        }
        ModeAction::Frequent => {
            let keys = registry.frequent().to_vec();
            print_json(&rows(&registry, &keys))?;
        }
        ModeAction::Export { path, keys } => {
            let keys = (!keys.is_empty()).then_some(keys);
            let count = registry.export_to(&path, keys.as_deref())?;
            println!("exported {count} modes to {}", path.display());
        }
        ModeAction::Import { path, overwrite } => {
            let summary = registry.import_from(&path, overwrite)?;
            print_json(&summary)?;
        }
    }
    Ok(())
}
