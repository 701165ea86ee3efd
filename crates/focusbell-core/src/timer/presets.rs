//! Built-in timing presets and the selector that distinguishes them from
//! user-defined custom modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::params::ModeParameters;
use crate::error::{CoreError, Result};
use crate::storage::StatisticsStore;

/// A built-in set of timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// 90 minute deep focus block with frequent, loosely timed nudges.
    DeepFocus,
    /// 45 minute sprint.
    Sprint,
    /// Classic 25/5 pomodoro with a single reminder at the end.
    Pomodoro,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::DeepFocus, Preset::Sprint, Preset::Pomodoro];

    pub fn id(self) -> &'static str {
        match self {
            Preset::DeepFocus => "deep-focus",
            Preset::Sprint => "sprint",
            Preset::Pomodoro => "pomodoro",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Preset::DeepFocus => "Deep Focus",
            Preset::Sprint => "Sprint",
            Preset::Pomodoro => "Pomodoro",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Preset::DeepFocus => indoc::indoc! {"
                A 90 minute block. A reminder lands every 15 minutes, pushed
                up to 2 minutes late at random so the moment never becomes
                predictable. A second nudge follows 10 seconds later.
            "},
            Preset::Sprint => indoc::indoc! {"
                A 45 minute sprint with a reminder every 10 minutes and up to
                2 minutes of jitter. Ends with a 10 minute rest.
            "},
            Preset::Pomodoro => indoc::indoc! {"
                The classic 25 minute pomodoro with a fixed reminder at the
                end of the block and a 5 minute rest.
            "},
        }
    }

    pub fn parameters(self) -> ModeParameters {
        match self {
            Preset::DeepFocus => ModeParameters::new(90, 15, 2, 20, 10),
            Preset::Sprint => ModeParameters::new(45, 10, 2, 10, 10),
            Preset::Pomodoro => ModeParameters::new(25, 25, 0, 5, 0),
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }
}

/// Which mode a session runs under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ModeSelector {
    Preset(Preset),
    /// Key of a custom mode stored in the statistics document.
    Custom(String),
}

impl ModeSelector {
    /// Stable identifier recorded with the session.
    pub fn id(&self) -> String {
        match self {
            ModeSelector::Preset(p) => format!("preset:{}", p.id()),
            ModeSelector::Custom(key) => format!("custom:{key}"),
        }
    }

    /// Resolve to concrete parameters. Custom keys must exist in the store.
    pub fn resolve(&self, store: &StatisticsStore) -> Result<ModeParameters> {
        match self {
            ModeSelector::Preset(p) => Ok(p.parameters()),
            ModeSelector::Custom(key) => store
                .document()
                .custom_modes
                .get(key)
                .map(|m| m.parameters())
                .ok_or_else(|| CoreError::ModeNotFound(key.clone())),
        }
    }
}

impl Default for ModeSelector {
    fn default() -> Self {
        ModeSelector::Preset(Preset::DeepFocus)
    }
}

impl fmt::Display for ModeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for ModeSelector {
    type Err = CoreError;

    /// Accepts `preset:<id>`, `custom:<key>`, or a bare preset id.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(id) = s.strip_prefix("preset:") {
            return Preset::from_id(id)
                .map(ModeSelector::Preset)
                .ok_or_else(|| CoreError::ModeNotFound(s.to_string()));
        }
        if let Some(key) = s.strip_prefix("custom:") {
            if key.is_empty() {
                return Err(CoreError::ModeNotFound(s.to_string()));
            }
            return Ok(ModeSelector::Custom(key.to_string()));
        }
        Preset::from_id(s)
            .map(ModeSelector::Preset)
            .ok_or_else(|| CoreError::ModeNotFound(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_are_valid() {
        for preset in Preset::ALL {
            assert!(preset.parameters().validate().is_ok(), "{}", preset.id());
            assert!(!preset.description().is_empty());
        }
    }

    #[test]
    fn selector_id_roundtrips_through_from_str() {
        let preset = ModeSelector::Preset(Preset::Sprint);
        assert_eq!(preset.id().parse::<ModeSelector>().unwrap(), preset);

        let custom = ModeSelector::Custom("abc".into());
        assert_eq!(custom.id().parse::<ModeSelector>().unwrap(), custom);
    }

    #[test]
    fn bare_preset_id_is_accepted() {
        assert_eq!(
            "pomodoro".parse::<ModeSelector>().unwrap(),
            ModeSelector::Preset(Preset::Pomodoro)
        );
        assert!("nope".parse::<ModeSelector>().is_err());
        assert!("custom:".parse::<ModeSelector>().is_err());
    }

    #[test]
    fn unknown_custom_key_does_not_resolve() {
        let store = StatisticsStore::in_memory();
        let err = ModeSelector::Custom("missing".into())
            .resolve(&store)
            .unwrap_err();
        assert!(matches!(err, CoreError::ModeNotFound(_)));
    }
}
