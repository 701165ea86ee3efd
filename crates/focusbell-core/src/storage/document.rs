//! Typed shape of the persisted statistics document.
//!
//! Older or hand-edited documents are brought up to this shape by
//! [`super::migrations`] before they are parsed here; the lenient field
//! deserializers below only cover values that survive migration in an
//! unexpected format (timestamps without offsets and the like).

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::migrations::CURRENT_VERSION;
use crate::timer::ModeParameters;

/// Maximum length of both derived mode orderings.
pub const HISTORY_LIMIT: usize = 10;

/// Work done on one calendar date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(default)]
    pub work_time_seconds: u64,
    #[serde(default)]
    pub sessions: u64,
}

/// Sum over every [`DailyRecord`]. Recomputed on each write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalStats {
    #[serde(default)]
    pub total_work_time_seconds: u64,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default = "today", deserialize_with = "lenient::date")]
    pub created_date: NaiveDate,
    #[serde(default = "Local::now", deserialize_with = "lenient::timestamp")]
    pub last_updated: DateTime<Local>,
}

impl Default for TotalStats {
    fn default() -> Self {
        Self {
            total_work_time_seconds: 0,
            total_sessions: 0,
            created_date: today(),
            last_updated: Local::now(),
        }
    }
}

/// A named, user-defined set of timing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMode {
    pub name: String,
    pub total_minutes: u32,
    pub interval_minutes: u32,
    #[serde(default)]
    pub random_minutes: u32,
    pub rest_minutes: u32,
    /// Seconds.
    #[serde(default)]
    pub second_reminder_delay: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default = "Local::now", deserialize_with = "lenient::timestamp")]
    pub created_time: DateTime<Local>,
    #[serde(default = "Local::now", deserialize_with = "lenient::timestamp")]
    pub modified_time: DateTime<Local>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub last_used: Option<DateTime<Local>>,
}

impl CustomMode {
    pub fn parameters(&self) -> ModeParameters {
        ModeParameters::new(
            self.total_minutes,
            self.interval_minutes,
            self.random_minutes,
            self.rest_minutes,
            self.second_reminder_delay,
        )
    }

    pub(crate) fn apply_parameters(&mut self, params: &ModeParameters) {
        self.total_minutes = params.total_minutes;
        self.interval_minutes = params.interval_minutes;
        self.random_minutes = params.random_minutes;
        self.rest_minutes = params.rest_minutes;
        self.second_reminder_delay = params.second_reminder_delay;
    }
}

/// Derived orderings over custom mode keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeHistory {
    #[serde(default)]
    pub recent: Vec<String>,
    #[serde(default)]
    pub frequent: Vec<String>,
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    /// Keyed by `YYYY-MM-DD`.
    #[serde(default)]
    pub daily_records: BTreeMap<String, DailyRecord>,
    #[serde(default)]
    pub total_stats: TotalStats,
    #[serde(default)]
    pub custom_modes: BTreeMap<String, CustomMode>,
    #[serde(default)]
    pub custom_mode_history: ModeHistory,
    #[serde(default = "current_version")]
    pub version: u32,
    /// Fields owned by other layers (slogans, UI state). Written back verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for StatsDocument {
    fn default() -> Self {
        Self {
            daily_records: BTreeMap::new(),
            total_stats: TotalStats::default(),
            custom_modes: BTreeMap::new(),
            custom_mode_history: ModeHistory::default(),
            version: CURRENT_VERSION,
            extra: serde_json::Map::new(),
        }
    }
}

impl StatsDocument {
    pub fn record_for(&self, date: NaiveDate) -> DailyRecord {
        self.daily_records
            .get(&date_key(date))
            .copied()
            .unwrap_or_default()
    }

    /// Full recompute of `total_stats` from `daily_records`.
    pub fn recompute_totals(&mut self) {
        let (seconds, sessions) = self
            .daily_records
            .values()
            .fold((0u64, 0u64), |(secs, count), r| {
                (
                    secs.saturating_add(r.work_time_seconds),
                    count.saturating_add(r.sessions),
                )
            });
        self.total_stats.total_work_time_seconds = seconds;
        self.total_stats.total_sessions = sessions;

        if let Some(first) = self
            .daily_records
            .keys()
            .filter_map(|k| parse_date_key(k))
            .min()
        {
            if first < self.total_stats.created_date {
                self.total_stats.created_date = first;
            }
        }
        self.total_stats.last_updated = Local::now();
    }

    /// Drop unknown or duplicate keys from `recent`, cap it, and rebuild
    /// `frequent` from the current use counts.
    pub fn repair_history(&mut self) {
        let modes = &self.custom_modes;
        let mut seen = std::collections::HashSet::new();
        self.custom_mode_history
            .recent
            .retain(|key| modes.contains_key(key) && seen.insert(key.clone()));
        self.custom_mode_history.recent.truncate(HISTORY_LIMIT);
        self.recompute_frequent();
    }

    /// Keys with at least one use, by use count descending; ties go to the
    /// most recently used, then to name.
    pub fn recompute_frequent(&mut self) {
        let mut used: Vec<(&String, &CustomMode)> = self
            .custom_modes
            .iter()
            .filter(|(_, m)| m.use_count > 0)
            .collect();
        used.sort_by(|(_, a), (_, b)| {
            b.use_count
                .cmp(&a.use_count)
                .then_with(|| b.last_used.cmp(&a.last_used))
                .then_with(|| a.name.cmp(&b.name))
        });
        self.custom_mode_history.frequent = used
            .into_iter()
            .take(HISTORY_LIMIT)
            .map(|(key, _)| key.clone())
            .collect();
    }

    /// Move `key` to the front of `recent`.
    pub fn touch_recent(&mut self, key: &str) {
        let recent = &mut self.custom_mode_history.recent;
        recent.retain(|k| k != key);
        recent.insert(0, key.to_string());
        recent.truncate(HISTORY_LIMIT);
    }

    pub fn forget_mode(&mut self, key: &str) {
        self.custom_mode_history.recent.retain(|k| k != key);
        self.custom_mode_history.frequent.retain(|k| k != key);
    }

    pub fn find_mode_by_name(&self, name: &str) -> Option<(&String, &CustomMode)> {
        self.custom_modes.iter().find(|(_, m)| m.name == name)
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn current_version() -> u32 {
    CURRENT_VERSION
}

/// Lenient deserializers for timestamps written by older front ends.
pub(crate) mod lenient {
    use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Local));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    }

    pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(optional_timestamp(deserializer)?.unwrap_or_else(Local::now))
    }

    pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Local>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(parse_timestamp))
    }

    pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let parsed = value.as_str().and_then(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(raw).map(|dt| dt.date_naive()))
        });
        Ok(parsed.unwrap_or_else(super::today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(name: &str, uses: u64) -> CustomMode {
        CustomMode {
            name: name.into(),
            total_minutes: 30,
            interval_minutes: 10,
            random_minutes: 1,
            rest_minutes: 5,
            second_reminder_delay: 5,
            description: String::new(),
            tags: vec![],
            notes: String::new(),
            use_count: uses,
            created_time: Local::now(),
            modified_time: Local::now(),
            last_used: None,
        }
    }

    #[test]
    fn totals_are_recomputed_not_accumulated() {
        let mut doc = StatsDocument::default();
        doc.total_stats.total_sessions = 999;
        doc.total_stats.total_work_time_seconds = 999;
        doc.daily_records.insert(
            "2026-01-01".into(),
            DailyRecord {
                work_time_seconds: 100,
                sessions: 2,
            },
        );
        doc.daily_records.insert(
            "2026-01-02".into(),
            DailyRecord {
                work_time_seconds: 50,
                sessions: 1,
            },
        );
        doc.recompute_totals();
        assert_eq!(doc.total_stats.total_sessions, 3);
        assert_eq!(doc.total_stats.total_work_time_seconds, 150);
        assert_eq!(
            doc.total_stats.created_date,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );

        doc.recompute_totals();
        assert_eq!(doc.total_stats.total_sessions, 3);
    }

    #[test]
    fn repair_history_purges_unknown_and_duplicate_keys() {
        let mut doc = StatsDocument::default();
        doc.custom_modes.insert("a".into(), mode("A", 1));
        doc.custom_modes.insert("b".into(), mode("B", 3));
        doc.custom_mode_history.recent = vec!["ghost".into(), "a".into(), "b".into(), "a".into()];
        doc.custom_mode_history.frequent = vec!["ghost".into()];
        doc.repair_history();
        assert_eq!(doc.custom_mode_history.recent, vec!["a", "b"]);
        assert_eq!(doc.custom_mode_history.frequent, vec!["b", "a"]);
    }

    #[test]
    fn frequent_skips_unused_and_caps_at_limit() {
        let mut doc = StatsDocument::default();
        for i in 0..15u64 {
            doc.custom_modes.insert(format!("k{i:02}"), mode(&format!("M{i:02}"), i));
        }
        doc.recompute_frequent();
        let frequent = &doc.custom_mode_history.frequent;
        assert_eq!(frequent.len(), HISTORY_LIMIT);
        assert_eq!(frequent[0], "k14");
        assert!(!frequent.contains(&"k00".to_string()));
    }

    #[test]
    fn touch_recent_moves_key_to_front() {
        let mut doc = StatsDocument::default();
        for i in 0..12 {
            doc.touch_recent(&format!("k{i}"));
        }
        doc.touch_recent("k5");
        let recent = &doc.custom_mode_history.recent;
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent[0], "k5");
        assert_eq!(recent.iter().filter(|k| *k == "k5").count(), 1);
    }

    #[test]
    fn unknown_top_level_fields_are_preserved() {
        let json = serde_json::json!({
            "daily_records": {},
            "version": 3,
            "slogans": ["stay sharp"],
            "slogan_index": 2
        });
        let doc: StatsDocument = serde_json::from_value(json).unwrap();
        assert_eq!(doc.extra["slogan_index"], 2);
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["slogans"][0], "stay sharp");
    }

    #[test]
    fn naive_timestamps_are_accepted() {
        let json = serde_json::json!({
            "name": "Legacy",
            "total_minutes": 30,
            "interval_minutes": 10,
            "rest_minutes": 5,
            "created_time": "2024-03-01T09:30:00.123456",
            "modified_time": 12,
            "last_used": null
        });
        let mode: CustomMode = serde_json::from_value(json).unwrap();
        assert_eq!(mode.created_time.date_naive().to_string(), "2024-03-01");
        assert!(mode.last_used.is_none());
    }
}
