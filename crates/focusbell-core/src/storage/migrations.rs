//! Schema migrations for the statistics document.
//!
//! Migrations are versioned and applied in order to the raw JSON value before
//! it is parsed into [`super::StatsDocument`]. The top-level `version` field
//! tracks the schema; documents without a numeric version (including the
//! string versions written by early releases) are treated as version 0.

use chrono::{Local, NaiveDate};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::timer::ModeParameters;

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_VERSION: u32 = 3;

/// Read the schema version of a raw document.
pub fn detect_version(doc: &Value) -> u32 {
    match doc.get("version") {
        Some(Value::Number(n)) => n.as_u64().map(|v| v.min(u64::from(u32::MAX)) as u32).unwrap_or(0),
        _ => 0,
    }
}

/// Apply all pending migrations. Returns the version the document started at.
///
/// # Errors
/// Returns an error if the document is not a JSON object.
pub fn migrate(doc: &mut Value) -> Result<u32, PersistenceError> {
    let from = detect_version(doc);
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| PersistenceError::MigrationFailed {
            version: from.saturating_add(1).min(CURRENT_VERSION),
            message: "document root is not an object".into(),
        })?;

    if from < 1 {
        migrate_v1(obj);
    }
    if from < 2 {
        migrate_v2(obj);
    }
    if from < 3 {
        migrate_v3(obj);
    }
    if from >= 2 {
        // Hand-edited current documents may still miss mode fields.
        normalize_custom_modes(obj);
    }

    if from < CURRENT_VERSION {
        debug!(from, to = CURRENT_VERSION, "migrated statistics document");
    }
    obj.insert("version".into(), json!(CURRENT_VERSION));
    Ok(from)
}

/// Migration v1: normalize daily records and the totals object.
///
/// Records whose key is not a `YYYY-MM-DD` date, or whose value is not an
/// object, are dropped. Counters are coerced to non-negative integers.
fn migrate_v1(obj: &mut Map<String, Value>) {
    let records = take_object(obj, "daily_records");
    let mut cleaned = Map::new();
    for (date, record) in records {
        if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
            warn!(key = %date, "dropping daily record with invalid date key");
            continue;
        }
        let Value::Object(record) = record else {
            warn!(key = %date, "dropping malformed daily record");
            continue;
        };
        cleaned.insert(
            date,
            json!({
                "work_time_seconds": lenient_u64(record.get("work_time_seconds")),
                "sessions": lenient_u64(record.get("sessions")),
            }),
        );
    }
    obj.insert("daily_records".into(), Value::Object(cleaned));

    let totals = take_object(obj, "total_stats");
    obj.insert("total_stats".into(), Value::Object(totals));
}

/// Migration v2: custom modes gain use tracking, metadata and timestamps.
fn migrate_v2(obj: &mut Map<String, Value>) {
    normalize_custom_modes(obj);
}

/// Fill every missing or malformed custom mode field with a safe default.
/// Idempotent on well-formed modes.
fn normalize_custom_modes(obj: &mut Map<String, Value>) {
    let defaults = ModeParameters::default();
    let now = Local::now().to_rfc3339();
    let modes = take_object(obj, "custom_modes");
    let mut cleaned = Map::new();

    for (key, mode) in modes {
        let Value::Object(mut mode) = mode else {
            warn!(key = %key, "dropping malformed custom mode");
            continue;
        };
        let name = mode
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| key.clone());

        let minutes = |mode: &Map<String, Value>, field: &str, default: u32| -> u32 {
            mode.get(field)
                .filter(|v| !v.is_null())
                .map(|v| lenient_u64(Some(v)).min(u64::from(u32::MAX)) as u32)
                .unwrap_or(default)
        };
        let total = minutes(&mode, "total_minutes", defaults.total_minutes);
        let interval = minutes(&mode, "interval_minutes", defaults.interval_minutes);
        let random = minutes(&mode, "random_minutes", 0);
        let rest = minutes(&mode, "rest_minutes", defaults.rest_minutes);
        let second = minutes(&mode, "second_reminder_delay", 0);

        let tags: Vec<Value> = match mode.remove("tags") {
            Some(Value::Array(items)) => items.into_iter().filter(Value::is_string).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| Value::String(t.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        let text = |mode: &Map<String, Value>, field: &str| -> String {
            mode.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let timestamp = |mode: &Map<String, Value>, field: &str| -> Value {
            mode.get(field)
                .filter(|v| v.is_string())
                .cloned()
                .unwrap_or_else(|| Value::String(now.clone()))
        };
        let last_used = mode
            .get("last_used")
            .filter(|v| v.is_string())
            .cloned()
            .unwrap_or(Value::Null);

        let created = timestamp(&mode, "created_time");
        let modified = mode
            .get("modified_time")
            .filter(|v| v.is_string())
            .cloned()
            .unwrap_or_else(|| created.clone());

        cleaned.insert(
            key,
            json!({
                "name": name,
                "total_minutes": total,
                "interval_minutes": interval,
                "random_minutes": random,
                "rest_minutes": rest,
                "second_reminder_delay": second,
                "description": text(&mode, "description"),
                "tags": tags,
                "notes": text(&mode, "notes"),
                "use_count": lenient_u64(mode.get("use_count")),
                "created_time": created,
                "modified_time": modified,
                "last_used": last_used,
            }),
        );
    }
    obj.insert("custom_modes".into(), Value::Object(cleaned));
}

/// Migration v3: add the recent/frequent mode history.
fn migrate_v3(obj: &mut Map<String, Value>) {
    let history = take_object(obj, "custom_mode_history");
    let keys = |field: &str| -> Vec<Value> {
        match history.get(field) {
            Some(Value::Array(items)) => items.iter().filter(|v| v.is_string()).cloned().collect(),
            _ => Vec::new(),
        }
    };
    let recent = keys("recent");
    let frequent = keys("frequent");
    obj.insert(
        "custom_mode_history".into(),
        json!({ "recent": recent, "frequent": frequent }),
    );
}

/// Remove `field` and return it if it was an object, else an empty map.
fn take_object(obj: &mut Map<String, Value>, field: &str) -> Map<String, Value> {
    match obj.remove(field) {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            warn!(field, found = %type_name(&other), "replacing malformed field with empty object");
            Map::new()
        }
    }
}

/// Non-negative integer from numbers, floats or numeric strings; 0 otherwise.
fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f > 0.0)
            .map(|f| f as u64)
            .unwrap_or(0),
        _ => 0,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
