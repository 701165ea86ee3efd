//! Custom mode registry.
//!
//! A borrowed view over [`StatisticsStore`] that owns the CRUD rules for
//! custom modes and keeps the `recent`/`frequent` orderings consistent with
//! them. Every mutation is persisted before returning.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::document::CustomMode;
use super::statistics::StatisticsStore;
use crate::error::{CoreError, PersistenceError, Result, ValidationError};
use crate::timer::ModeParameters;

const MAX_NAME_LEN: usize = 64;
const BUNDLE_FORMAT: &str = "focusbell-modes";

/// Free-form metadata attached to a custom mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeDetails {
    pub description: String,
    pub tags: Vec<String>,
    pub notes: String,
}

/// Portable export of custom modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeBundle {
    pub format: String,
    pub exported_at: DateTime<Local>,
    pub modes: Vec<CustomMode>,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub struct ModeRegistry<'a> {
    store: &'a mut StatisticsStore,
}

impl<'a> ModeRegistry<'a> {
    pub fn new(store: &'a mut StatisticsStore) -> Self {
        Self { store }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<&CustomMode> {
        self.store.document().custom_modes.get(key)
    }

    pub fn find_by_name(&self, name: &str) -> Option<(&String, &CustomMode)> {
        self.store.document().find_mode_by_name(name.trim())
    }

    /// All modes, sorted by display name.
    pub fn list(&self) -> Vec<(&String, &CustomMode)> {
        let mut modes: Vec<_> = self.store.document().custom_modes.iter().collect();
        modes.sort_by(|(_, a), (_, b)| a.name.cmp(&b.name));
        modes
    }

    pub fn recent(&self) -> &[String] {
        &self.store.document().custom_mode_history.recent
    }

    pub fn frequent(&self) -> &[String] {
        &self.store.document().custom_mode_history.frequent
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Create a mode, or update the one with the same display name in place.
    /// Returns the mode key.
    ///
    /// # Errors
    /// Fails on invalid parameters, an empty or oversized name, or while a
    /// session holds the mode lock.
    pub fn save(&mut self, name: &str, params: ModeParameters, details: ModeDetails) -> Result<String> {
        self.ensure_unlocked()?;
        let name = validate_name(name)?;
        params.validate()?;

        let now = Local::now();
        let existing = self
            .store
            .document()
            .find_mode_by_name(&name)
            .map(|(key, _)| key.clone());

        let doc = self.store.document_mut();
        let key = match existing {
            Some(key) => {
                if let Some(mode) = doc.custom_modes.get_mut(&key) {
                    mode.apply_parameters(&params);
                    mode.description = details.description;
                    mode.tags = details.tags;
                    mode.notes = details.notes;
                    mode.modified_time = now;
                }
                info!(key = %key, name = %name, "updated custom mode");
                key
            }
            None => {
                let key = new_key();
                let mut mode = CustomMode {
                    name: name.clone(),
                    total_minutes: 0,
                    interval_minutes: 0,
                    random_minutes: 0,
                    rest_minutes: 0,
                    second_reminder_delay: 0,
                    description: details.description,
                    tags: details.tags,
                    notes: details.notes,
                    use_count: 0,
                    created_time: now,
                    modified_time: now,
                    last_used: None,
                };
                mode.apply_parameters(&params);
                doc.custom_modes.insert(key.clone(), mode);
                info!(key = %key, name = %name, "created custom mode");
                key
            }
        };
        doc.repair_history();
        self.store.mark_mode_changed(&key);
        self.persist();
        Ok(key)
    }

    /// Remove a mode. Returns `false` if the key was unknown.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        self.ensure_unlocked()?;
        let doc = self.store.document_mut();
        let Some(removed) = doc.custom_modes.remove(key) else {
            return Ok(false);
        };
        doc.forget_mode(key);
        doc.recompute_frequent();
        info!(key = %key, name = %removed.name, "deleted custom mode");
        self.store.mark_mode_removed(key);
        self.persist();
        Ok(true)
    }

    /// Count one use of a mode. Returns the new use count.
    ///
    /// Allowed while modes are locked; the controller records usage as it
    /// starts a session.
    pub fn record_usage(&mut self, key: &str) -> Result<u64> {
        let doc = self.store.document_mut();
        let mode = doc
            .custom_modes
            .get_mut(key)
            .ok_or_else(|| CoreError::ModeNotFound(key.to_string()))?;
        mode.use_count = mode.use_count.saturating_add(1);
        mode.last_used = Some(Local::now());
        let count = mode.use_count;

        doc.touch_recent(key);
        doc.recompute_frequent();
        self.store.mark_mode_changed(key);
        self.persist();
        Ok(count)
    }

    /// Export the given modes, or all of them when `keys` is `None`.
    pub fn export(&self, keys: Option<&[String]>) -> ModeBundle {
        let modes = self.store.document().custom_modes.iter();
        let modes = match keys {
            Some(keys) => modes
                .filter(|(k, _)| keys.contains(k))
                .map(|(_, m)| m.clone())
                .collect(),
            None => modes.map(|(_, m)| m.clone()).collect(),
        };
        ModeBundle {
            format: BUNDLE_FORMAT.into(),
            exported_at: Local::now(),
            modes,
        }
    }

    pub fn export_to(&self, path: &Path, keys: Option<&[String]>) -> Result<usize> {
        let bundle = self.export(keys);
        let content = serde_json::to_string_pretty(&bundle).map_err(PersistenceError::from)?;
        fs::write(path, content).map_err(|source| PersistenceError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(bundle.modes.len())
    }

    /// Merge modes by display name.
    ///
    /// A name that already exists is updated only when `overwrite` is set;
    /// its local use count and last-used time are kept. Invalid entries are
    /// skipped.
    pub fn import(&mut self, bundle: ModeBundle, overwrite: bool) -> Result<ImportSummary> {
        self.ensure_unlocked()?;
        if bundle.format != BUNDLE_FORMAT {
            warn!(format = %bundle.format, "importing modes from unrecognised bundle format");
        }

        let now = Local::now();
        let mut summary = ImportSummary::default();
        let mut changed = Vec::new();
        let doc = self.store.document_mut();

        for incoming in bundle.modes {
            let name = match validate_name(&incoming.name) {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "skipping imported mode");
                    summary.skipped += 1;
                    continue;
                }
            };
            if let Err(e) = incoming.parameters().validate() {
                warn!(name = %name, error = %e, "skipping imported mode");
                summary.skipped += 1;
                continue;
            }

            let existing = doc.find_mode_by_name(&name).map(|(k, _)| k.clone());
            match existing {
                Some(key) if overwrite => {
                    if let Some(local) = doc.custom_modes.get_mut(&key) {
                        let keep_count = local.use_count;
                        let keep_last_used = local.last_used;
                        let keep_created = local.created_time;
                        *local = CustomMode {
                            name,
                            use_count: keep_count,
                            last_used: keep_last_used,
                            created_time: keep_created,
                            modified_time: now,
                            ..incoming
                        };
                    }
                    changed.push(key);
                    summary.updated += 1;
                }
                Some(_) => summary.skipped += 1,
                None => {
                    let key = new_key();
                    doc.custom_modes
                        .insert(key.clone(), CustomMode { name, ..incoming });
                    changed.push(key);
                    summary.created += 1;
                }
            }
        }

        doc.repair_history();
        for key in &changed {
            self.store.mark_mode_changed(key);
        }
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            "imported custom modes"
        );
        self.persist();
        Ok(summary)
    }

    pub fn import_from(&mut self, path: &Path, overwrite: bool) -> Result<ImportSummary> {
        let content = fs::read_to_string(path).map_err(|source| PersistenceError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: ModeBundle =
            serde_json::from_str(&content).map_err(|source| PersistenceError::ParseFailed {
                path: path.to_path_buf(),
                source,
            })?;
        self.import(bundle, overwrite)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_unlocked(&self) -> Result<()> {
        match self.store.locked_mode() {
            Some(mode) => Err(CoreError::ModesLocked {
                mode: mode.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn persist(&mut self) {
        if !self.store.save() {
            warn!("custom mode change kept in memory only");
        }
    }
}

fn new_key() -> String {
    Uuid::new_v4().simple().to_string()
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "must not be empty".into(),
        });
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: format!("must be at most {MAX_NAME_LEN} characters"),
        });
    }
    Ok(name.to_string())
}
