//! Durable statistics document: daily work records, totals, custom modes.
//!
//! The store keeps the document in memory and writes it back as a whole.
//! Sessions committed by the controller are staged as per-date deltas and
//! folded into a fresh re-read of the file on the next [`StatisticsStore::save`],
//! so edits made to the file by another process in the meantime survive.
//! Custom modes merge the same way: only keys this process created, changed
//! or deleted since the last write override the disk copy.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use super::data_dir;
use super::document::{date_key, today, DailyRecord, StatsDocument, TotalStats};
use super::migrations::{self, CURRENT_VERSION};
use crate::error::PersistenceError;

/// Statistics file name inside the data directory.
pub const STATISTICS_FILE: &str = "work_statistics.json";

/// Store shared between the controller and the front end.
pub type SharedStore = Arc<Mutex<StatisticsStore>>;

#[derive(Debug)]
pub struct StatisticsStore {
    path: Option<PathBuf>,
    doc: StatsDocument,
    /// Session deltas not yet written, keyed by date.
    pending: BTreeMap<String, DailyRecord>,
    /// Custom mode keys created or changed since the last write.
    touched_modes: BTreeSet<String>,
    /// Custom mode keys deleted since the last write.
    removed_modes: BTreeSet<String>,
    /// Mode id of the running session; custom modes are read-only while set.
    locked_mode: Option<String>,
}

impl StatisticsStore {
    /// `<data dir>/work_statistics.json`.
    pub fn default_path() -> Result<PathBuf, PersistenceError> {
        data_dir()
            .map(|dir| dir.join(STATISTICS_FILE))
            .map_err(|e| PersistenceError::DataDir(e.to_string()))
    }

    /// Load from the default location, or fall back to an unsaved in-memory
    /// document if no data directory is available.
    pub fn load_default() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load(path),
            Err(e) => {
                error!(error = %e, "statistics will not be persisted");
                Self::in_memory()
            }
        }
    }

    /// Load the document at `path`. Never fails.
    ///
    /// - missing file: a fresh document is created and written;
    /// - older schema: migrated and written back;
    /// - corrupt (including non-UTF-8): the broken file is kept as `*.bak`
    ///   and replaced by a fresh document;
    /// - unreadable: left untouched, and the store starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self::empty(Some(path.clone()));

        if !path.exists() {
            info!(path = %path.display(), "creating statistics document");
            store.persist_fresh();
            return store;
        }

        match read_document(&path) {
            Ok((doc, from_version)) => {
                store.doc = doc;
                if from_version < CURRENT_VERSION {
                    info!(
                        path = %path.display(),
                        from = from_version,
                        to = CURRENT_VERSION,
                        "upgraded statistics document"
                    );
                    if let Err(e) = write_document(&path, &store.doc) {
                        warn!(error = %e, "failed to write upgraded statistics document");
                    }
                }
            }
            Err(e @ PersistenceError::ReadFailed { .. }) => {
                // Leave the file alone; it may only be temporarily locked.
                // Saves refuse to write until it can be read again.
                error!(error = %e, "using empty statistics for this run");
            }
            Err(e) => {
                error!(error = %e, "statistics document is corrupt; starting fresh");
                if backup_corrupt(&path) {
                    store.persist_fresh();
                }
            }
        }
        store
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::empty(None)
    }

    fn empty(path: Option<PathBuf>) -> Self {
        Self {
            path,
            doc: StatsDocument::default(),
            pending: BTreeMap::new(),
            touched_modes: BTreeSet::new(),
            removed_modes: BTreeSet::new(),
            locked_mode: None,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &StatsDocument {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut StatsDocument {
        &mut self.doc
    }

    pub fn totals(&self) -> &TotalStats {
        &self.doc.total_stats
    }

    pub fn today(&self) -> DailyRecord {
        self.doc.record_for(today())
    }

    pub fn record_for(&self, date: NaiveDate) -> DailyRecord {
        self.doc.record_for(date)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.touched_modes.is_empty() || !self.removed_modes.is_empty()
    }

    pub fn locked_mode(&self) -> Option<&str> {
        self.locked_mode.as_deref()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn lock_modes(&mut self, mode_id: impl Into<String>) {
        self.locked_mode = Some(mode_id.into());
    }

    pub fn unlock_modes(&mut self) {
        self.locked_mode = None;
    }

    /// Let the in-memory copy of `key` win over the disk copy on the next save.
    pub(crate) fn mark_mode_changed(&mut self, key: &str) {
        self.removed_modes.remove(key);
        self.touched_modes.insert(key.to_string());
    }

    /// Delete `key` from the disk copy on the next save.
    pub(crate) fn mark_mode_removed(&mut self, key: &str) {
        self.touched_modes.remove(key);
        self.removed_modes.insert(key.to_string());
    }

    /// Stage one finished session for today.
    pub fn record_session(&mut self, elapsed: Duration) {
        self.record_session_on(today(), elapsed);
    }

    /// Stage one finished session for `date`. Visible in memory immediately,
    /// written by the next [`save`](Self::save).
    pub fn record_session_on(&mut self, date: NaiveDate, elapsed: Duration) {
        let key = date_key(date);
        let secs = elapsed.as_secs();
        for record in [
            self.doc.daily_records.entry(key.clone()).or_default(),
            self.pending.entry(key).or_default(),
        ] {
            record.sessions += 1;
            record.work_time_seconds = record.work_time_seconds.saturating_add(secs);
        }
        self.doc.recompute_totals();
    }

    /// Merge with the on-disk document and write it back. Returns `false` on
    /// any failure (already logged); staged changes are then kept for the
    /// next attempt.
    ///
    /// A file that exists but cannot be read is never overwritten. A file
    /// that reads but is corrupt is moved to `*.bak` before the memory copy
    /// replaces it.
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to save statistics");
                false
            }
        }
    }

    fn try_save(&mut self) -> Result<(), PersistenceError> {
        let mut merged = match self.path.as_deref().filter(|p| p.exists()) {
            Some(path) => match read_document(path) {
                Ok((disk, _)) => self.merge_into(disk),
                Err(e @ PersistenceError::ReadFailed { .. }) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "on-disk statistics corrupt; replacing with memory copy");
                    if !backup_corrupt(path) {
                        return Err(e);
                    }
                    self.doc.clone()
                }
            },
            // Nothing on disk: memory already includes the staged changes.
            None => self.doc.clone(),
        };

        merged.repair_history();
        merged.recompute_totals();
        merged.version = CURRENT_VERSION;

        if let Some(path) = self.path.as_deref() {
            write_document(path, &merged)?;
            debug!(
                path = %path.display(),
                sessions = merged.total_stats.total_sessions,
                seconds = merged.total_stats.total_work_time_seconds,
                "statistics saved"
            );
        }
        self.doc = merged;
        self.pending.clear();
        self.touched_modes.clear();
        self.removed_modes.clear();
        Ok(())
    }

    /// Apply staged session deltas and mode changes on top of `disk`.
    fn merge_into(&self, mut disk: StatsDocument) -> StatsDocument {
        for (date, delta) in &self.pending {
            let record = disk.daily_records.entry(date.clone()).or_default();
            record.sessions = record.sessions.saturating_add(delta.sessions);
            record.work_time_seconds = record
                .work_time_seconds
                .saturating_add(delta.work_time_seconds);
        }

        for key in &self.removed_modes {
            disk.custom_modes.remove(key);
            disk.forget_mode(key);
        }
        for key in &self.touched_modes {
            if let Some(mode) = self.doc.custom_modes.get(key) {
                disk.custom_modes.insert(key.clone(), mode.clone());
            }
        }
        if !self.touched_modes.is_empty() || !self.removed_modes.is_empty() {
            // Our ordering first, then whatever the disk copy adds.
            let mut recent = self.doc.custom_mode_history.recent.clone();
            for key in &disk.custom_mode_history.recent {
                if !recent.contains(key) {
                    recent.push(key.clone());
                }
            }
            disk.custom_mode_history.recent = recent;
        }

        if disk.total_stats.created_date > self.doc.total_stats.created_date {
            disk.total_stats.created_date = self.doc.total_stats.created_date;
        }
        disk
    }

    fn persist_fresh(&mut self) {
        self.doc = StatsDocument::default();
        if let Some(path) = self.path.as_deref() {
            if let Err(e) = write_document(path, &self.doc) {
                warn!(error = %e, "failed to write fresh statistics document");
            }
        }
    }
}

/// Read, migrate and parse. Returns the document and its original version.
///
/// Content that is not valid UTF-8 JSON is a parse failure, not a read
/// failure.
fn read_document(path: &Path) -> Result<(StatsDocument, u32), PersistenceError> {
    let content = fs::read(path).map_err(|source| PersistenceError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut raw: serde_json::Value =
        serde_json::from_slice(&content).map_err(|source| PersistenceError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
    let from = migrations::migrate(&mut raw)?;
    let mut doc: StatsDocument =
        serde_json::from_value(raw).map_err(|source| PersistenceError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
    doc.repair_history();
    doc.recompute_totals();
    Ok((doc, from))
}

/// Write through a sibling temp file and rename over the target.
fn write_document(path: &Path, doc: &StatsDocument) -> Result<(), PersistenceError> {
    let content = serde_json::to_string_pretty(doc)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::WriteFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|source| PersistenceError::WriteFailed {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistenceError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Move a corrupt document aside. Returns `false` if it could not be moved,
/// in which case it must not be overwritten.
fn backup_corrupt(path: &Path) -> bool {
    let backup = backup_path(path);
    match fs::rename(path, &backup) {
        Ok(()) => {
            warn!(backup = %backup.display(), "kept corrupt statistics document");
            true
        }
        Err(e) => {
            warn!(error = %e, "failed to back up corrupt statistics document");
            false
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}
