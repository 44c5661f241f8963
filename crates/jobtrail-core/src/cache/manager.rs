use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{ApplicationRecord, ApplicationUpdate, RecordSyncStatus};
use crate::storage::Storage;

/// Storage key for the application list.
pub const APPLICATIONS_KEY: &str = "applications";

/// Storage key for the pending change counter (decimal text).
pub const PENDING_CHANGES_KEY: &str = "pending_changes";

/// Storage key for the last successful sync time (RFC 3339 text).
pub const LAST_SYNC_KEY: &str = "last_sync";

/// Storage key for the per-record sync tags (JSON object keyed by id).
pub const RECORD_STATUS_KEY: &str = "record_status";

/// Sync state persisted next to the application list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMeta {
    pub pending_changes: u64,
    pub last_sync: Option<DateTime<Utc>>,
    /// Ids with a local change the server has not confirmed. Reconciled ids
    /// have no entry.
    pub record_status: HashMap<i64, RecordSyncStatus>,
}

pub struct ApplicationCache {
    storage: Box<dyn Storage>,
    records: Vec<ApplicationRecord>,
    // Saves are suppressed until the stored list has been read
    loaded: bool,
    last_error: Option<String>,
}

impl ApplicationCache {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            records: Vec::new(),
            loaded: false,
            last_error: None,
        }
    }

    /// Read the stored list into memory.
    ///
    /// A missing entry is an empty list. A read or parse failure also yields
    /// an empty list, with the error kept in `last_error`.
    pub fn load(&mut self) -> &[ApplicationRecord] {
        self.records = match self.read_records() {
            Ok(records) => {
                debug!(count = records.len(), "Loaded applications from cache");
                records
            }
            Err(e) => {
                warn!(error = %e, "Failed to load cached applications, starting empty");
                self.last_error = Some(format!("Failed to load cached applications: {}", e));
                Vec::new()
            }
        };
        self.loaded = true;
        &self.records
    }

    fn read_records(&self) -> Result<Vec<ApplicationRecord>> {
        match self.storage.get(APPLICATIONS_KEY)? {
            Some(contents) => {
                serde_json::from_str(&contents).context("Failed to parse cached applications")
            }
            None => Ok(Vec::new()),
        }
    }

    /// Write the full list. Returns false when nothing was persisted, either
    /// because the initial load has not run or because the write failed.
    pub fn save(&mut self) -> bool {
        if !self.loaded {
            debug!("Cache not loaded yet, skipping save");
            return false;
        }

        let result = serde_json::to_string_pretty(&self.records)
            .context("Failed to serialize applications")
            .and_then(|contents| self.storage.set(APPLICATIONS_KEY, &contents));

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist applications");
                self.last_error = Some(format!("Failed to save applications: {}", e));
                false
            }
        }
    }

    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn get(&self, id: i64) -> Option<&ApplicationRecord> {
        self.records.iter().find(|r| r.id == Some(id))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent load or save failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Append a record. A record whose id is already cached replaces the
    /// existing entry in place so ids stay unique.
    pub fn add(&mut self, record: ApplicationRecord) {
        let existing = record
            .id
            .and_then(|id| self.records.iter().position(|r| r.id == Some(id)));

        match existing {
            Some(index) => {
                warn!(id = ?record.id, "Added record id already cached, replacing");
                self.records[index] = record;
            }
            None => self.records.push(record),
        }
        self.save();
    }

    /// Merge `update` onto the record with `id` and refresh its `updated_at`.
    /// Returns false (list unchanged) if no record has that id.
    pub fn apply_partial_update(&mut self, id: i64, update: &ApplicationUpdate) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.id == Some(id)) else {
            debug!(id, "Partial update for unknown id ignored");
            return false;
        };

        update.apply_to(record);
        record.touch();
        self.save();
        true
    }

    /// Replace the stored record with the same id outright.
    /// Returns false if `record` has no id or no cached record matches.
    pub fn replace_record(&mut self, record: ApplicationRecord) -> bool {
        let Some(id) = record.id else {
            return false;
        };
        let Some(slot) = self.records.iter_mut().find(|r| r.id == Some(id)) else {
            debug!(id, "Replacement for unknown id ignored");
            return false;
        };

        *slot = record;
        self.save();
        true
    }

    /// Remove the record with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != Some(id));
        let removed = self.records.len() != before;
        if removed {
            self.save();
        }
        removed
    }

    /// Install a reconciled list wholesale.
    pub fn replace_all(&mut self, records: Vec<ApplicationRecord>) {
        self.records = records;
        self.save();
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.save();
    }

    /// Read the persisted sync state. Missing or corrupt values fall back
    /// to zero pending changes, no last sync and no pending records.
    pub fn load_sync_meta(&mut self) -> SyncMeta {
        let pending_changes: u64 = match self.storage.get(PENDING_CHANGES_KEY) {
            Ok(Some(text)) => text.trim().parse().unwrap_or_else(|_| {
                warn!(value = %text, "Ignoring corrupt pending change count");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "Failed to read pending change count");
                self.last_error = Some(format!("Failed to load sync state: {}", e));
                0
            }
        };

        let last_sync = match self.storage.get(LAST_SYNC_KEY) {
            Ok(Some(text)) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read last sync time");
                self.last_error = Some(format!("Failed to load sync state: {}", e));
                None
            }
        };

        let record_status = match self.storage.get(RECORD_STATUS_KEY) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring corrupt record sync status");
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read record sync status");
                self.last_error = Some(format!("Failed to load sync state: {}", e));
                HashMap::new()
            }
        };

        SyncMeta {
            pending_changes,
            last_sync,
            record_status,
        }
    }

    /// Persist the sync state. Failures are recorded like list saves.
    pub fn save_sync_meta(&mut self, meta: &SyncMeta) -> bool {
        let result = self
            .storage
            .set(PENDING_CHANGES_KEY, &meta.pending_changes.to_string())
            .and_then(|()| match meta.last_sync {
                Some(ts) => self.storage.set(LAST_SYNC_KEY, &ts.to_rfc3339()),
                None => self.storage.remove(LAST_SYNC_KEY),
            })
            .and_then(|()| {
                if meta.record_status.is_empty() {
                    self.storage.remove(RECORD_STATUS_KEY)
                } else {
                    serde_json::to_string(&meta.record_status)
                        .context("Failed to serialize record sync status")
                        .and_then(|json| self.storage.set(RECORD_STATUS_KEY, &json))
                }
            });

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist sync state");
                self.last_error = Some(format!("Failed to save sync state: {}", e));
                false
            }
        }
    }

    /// Temporary id for a record created without the server: the current
    /// time in milliseconds, bumped until no cached record uses it.
    pub fn next_temporary_id(&self) -> i64 {
        let mut id = Utc::now().timestamp_millis();
        while self.contains(id) {
            id += 1;
        }
        id
    }
}

// ============================================================================
// Tests
// ============================================================================
