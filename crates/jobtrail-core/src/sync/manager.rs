//! Remote-first CRUD over the application cache with local fallback.
//!
//! While online, every mutation goes to the API first and the cache is
//! updated only once the server confirms. While offline, or when the API
//! call fails, the mutation is applied to the cache directly and counted as
//! a pending change. Mutations never return an error to the caller.
//!
//! `sync_with_backend` reconciles by fetching the remote list and merging it
//! over the cache with remote-wins-by-id (see `merge_remote_wins`).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::ApplicationsApi;
use crate::cache::{ApplicationCache, SyncMeta};
use crate::models::{
    ApplicationRecord, ApplicationUpdate, NewApplication, RecordSyncStatus,
};
use crate::network::ConnectivityMonitor;
use crate::storage::Storage;

use super::merge_remote_wins;

/// Snapshot of sync state for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub online: bool,
    /// Local-only mutations since the last reconciliation. Counted per
    /// mutation, not per record, so repeated edits to one record add up.
    pub pending_changes: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub is_syncing: bool,
    pub error: Option<String>,
}

/// Result of a reconciliation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Remote list merged into the cache.
    Completed { records: usize },
    /// Another reconciliation or mutation was in flight; nothing was done.
    AlreadySyncing,
    /// Connectivity monitor reports offline; nothing was done.
    Offline,
    /// Fetch failed. The message is also in `SyncStatus::error`.
    Failed(String),
}

struct Inner {
    cache: ApplicationCache,
    meta: SyncMeta,
    error: Option<String>,
}

impl Inner {
    fn persist_meta(&mut self) {
        self.cache.save_sync_meta(&self.meta);
    }

    fn count_pending_change(&mut self) {
        self.meta.pending_changes += 1;
        self.persist_meta();
    }

    fn mark_synced(&mut self) {
        self.meta.last_sync = Some(Utc::now());
        self.persist_meta();
    }

    fn status_of(&self, id: i64) -> RecordSyncStatus {
        self.meta.record_status.get(&id).copied().unwrap_or_default()
    }

    fn set_status(&mut self, id: i64, status: RecordSyncStatus) {
        if status.is_pending() {
            self.meta.record_status.insert(id, status);
        } else {
            self.meta.record_status.remove(&id);
        }
    }

    /// Move any storage failure from the cache into the sync error field.
    fn absorb_cache_error(&mut self) {
        if let Some(e) = self.cache.last_error() {
            self.error = Some(e.to_string());
            self.cache.clear_error();
        }
    }
}

/// Marks an operation in flight for as long as it is held.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SyncManager {
    api: Arc<dyn ApplicationsApi>,
    connectivity: ConnectivityMonitor,
    inner: Mutex<Inner>,
    in_flight: AtomicUsize,
}

impl SyncManager {
    /// Create a manager and load the cache from `storage`.
    pub fn new(
        api: Arc<dyn ApplicationsApi>,
        storage: Box<dyn Storage>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let mut cache = ApplicationCache::new(storage);
        cache.load();
        let meta = cache.load_sync_meta();
        debug!(
            count = cache.len(),
            pending = meta.pending_changes,
            last_sync = ?meta.last_sync,
            unreconciled = meta.record_status.len(),
            "Sync manager initialized"
        );

        let mut inner = Inner {
            cache,
            meta,
            error: None,
        };
        inner.absorb_cache_error();

        Self {
            api,
            connectivity,
            inner: Mutex::new(inner),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    fn enter(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    /// Enter only if nothing else is in flight.
    fn try_enter_exclusive(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    async fn begin_attempt(&self) {
        self.inner.lock().await.error = None;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Applications in cache order.
    pub async fn applications(&self) -> Vec<ApplicationRecord> {
        self.inner.lock().await.cache.records().to_vec()
    }

    pub async fn application(&self, id: i64) -> Option<ApplicationRecord> {
        self.inner.lock().await.cache.get(id).cloned()
    }

    pub async fn status(&self) -> SyncStatus {
        let inner = self.inner.lock().await;
        SyncStatus {
            online: self.connectivity.is_online(),
            pending_changes: inner.meta.pending_changes,
            last_sync: inner.meta.last_sync,
            is_syncing: self.in_flight.load(Ordering::SeqCst) > 0,
            error: inner.error.clone(),
        }
    }

    pub async fn record_status(&self, id: i64) -> RecordSyncStatus {
        self.inner.lock().await.status_of(id)
    }

    /// Number of ids with a local change the server has not confirmed.
    pub async fn unreconciled_count(&self) -> usize {
        self.inner.lock().await.meta.record_status.len()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create an application. Always returns a usable record: the server's
    /// when the create succeeds, otherwise a local one with a temporary id.
    pub async fn add_with_sync(&self, application: NewApplication) -> ApplicationRecord {
        let _in_flight = self.enter();
        self.begin_attempt().await;

        if self.connectivity.is_online() {
            match self.api.create(&application).await {
                Ok(record) => {
                    let mut inner = self.inner.lock().await;
                    inner.cache.add(record.clone());
                    inner.mark_synced();
                    inner.absorb_cache_error();
                    info!(id = ?record.id, "Created application");
                    return record;
                }
                Err(e) => {
                    warn!(error = %e, "Remote create failed, saving locally");
                    self.inner.lock().await.error = Some(format!("Failed to create application: {}", e));
                }
            }
        }

        let mut inner = self.inner.lock().await;
        let id = inner.cache.next_temporary_id();
        let record = application.into_record(id);
        inner.cache.add(record.clone());
        inner.set_status(id, RecordSyncStatus::PendingCreate);
        inner.count_pending_change();
        inner.absorb_cache_error();
        info!(id, pending = inner.meta.pending_changes, "Created application locally");
        record
    }

    /// Apply a partial update. Returns true when the server confirmed it,
    /// false when it was applied locally only (or the id is unknown).
    pub async fn update_with_sync(&self, id: i64, update: ApplicationUpdate) -> bool {
        let _in_flight = self.enter();
        self.begin_attempt().await;

        if self.connectivity.is_online() {
            match self.api.update(id, &update).await {
                Ok(server_record) => {
                    let mut inner = self.inner.lock().await;
                    if server_record.id == Some(id) {
                        inner.cache.replace_record(server_record);
                    } else {
                        inner.cache.apply_partial_update(id, &update);
                    }
                    inner.set_status(id, RecordSyncStatus::Reconciled);
                    inner.mark_synced();
                    inner.absorb_cache_error();
                    info!(id, "Updated application");
                    return true;
                }
                Err(e) => {
                    warn!(id, error = %e, "Remote update failed, applying locally");
                    self.inner.lock().await.error = Some(format!("Failed to update application: {}", e));
                }
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.cache.apply_partial_update(id, &update) {
            let status = inner.status_of(id).after_local_update();
            inner.set_status(id, status);
            inner.count_pending_change();
            info!(id, pending = inner.meta.pending_changes, "Updated application locally");
        }
        inner.absorb_cache_error();
        false
    }

    /// Replace a whole record (matched by its id). Same branching and return
    /// value as `update_with_sync`; the remote call sends every field.
    pub async fn replace_with_sync(&self, record: ApplicationRecord) -> bool {
        let Some(id) = record.id else {
            warn!("Replacement record has no id, ignoring");
            return false;
        };
        let _in_flight = self.enter();
        self.begin_attempt().await;

        if self.connectivity.is_online() {
            let update = ApplicationUpdate::from_record(&record);
            match self.api.update(id, &update).await {
                Ok(server_record) => {
                    let mut inner = self.inner.lock().await;
                    let installed = if server_record.id == Some(id) {
                        server_record
                    } else {
                        record
                    };
                    inner.cache.replace_record(installed);
                    inner.set_status(id, RecordSyncStatus::Reconciled);
                    inner.mark_synced();
                    inner.absorb_cache_error();
                    info!(id, "Replaced application");
                    return true;
                }
                Err(e) => {
                    warn!(id, error = %e, "Remote replace failed, applying locally");
                    self.inner.lock().await.error = Some(format!("Failed to update application: {}", e));
                }
            }
        }

        let mut local = record;
        local.touch();
        let mut inner = self.inner.lock().await;
        if inner.cache.replace_record(local) {
            let status = inner.status_of(id).after_local_update();
            inner.set_status(id, status);
            inner.count_pending_change();
            info!(id, pending = inner.meta.pending_changes, "Replaced application locally");
        }
        inner.absorb_cache_error();
        false
    }

    /// Delete an application. Returns true when the server confirmed it,
    /// false when it was removed locally only (or the id is unknown).
    pub async fn delete_with_sync(&self, id: i64) -> bool {
        let _in_flight = self.enter();
        self.begin_attempt().await;

        if self.connectivity.is_online() {
            match self.api.delete(id).await {
                Ok(()) => {
                    let mut inner = self.inner.lock().await;
                    inner.cache.remove(id);
                    inner.set_status(id, RecordSyncStatus::Reconciled);
                    inner.mark_synced();
                    inner.absorb_cache_error();
                    info!(id, "Deleted application");
                    return true;
                }
                Err(e) => {
                    warn!(id, error = %e, "Remote delete failed, removing locally");
                    self.inner.lock().await.error = Some(format!("Failed to delete application: {}", e));
                }
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.cache.remove(id) {
            // The server never saw a pending create, so there is nothing left to delete
            let status = match inner.status_of(id) {
                RecordSyncStatus::PendingCreate => RecordSyncStatus::Reconciled,
                _ => RecordSyncStatus::PendingDelete,
            };
            inner.set_status(id, status);
            inner.count_pending_change();
            info!(id, pending = inner.meta.pending_changes, "Deleted application locally");
        }
        inner.absorb_cache_error();
        false
    }

    /// Empty the local cache. Pending bookkeeping goes with it; the last
    /// sync time is kept.
    pub async fn clear_local_data(&self) {
        let mut inner = self.inner.lock().await;
        inner.cache.clear();
        inner.meta.record_status.clear();
        inner.meta.pending_changes = 0;
        inner.persist_meta();
        inner.absorb_cache_error();
        info!("Cleared local application cache");
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Fetch the remote list and merge it over the cache, remote winning.
    ///
    /// Dropped (not queued) while anything else is in flight, and refused
    /// while offline. On success the pending counter resets to zero. On
    /// failure the cache and counter are left as they were.
    pub async fn sync_with_backend(&self) -> SyncOutcome {
        let Some(_in_flight) = self.try_enter_exclusive() else {
            debug!("Sync already in progress, skipping");
            return SyncOutcome::AlreadySyncing;
        };
        if !self.connectivity.is_online() {
            debug!("Offline, skipping sync");
            return SyncOutcome::Offline;
        }
        self.begin_attempt().await;
        info!("Starting sync with backend");

        let remote = match self.api.get_all().await {
            Ok(remote) => remote,
            Err(e) => {
                let message = format!("Failed to sync with backend: {}", e);
                warn!(error = %e, "Sync failed");
                self.inner.lock().await.error = Some(message.clone());
                return SyncOutcome::Failed(message);
            }
        };

        let mut inner = self.inner.lock().await;
        let remote_ids: HashSet<i64> = remote.iter().filter_map(|r| r.id).collect();

        for (id, status) in &inner.meta.record_status {
            if remote_ids.contains(id) && *status != RecordSyncStatus::PendingDelete {
                warn!(id, status = %status, "Local change discarded, server copy wins");
            }
        }

        let local = inner.cache.records().to_vec();
        let merged = merge_remote_wins(remote, local);
        let count = merged.len();
        inner.cache.replace_all(merged);

        // Only records that stayed local-only are still unconfirmed
        let Inner { cache, meta, .. } = &mut *inner;
        meta.record_status.retain(|id, _| !remote_ids.contains(id) && cache.contains(*id));

        inner.meta.pending_changes = 0;
        inner.mark_synced();
        inner.absorb_cache_error();
        info!(count, unreconciled = inner.meta.record_status.len(), "Sync complete");
        SyncOutcome::Completed { records: count }
    }

    /// Manual refresh; same as `sync_with_backend`.
    pub async fn force_sync(&self) -> SyncOutcome {
        self.sync_with_backend().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{APPLICATIONS_KEY, PENDING_CHANGES_KEY, RECORD_STATUS_KEY};
    use crate::models::ApplicationStatus;
    use crate::storage::MemoryStorage;
    use crate::sync::test_support::{manager_with, FailingWrites, FakeApi};

    fn engineer() -> NewApplication {
        NewApplication::new("Engineer", "Acme", "2024-03-01")
    }

    fn server_record(id: i64, title: &str, created_at: &str) -> ApplicationRecord {
        let mut r = NewApplication::new(title, "Globex", "2024-01-01").into_record(id);
        r.created_at = Some(created_at.to_string());
        r
    }

    #[tokio::test]
    async fn test_offline_create_uses_temporary_id() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, storage) = manager_with(api.clone(), false);

        let record = manager.add_with_sync(engineer()).await;

        assert!(record.id.is_some());
        assert_eq!(manager.applications().await, vec![record.clone()]);
        let status = manager.status().await;
        assert_eq!(status.pending_changes, 1);
        assert!(status.error.is_none());
        assert_eq!(api.calls(), 0);
        assert_eq!(
            manager.record_status(record.id.unwrap()).await,
            RecordSyncStatus::PendingCreate
        );
        assert_eq!(storage.get(PENDING_CHANGES_KEY).unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_online_create_inserts_server_record() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api.clone(), true);

        let record = manager.add_with_sync(engineer()).await;

        assert_eq!(api.records(), vec![record.clone()]);
        assert_eq!(manager.applications().await, vec![record.clone()]);
        let status = manager.status().await;
        assert_eq!(status.pending_changes, 0);
        assert!(status.last_sync.is_some());
        assert_eq!(
            manager.record_status(record.id.unwrap()).await,
            RecordSyncStatus::Reconciled
        );
    }

    #[tokio::test]
    async fn test_online_create_failure_falls_back_locally() {
        let api = Arc::new(FakeApi::new());
        api.set_failing(true);
        let (manager, _monitor, _storage) = manager_with(api.clone(), true);

        let record = manager.add_with_sync(engineer()).await;

        assert!(record.id.is_some());
        assert_eq!(api.calls(), 1);
        assert!(api.records().is_empty());
        let status = manager.status().await;
        assert_eq!(status.pending_changes, 1);
        assert!(status.last_sync.is_none());
        assert!(status.error.unwrap().contains("connection refused"));
        assert_eq!(manager.applications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_online_confirms_remotely() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api.clone(), true);
        let id = manager.add_with_sync(engineer()).await.id.unwrap();

        let update = ApplicationUpdate {
            status: Some(ApplicationStatus::Interviewing),
            ..Default::default()
        };
        assert!(manager.update_with_sync(id, update).await);

        let cached = manager.application(id).await.unwrap();
        assert_eq!(cached.status, ApplicationStatus::Interviewing);
        assert_eq!(api.records()[0], cached);
        assert_eq!(manager.status().await.pending_changes, 0);
    }

    #[tokio::test]
    async fn test_update_offline_applies_locally() {
        let api = Arc::new(FakeApi::new());
        let (manager, monitor, _storage) = manager_with(api.clone(), true);
        let id = manager.add_with_sync(engineer()).await.id.unwrap();
        monitor.set_online(false);

        let update = ApplicationUpdate {
            notes: Some("Follow up Friday".to_string()),
            ..Default::default()
        };
        assert!(!manager.update_with_sync(id, update.clone()).await);
        assert!(!manager.update_with_sync(id, update).await);

        let cached = manager.application(id).await.unwrap();
        assert_eq!(cached.notes.as_deref(), Some("Follow up Friday"));
        // Counted per mutation, not per record
        assert_eq!(manager.status().await.pending_changes, 2);
        assert_eq!(manager.unreconciled_count().await, 1);
        assert_eq!(manager.record_status(id).await, RecordSyncStatus::PendingUpdate);
        assert!(api.records()[0].notes.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_id_offline_changes_nothing() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api, false);

        assert!(!manager.update_with_sync(404, ApplicationUpdate::default()).await);
        assert_eq!(manager.status().await.pending_changes, 0);
        assert!(manager.applications().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_of_pending_create_stays_pending_create() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api, false);
        let id = manager.add_with_sync(engineer()).await.id.unwrap();

        let update = ApplicationUpdate {
            salary: Some("150k".to_string()),
            ..Default::default()
        };
        manager.update_with_sync(id, update).await;
        assert_eq!(manager.record_status(id).await, RecordSyncStatus::PendingCreate);
    }

    #[tokio::test]
    async fn test_replace_online_and_offline() {
        let api = Arc::new(FakeApi::new());
        let (manager, monitor, _storage) = manager_with(api.clone(), true);
        let mut record = manager.add_with_sync(engineer()).await;
        let id = record.id.unwrap();

        record.job_title = "Senior Engineer".to_string();
        assert!(manager.replace_with_sync(record.clone()).await);
        assert_eq!(api.records()[0].job_title, "Senior Engineer");

        monitor.set_online(false);
        record.company = "Initech".to_string();
        assert!(!manager.replace_with_sync(record).await);
        assert_eq!(manager.application(id).await.unwrap().company, "Initech");
        assert_eq!(manager.status().await.pending_changes, 1);

        let mut no_id = manager.application(id).await.unwrap();
        no_id.id = None;
        assert!(!manager.replace_with_sync(no_id).await);
    }

    #[tokio::test]
    async fn test_delete_online_success() {
        let api = Arc::new(FakeApi::new());
        api.seed(vec![server_record(42, "Doomed", "2024-01-01T00:00:00Z")]);
        let (manager, _monitor, _storage) = manager_with(api.clone(), true);
        manager.sync_with_backend().await;
        let before = manager.status().await;

        assert!(manager.delete_with_sync(42).await);

        assert!(manager.application(42).await.is_none());
        assert!(api.records().is_empty());
        let after = manager.status().await;
        assert_eq!(after.pending_changes, before.pending_changes);
        assert!(after.last_sync >= before.last_sync);
    }

    #[tokio::test]
    async fn test_delete_offline_marks_pending_delete() {
        let api = Arc::new(FakeApi::new());
        api.seed(vec![server_record(42, "Doomed", "2024-01-01T00:00:00Z")]);
        let (manager, monitor, _storage) = manager_with(api.clone(), true);
        manager.sync_with_backend().await;
        monitor.set_online(false);

        assert!(!manager.delete_with_sync(42).await);
        assert!(manager.application(42).await.is_none());
        assert_eq!(manager.status().await.pending_changes, 1);
        assert_eq!(manager.record_status(42).await, RecordSyncStatus::PendingDelete);
        assert_eq!(api.records().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_offline_pending_create_leaves_nothing_unreconciled() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api, false);
        let id = manager.add_with_sync(engineer()).await.id.unwrap();

        manager.delete_with_sync(id).await;
        assert_eq!(manager.unreconciled_count().await, 0);
        assert_eq!(manager.status().await.pending_changes, 2);
    }

    #[tokio::test]
    async fn test_sync_remote_wins_on_shared_id() {
        let api = Arc::new(FakeApi::new());
        let fresh = server_record(5, "Fresh", "2024-02-01T00:00:00Z");
        api.seed(vec![fresh.clone()]);

        let storage = MemoryStorage::new();
        let stale = server_record(5, "Stale", "2024-02-01T00:00:00Z");
        storage
            .set(APPLICATIONS_KEY, &serde_json::to_string(&vec![stale]).unwrap())
            .unwrap();
        let manager = SyncManager::new(api, Box::new(storage), ConnectivityMonitor::new(true));

        assert_eq!(
            manager.sync_with_backend().await,
            SyncOutcome::Completed { records: 1 }
        );
        assert_eq!(manager.applications().await, vec![fresh]);
    }

    #[tokio::test]
    async fn test_sync_keeps_local_only_records_and_resets_counter() {
        let api = Arc::new(FakeApi::new());
        api.seed(vec![server_record(1, "Remote", "2020-01-01T00:00:00Z")]);
        let (manager, monitor, _storage) = manager_with(api.clone(), false);
        let local = manager.add_with_sync(engineer()).await;
        monitor.set_online(true);

        let outcome = manager.sync_with_backend().await;

        assert_eq!(outcome, SyncOutcome::Completed { records: 2 });
        let ids: Vec<_> = manager.applications().await.iter().map(|r| r.id).collect();
        // Newest first: the local record was created just now
        assert_eq!(ids, vec![local.id, Some(1)]);
        let status = manager.status().await;
        assert_eq!(status.pending_changes, 0);
        assert!(status.last_sync.is_some());
        // The offline create was never sent, so it is still unconfirmed
        assert_eq!(
            manager.record_status(local.id.unwrap()).await,
            RecordSyncStatus::PendingCreate
        );
    }

    #[tokio::test]
    async fn test_sync_refused_offline() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api.clone(), false);
        assert_eq!(manager.sync_with_backend().await, SyncOutcome::Offline);
        assert_eq!(manager.force_sync().await, SyncOutcome::Offline);
        assert_eq!(api.calls(), 0);
        assert!(!manager.status().await.is_syncing);
    }

    #[tokio::test]
    async fn test_sync_failure_leaves_state_untouched() {
        let api = Arc::new(FakeApi::new());
        let (manager, monitor, _storage) = manager_with(api.clone(), false);
        manager.add_with_sync(engineer()).await;
        let before = manager.applications().await;
        monitor.set_online(true);
        api.set_failing(true);

        let outcome = manager.force_sync().await;

        assert!(matches!(outcome, SyncOutcome::Failed(ref m) if m.starts_with("Failed to sync with backend")));
        let status = manager.status().await;
        assert_eq!(status.pending_changes, 1);
        assert!(status.last_sync.is_none());
        assert!(status.error.unwrap().starts_with("Failed to sync with backend"));
        assert_eq!(manager.applications().await, before);

        // The next attempt clears the error
        api.set_failing(false);
        manager.force_sync().await;
        assert!(manager.status().await.error.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_sync_is_dropped() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api.clone(), true);

        let gate = api.get_all_gate.lock().await;
        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.sync_with_backend().await }
        });
        while !manager.status().await.is_syncing {
            tokio::task::yield_now().await;
        }

        assert_eq!(manager.sync_with_backend().await, SyncOutcome::AlreadySyncing);
        drop(gate);

        assert_eq!(first.await.unwrap(), SyncOutcome::Completed { records: 0 });
        assert_eq!(api.calls(), 1);
        assert!(!manager.status().await.is_syncing);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, storage) = manager_with(api.clone(), false);
        let record = manager.add_with_sync(engineer()).await;
        drop(manager);

        let id = record.id.unwrap();
        let reopened = SyncManager::new(api, Box::new(storage), ConnectivityMonitor::new(false));
        assert_eq!(reopened.applications().await, vec![record]);
        assert_eq!(reopened.status().await.pending_changes, 1);
        assert_eq!(reopened.record_status(id).await, RecordSyncStatus::PendingCreate);
        assert_eq!(reopened.unreconciled_count().await, 1);
    }

    #[tokio::test]
    async fn test_clear_local_data_resets_pending() {
        let api = Arc::new(FakeApi::new());
        let (manager, _monitor, _storage) = manager_with(api, false);
        manager.add_with_sync(engineer()).await;

        manager.clear_local_data().await;
        assert!(manager.applications().await.is_empty());
        assert_eq!(manager.status().await.pending_changes, 0);
        assert_eq!(manager.unreconciled_count().await, 0);
    }

    #[tokio::test]
    async fn test_pending_delete_survives_restart_and_clears_on_sync() {
        let api = Arc::new(FakeApi::new());
        api.seed(vec![server_record(42, "Doomed", "2024-01-01T00:00:00Z")]);
        let (manager, monitor, storage) = manager_with(api.clone(), true);
        manager.sync_with_backend().await;
        monitor.set_online(false);
        manager.delete_with_sync(42).await;
        drop(manager);

        let monitor = ConnectivityMonitor::new(true);
        let reopened = SyncManager::new(api, Box::new(storage.clone()), monitor);
        assert_eq!(reopened.record_status(42).await, RecordSyncStatus::PendingDelete);

        // The server still has the record, so the tag is dropped with the merge
        reopened.sync_with_backend().await;
        assert_eq!(reopened.unreconciled_count().await, 0);
        assert_eq!(storage.get(RECORD_STATUS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_storage_write_failure_reaches_status() {
        let api = Arc::new(FakeApi::new());
        let manager = SyncManager::new(
            api,
            Box::new(FailingWrites::default()),
            ConnectivityMonitor::new(false),
        );

        let record = manager.add_with_sync(engineer()).await;

        let status = manager.status().await;
        assert!(status.error.unwrap().contains("disk full"));
        assert_eq!(manager.applications().await, vec![record]);
        assert_eq!(status.pending_changes, 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_reaches_status() {
        let api = Arc::new(FakeApi::new());
        let storage = MemoryStorage::new();
        storage.set(APPLICATIONS_KEY, "[{\"id\": 1,").unwrap();

        let manager = SyncManager::new(api, Box::new(storage), ConnectivityMonitor::new(false));

        let error = manager.status().await.error.unwrap();
        assert!(error.starts_with("Failed to load cached applications"));
        assert!(manager.applications().await.is_empty());
    }
}
