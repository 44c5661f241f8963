//! In-memory stand-in for the applications API, shared by the sync tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::api::{ApiError, ApplicationsApi};
use crate::models::{ApplicationRecord, ApplicationUpdate, NewApplication};
use crate::network::ConnectivityMonitor;
use crate::storage::{MemoryStorage, Storage};

use super::SyncManager;

/// First id handed out by the fake server.
const FIRST_SERVER_ID: i64 = 1000;

pub struct FakeApi {
    records: Mutex<Vec<ApplicationRecord>>,
    next_id: AtomicI64,
    failing: AtomicBool,
    calls: AtomicUsize,
    /// Held by a test to park `get_all` mid-flight.
    pub get_all_gate: tokio::sync::Mutex<()>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(FIRST_SERVER_ID),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            get_all_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn seed(&self, records: Vec<ApplicationRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn records(&self) -> Vec<ApplicationRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationsApi for FakeApi {
    async fn get_all(&self) -> Result<Vec<ApplicationRecord>> {
        self.begin_call()?;
        let _gate = self.get_all_gate.lock().await;
        Ok(self.records())
    }

    async fn create(&self, application: &NewApplication) -> Result<ApplicationRecord> {
        self.begin_call()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = application.clone().into_record(id);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, update: &ApplicationUpdate) -> Result<ApplicationRecord> {
        self.begin_call()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("application {}", id)))?;
        update.apply_to(record);
        record.touch();
        Ok(record.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.begin_call()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != Some(id));
        if records.len() == before {
            return Err(ApiError::NotFound(format!("application {}", id)).into());
        }
        Ok(())
    }
}

/// Storage that reads normally but refuses every write.
#[derive(Default)]
pub struct FailingWrites {
    inner: MemoryStorage,
}

impl Storage for FailingWrites {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("disk full"))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

/// A manager over fresh in-memory storage. Returns the storage handle so
/// tests can inspect what was persisted.
pub fn manager_with(
    api: Arc<FakeApi>,
    online: bool,
) -> (Arc<SyncManager>, ConnectivityMonitor, MemoryStorage) {
    let storage = MemoryStorage::new();
    let monitor = ConnectivityMonitor::new(online);
    let manager = SyncManager::new(api, Box::new(storage.clone()), monitor.clone());
    (Arc::new(manager), monitor, storage)
}
