//! Local cache of job applications.
//!
//! The `ApplicationCache` owns the in-memory application list and writes it
//! through to a `Storage` backend after every mutation. It also persists the
//! sync state: pending change count, last sync time and per-record tags.
//!
//! Persistence failures are recorded and logged but never undo the in-memory
//! change.

pub mod manager;

pub use manager::{
    ApplicationCache, SyncMeta, APPLICATIONS_KEY, LAST_SYNC_KEY, PENDING_CHANGES_KEY,
    RECORD_STATUS_KEY,
};
