//! Core library for jobtrail.
//!
//! Keeps a local cache of job applications and mirrors it to a remote REST
//! API. Mutations go remote-first while online and fall back to local-only
//! changes (counted as pending) when offline or when the API call fails.
//! Reconnecting triggers a reconciliation that merges the remote list into
//! the cache, remote records winning on id collisions.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod network;
pub mod storage;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError, ApplicationsApi};
pub use cache::{ApplicationCache, SyncMeta};
pub use config::Config;
pub use models::{
    ApplicationRecord, ApplicationStatus, ApplicationUpdate, InterviewStage, NewApplication,
    RecordSyncStatus,
};
pub use network::{ConnectivityEvent, ConnectivityMonitor};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use sync::{merge_remote_wins, AutoSync, SyncManager, SyncOutcome, SyncStatus};
