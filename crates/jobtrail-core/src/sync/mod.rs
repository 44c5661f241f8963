//! Synchronization between the local cache and the remote API.
//!
//! - `SyncManager`: remote-first mutations with offline fallback, plus
//!   reconciliation
//! - `merge_remote_wins`: the reconciliation merge
//! - `AutoSync`: reconciles whenever connectivity comes back

pub mod auto;
pub mod manager;
pub mod merge;

#[cfg(test)]
mod test_support;

pub use auto::AutoSync;
pub use manager::{SyncManager, SyncOutcome, SyncStatus};
pub use merge::merge_remote_wins;
