//! Flat key-value persistence for the local cache.
//!
//! The cache stores three entries: the application list, the pending change
//! count, and the last sync time. `FileStorage` keeps each entry in its own
//! file under the cache directory; `MemoryStorage` keeps them in process.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;

/// String key-value store backing the application cache.
pub trait Storage: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}
