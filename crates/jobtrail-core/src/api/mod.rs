//! REST API client module for the applications backend.
//!
//! `ApplicationsApi` is the seam the sync manager talks to; `ApiClient`
//! implements it over HTTP. Authentication is handled elsewhere: the client
//! only forwards a bearer token when one is configured.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ApplicationRecord, ApplicationUpdate, NewApplication};

/// Remote CRUD over application records.
///
/// Any method may fail with a transport or server error. Callers in this
/// crate treat all failures alike.
#[async_trait]
pub trait ApplicationsApi: Send + Sync {
    async fn get_all(&self) -> Result<Vec<ApplicationRecord>>;

    /// Create a record. The server assigns id, `created_at` and `updated_at`.
    async fn create(&self, application: &NewApplication) -> Result<ApplicationRecord>;

    async fn update(&self, id: i64, update: &ApplicationUpdate) -> Result<ApplicationRecord>;

    async fn delete(&self, id: i64) -> Result<()>;
}
