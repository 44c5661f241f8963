//! Data models for job applications.
//!
//! - `ApplicationRecord`: one job application as stored locally and remotely
//! - `NewApplication`: fields submitted to create an application
//! - `ApplicationUpdate`: a partial update merged over an existing record
//! - `ApplicationStatus`, `InterviewStage`: enumerated string fields
//! - `RecordSyncStatus`: whether a record is confirmed by the server

pub mod application;
pub mod status;

pub use application::{now_timestamp, parse_timestamp, ApplicationRecord, ApplicationUpdate, NewApplication};
pub use status::{ApplicationStatus, InterviewStage, RecordSyncStatus};
