use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Where an application stands with the employer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Screening,
    Interviewing,
    Offer,
    Accepted,
    Rejected,
    Withdrawn,
    /// Any status string this build does not know. Never sent back to the
    /// server.
    #[serde(other)]
    Unknown,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Screening,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Offer,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    /// Wire name, as the API sends it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Screening => "screening",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Unknown => "unknown",
        }
    }

    /// True once the application can no longer move forward.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationStatus::Applied => write!(f, "Applied"),
            ApplicationStatus::Screening => write!(f, "Screening"),
            ApplicationStatus::Interviewing => write!(f, "Interviewing"),
            ApplicationStatus::Offer => write!(f, "Offer"),
            ApplicationStatus::Accepted => write!(f, "Accepted"),
            ApplicationStatus::Rejected => write!(f, "Rejected"),
            ApplicationStatus::Withdrawn => write!(f, "Withdrawn"),
            ApplicationStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    /// Accepts the wire name or the display name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| {
                status.as_str().eq_ignore_ascii_case(wanted)
                    || status.to_string().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| anyhow!("Unknown application status: {}", s))
    }
}

/// How far the interview process has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum InterviewStage {
    #[default]
    NotStarted,
    PhoneScreen,
    Technical,
    Onsite,
    FinalRound,
    Completed,
    /// Any stage string this build does not know. Never sent back to the
    /// server.
    #[serde(other)]
    Unknown,
}

impl InterviewStage {
    pub const ALL: [InterviewStage; 6] = [
        InterviewStage::NotStarted,
        InterviewStage::PhoneScreen,
        InterviewStage::Technical,
        InterviewStage::Onsite,
        InterviewStage::FinalRound,
        InterviewStage::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStage::NotStarted => "not_started",
            InterviewStage::PhoneScreen => "phone_screen",
            InterviewStage::Technical => "technical",
            InterviewStage::Onsite => "onsite",
            InterviewStage::FinalRound => "final_round",
            InterviewStage::Completed => "completed",
            InterviewStage::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InterviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterviewStage::NotStarted => write!(f, "Not Started"),
            InterviewStage::PhoneScreen => write!(f, "Phone Screen"),
            InterviewStage::Technical => write!(f, "Technical"),
            InterviewStage::Onsite => write!(f, "Onsite"),
            InterviewStage::FinalRound => write!(f, "Final Round"),
            InterviewStage::Completed => write!(f, "Completed"),
            InterviewStage::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for InterviewStage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|stage| {
                stage.as_str().eq_ignore_ascii_case(wanted)
                    || stage.to_string().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| anyhow!("Unknown interview stage: {}", s))
    }
}

/// Whether a cached record has been confirmed by the server.
///
/// Tracked per record id by the sync manager. A record with no entry is
/// `Reconciled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum RecordSyncStatus {
    #[default]
    Reconciled,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
}

impl RecordSyncStatus {
    pub fn is_pending(&self) -> bool {
        !matches!(self, RecordSyncStatus::Reconciled)
    }

    /// Status after another local-only update lands on a record.
    /// A record the server has never seen stays a pending create.
    pub fn after_local_update(self) -> Self {
        match self {
            RecordSyncStatus::PendingCreate => RecordSyncStatus::PendingCreate,
            _ => RecordSyncStatus::PendingUpdate,
        }
    }
}

impl fmt::Display for RecordSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSyncStatus::Reconciled => write!(f, "synced"),
            RecordSyncStatus::PendingCreate => write!(f, "pending create"),
            RecordSyncStatus::PendingUpdate => write!(f, "pending update"),
            RecordSyncStatus::PendingDelete => write!(f, "pending delete"),
        }
    }
}
