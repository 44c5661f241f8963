use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{ApplicationStatus, InterviewStage};

/// Current time in the format used for `created_at` / `updated_at`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a record timestamp.
///
/// Accepts RFC 3339 and the zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` form some
/// backends emit (read as UTC). Anything else is `None`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// One job application.
///
/// `id` is `None` until the record is persisted. Records created while
/// offline carry a temporary id derived from the clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ApplicationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub job_title: String,
    pub company: String,
    pub date_applied: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub interview_stage: InterviewStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ApplicationRecord {
    pub fn created_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn updated_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(parse_timestamp)
    }

    pub fn has_referral(&self) -> bool {
        self.referrer_name.is_some()
    }

    /// "Job Title @ Company" for list views
    pub fn display_name(&self) -> String {
        format!("{} @ {}", self.job_title, self.company)
    }

    /// Refresh `updated_at` after a local mutation.
    pub fn touch(&mut self) {
        self.updated_at = Some(now_timestamp());
    }
}

/// Fields submitted when creating an application. The server assigns id and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewApplication {
    pub job_title: String,
    pub company: String,
    pub date_applied: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub interview_stage: InterviewStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_notes: Option<String>,
}

impl NewApplication {
    pub fn new(
        job_title: impl Into<String>,
        company: impl Into<String>,
        date_applied: impl Into<String>,
    ) -> Self {
        Self {
            job_title: job_title.into(),
            company: company.into(),
            date_applied: date_applied.into(),
            status: ApplicationStatus::default(),
            interview_stage: InterviewStage::default(),
            description: None,
            location: None,
            salary: None,
            url: None,
            date_posted: None,
            notes: None,
            referrer_name: None,
            referral_relationship: None,
            referral_date: None,
            referral_notes: None,
        }
    }

    /// Build a local record with the given id, stamping both timestamps now.
    pub fn into_record(self, id: i64) -> ApplicationRecord {
        let now = now_timestamp();
        ApplicationRecord {
            id: Some(id),
            job_title: self.job_title,
            company: self.company,
            date_applied: self.date_applied,
            status: self.status,
            interview_stage: self.interview_stage,
            description: self.description,
            location: self.location,
            salary: self.salary,
            url: self.url,
            date_posted: self.date_posted,
            notes: self.notes,
            referrer_name: self.referrer_name,
            referral_relationship: self.referral_relationship,
            referral_date: self.referral_date,
            referral_notes: self.referral_notes,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ApplicationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_applied: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_stage: Option<InterviewStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_notes: Option<String>,
}

impl ApplicationUpdate {
    /// An update carrying every field of `record`, used to push a full
    /// replacement through the partial-update endpoint.
    pub fn from_record(record: &ApplicationRecord) -> Self {
        Self {
            job_title: Some(record.job_title.clone()),
            company: Some(record.company.clone()),
            date_applied: Some(record.date_applied.clone()),
            // Unrecognized server values are left for the server to keep
            status: Some(record.status).filter(|s| *s != ApplicationStatus::Unknown),
            interview_stage: Some(record.interview_stage)
                .filter(|s| *s != InterviewStage::Unknown),
            description: record.description.clone(),
            location: record.location.clone(),
            salary: record.salary.clone(),
            url: record.url.clone(),
            date_posted: record.date_posted.clone(),
            notes: record.notes.clone(),
            referrer_name: record.referrer_name.clone(),
            referral_relationship: record.referral_relationship.clone(),
            referral_date: record.referral_date.clone(),
            referral_notes: record.referral_notes.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merge the provided fields over `record`. Timestamps are the
    /// caller's concern.
    pub fn apply_to(&self, record: &mut ApplicationRecord) {
        fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn merge_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        merge(&mut record.job_title, &self.job_title);
        merge(&mut record.company, &self.company);
        merge(&mut record.date_applied, &self.date_applied);
        merge(&mut record.status, &self.status);
        merge(&mut record.interview_stage, &self.interview_stage);
        merge_opt(&mut record.description, &self.description);
        merge_opt(&mut record.location, &self.location);
        merge_opt(&mut record.salary, &self.salary);
        merge_opt(&mut record.url, &self.url);
        merge_opt(&mut record.date_posted, &self.date_posted);
        merge_opt(&mut record.notes, &self.notes);
        merge_opt(&mut record.referrer_name, &self.referrer_name);
        merge_opt(&mut record.referral_relationship, &self.referral_relationship);
        merge_opt(&mut record.referral_date, &self.referral_date);
        merge_opt(&mut record.referral_notes, &self.referral_notes);
    }
}
