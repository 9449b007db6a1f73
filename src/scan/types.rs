use crate::session::Contact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of scanning one contact.
///
/// Exactly one terminal status applies: `date` set (has history), `error` set
/// (fetch failed), or neither (no history). `message_count` is `0` for the
/// no-history case and absent on error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResult {
    pub name: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    Active,
    NoHistory,
    Failed,
}

impl ContactResult {
    fn base(contact: &Contact, name: String) -> Self {
        Self {
            name,
            date: None,
            message_count: None,
            id: Some(contact.id.clone()),
            number: contact.number.clone(),
            error: None,
        }
    }

    pub fn active(contact: &Contact, name: String, date: DateTime<Utc>, count: usize) -> Self {
        Self {
            date: Some(date),
            message_count: Some(count),
            ..Self::base(contact, name)
        }
    }

    pub fn no_history(contact: &Contact, name: String) -> Self {
        Self {
            message_count: Some(0),
            ..Self::base(contact, name)
        }
    }

    pub fn failed(contact: &Contact, name: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::base(contact, name)
        }
    }

    pub fn status(&self) -> ContactStatus {
        match (&self.date, &self.error) {
            (_, Some(_)) => ContactStatus::Failed,
            (Some(_), None) => ContactStatus::Active,
            (None, None) => ContactStatus::NoHistory,
        }
    }
}

/// Fractional completion of a scan, emitted once per contact before its fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub total_count: usize,
    pub current_index: usize,
    /// e.g. `"25.00%"`
    pub percentage_complete: String,
}

impl ProgressEvent {
    pub fn new(current_index: usize, total_count: usize) -> Self {
        let pct = if total_count == 0 {
            100.0
        } else {
            (current_index + 1) as f64 / total_count as f64 * 100.0
        };
        Self {
            total_count,
            current_index,
            // Half-up at the second decimal: 3.125 is "3.13%".
            percentage_complete: format!("{:.2}%", (pct * 100.0).round() / 100.0),
        }
    }
}
