//! Contact Scanner
//!
//! Walks the contact list one contact at a time, fetching each contact's most
//! recent messages and recording when they last talked. The automation session
//! serves one request at a time, so contacts are never fetched concurrently.

use super::types::{ContactResult, ProgressEvent};
use crate::config::ScanConfig;
use crate::error::SessionError;
use crate::session::{Contact, Message, MessagingSession};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum number of contacts to process (input order is kept)
    pub limit: usize,
    /// How many recent messages to request per chat
    pub message_fetch_limit: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            limit: 1000,
            message_fetch_limit: 100,
        }
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            limit: config.contact_limit,
            message_fetch_limit: config.message_fetch_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Per-contact results, in input order
    pub results: Vec<ContactResult>,
    /// Number of contacts selected for scanning (after truncation)
    pub total: usize,
    pub cancelled: bool,
}

/// Latest timestamp among `messages`, as UTC.
fn latest_timestamp(messages: &[Message]) -> Option<DateTime<Utc>> {
    messages
        .iter()
        .map(|m| m.timestamp)
        .max()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

async fn recent_messages(
    session: &dyn MessagingSession,
    chat_id: &str,
    limit: usize,
) -> Result<Vec<Message>, SessionError> {
    session.sync_history(chat_id).await?;
    session.fetch_messages(chat_id, limit).await
}

/// Scan up to `options.limit` contacts sequentially.
///
/// `on_progress` fires once per contact, in index order, before that contact's
/// fetch starts. A failing contact is recorded with its error and the scan moves
/// on. Cancellation is honoured between contacts and during a fetch; the
/// report then holds whatever finished.
pub async fn scan<F>(
    session: &dyn MessagingSession,
    mut contacts: Vec<Contact>,
    options: &ScanOptions,
    mut on_progress: F,
    cancel: &CancellationToken,
) -> ScanReport
where
    F: FnMut(ProgressEvent),
{
    if contacts.len() > options.limit {
        tracing::info!(
            "Scan: limiting {} contacts to the first {}",
            contacts.len(),
            options.limit
        );
        contacts.truncate(options.limit);
    }

    let total = contacts.len();
    let mut results = Vec::with_capacity(total);
    let mut cancelled = false;

    for (index, contact) in contacts.iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let name = contact.display_name();
        on_progress(ProgressEvent::new(index, total));

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            fetched = recent_messages(session, &contact.id, options.message_fetch_limit) => fetched,
        };

        let result = match fetched {
            Ok(messages) => match latest_timestamp(&messages) {
                Some(date) => ContactResult::active(contact, name, date, messages.len()),
                None => ContactResult::no_history(contact, name),
            },
            Err(e) => {
                tracing::warn!("Scan: failed to read messages for {}: {}", name, e);
                ContactResult::failed(contact, name, e.to_string())
            }
        };
        results.push(result);
    }

    if cancelled {
        tracing::info!("Scan: cancelled after {}/{} contacts", results.len(), total);
    } else {
        tracing::info!("Scan: finished {} contacts", total);
    }

    ScanReport {
        results,
        total,
        cancelled,
    }
}
