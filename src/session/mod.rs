//! Messaging Session
//!
//! Capability interface for the WhatsApp Web client. The client itself (the
//! headless browser, authentication, wire protocol) lives outside this crate;
//! every connection talks to it through a [`MessagingSession`].

pub mod bridge;
#[cfg(test)]
pub(crate) mod mock;

pub use bridge::{BridgeSession, BridgeSessionFactory};

use crate::error::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type Result<T> = std::result::Result<T, SessionError>;

/// A contact as reported by the messaging client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Opaque contact identifier (e.g. `15551234567@c.us`)
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
    /// Name saved in the user's address book
    #[serde(default)]
    pub name: Option<String>,
    /// Name the contact set for themselves
    #[serde(default)]
    pub pushname: Option<String>,
}

impl Contact {
    /// Address-book name, then pushname, then raw number. Falls back to the id
    /// when the client reports none of them.
    pub fn display_name(&self) -> String {
        [&self.name, &self.pushname, &self.number]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A message, reduced to what the scan needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    /// Unix epoch seconds
    pub timestamp: i64,
    #[serde(default)]
    pub from_me: Option<bool>,
}

/// Lifecycle events pushed by a session after `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login QR code is available (or was refreshed)
    Qr(String),
    Authenticated,
    /// The client finished connecting and can serve queries
    Ready,
    Disconnected(String),
}

/// One automated messaging connection.
#[async_trait]
pub trait MessagingSession: Send + Sync {
    /// Start the client. Lifecycle events are delivered on `events` until the
    /// session is destroyed or disconnects.
    async fn initialize(&self, events: mpsc::UnboundedSender<SessionEvent>) -> Result<()>;

    async fn contacts(&self) -> Result<Vec<Contact>>;

    async fn chats(&self) -> Result<Vec<ChatSummary>>;

    /// Ask the client to pull older history for a chat.
    async fn sync_history(&self, chat_id: &str) -> Result<()>;

    /// Fetch up to `limit` of the chat's most recent messages.
    async fn fetch_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Tear the client down. Must be safe to call more than once.
    async fn destroy(&self);
}

/// Creates an independent session for each UI connection.
pub trait SessionFactory: Send + Sync {
    fn create(&self, connection_id: &str) -> Arc<dyn MessagingSession>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_saved_name() {
        let contact = Contact {
            id: "1@c.us".into(),
            number: Some("1".into()),
            name: Some("Alice".into()),
            pushname: Some("ali".into()),
        };
        assert_eq!(contact.display_name(), "Alice");
    }

    #[test]
    fn test_display_name_falls_back_to_pushname_then_number() {
        let mut contact = Contact {
            id: "1@c.us".into(),
            number: Some("15551234567".into()),
            name: None,
            pushname: Some("ali".into()),
        };
        assert_eq!(contact.display_name(), "ali");

        contact.pushname = Some("  ".into());
        assert_eq!(contact.display_name(), "15551234567");

        contact.number = None;
        assert_eq!(contact.display_name(), "1@c.us");
    }

    #[test]
    fn test_message_from_bridge_json() {
        let msg: Message =
            serde_json::from_str(r#"{"id":"m1","timestamp":1700000000,"fromMe":true}"#).unwrap();
        assert_eq!(msg.timestamp, 1_700_000_000);
        assert_eq!(msg.from_me, Some(true));

        let bare: Message = serde_json::from_str(r#"{"timestamp":5}"#).unwrap();
        assert_eq!(bare.id, None);
    }
}
