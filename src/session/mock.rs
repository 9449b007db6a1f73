//! Scripted session for tests.

use super::{ChatSummary, Contact, Message, MessagingSession, Result, SessionEvent, SessionFactory};
use crate::error::SessionError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Outcome of a scripted message fetch.
#[derive(Debug, Clone)]
pub enum FetchScript {
    Messages(Vec<i64>),
    Fail(String),
}

/// A `MessagingSession` driven entirely by a script.
///
/// Chat counts are served from a queue; once it drains, the last value
/// repeats. Every call is appended to `calls` so tests can assert ordering.
#[derive(Default)]
pub struct MockSession {
    pub events: Vec<SessionEvent>,
    pub contacts: Vec<Contact>,
    pub contacts_error: Option<String>,
    pub chat_counts: Mutex<VecDeque<usize>>,
    pub chats_error: Option<String>,
    pub fetches: HashMap<String, FetchScript>,
    pub calls: Arc<Mutex<Vec<String>>>,
    last_count: Mutex<usize>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: Vec<SessionEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_chat_counts(self, counts: &[usize]) -> Self {
        *self.chat_counts.lock().unwrap() = counts.iter().copied().collect();
        self
    }

    pub fn with_contact(mut self, id: &str, name: &str, fetch: FetchScript) -> Self {
        self.contacts.push(Contact {
            id: id.to_string(),
            number: Some(id.trim_end_matches("@c.us").to_string()),
            name: Some(name.to_string()),
            pushname: None,
        });
        self.fetches.insert(id.to_string(), fetch);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessagingSession for MockSession {
    async fn initialize(&self, events: mpsc::UnboundedSender<SessionEvent>) -> Result<()> {
        self.record("initialize".to_string());
        for event in &self.events {
            let _ = events.send(event.clone());
        }
        Ok(())
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        self.record("contacts".to_string());
        match &self.contacts_error {
            Some(e) => Err(SessionError::Client(e.clone())),
            None => Ok(self.contacts.clone()),
        }
    }

    async fn chats(&self) -> Result<Vec<ChatSummary>> {
        if let Some(e) = &self.chats_error {
            return Err(SessionError::Bridge {
                status: 500,
                body: e.clone(),
            });
        }
        let mut last = self.last_count.lock().unwrap();
        if let Some(next) = self.chat_counts.lock().unwrap().pop_front() {
            *last = next;
        }
        self.record(format!("chats:{}", *last));
        Ok((0..*last)
            .map(|i| ChatSummary {
                id: format!("chat-{i}"),
                name: None,
            })
            .collect())
    }

    async fn sync_history(&self, chat_id: &str) -> Result<()> {
        self.record(format!("sync:{chat_id}"));
        Ok(())
    }

    async fn fetch_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.record(format!("fetch:{chat_id}"));
        match self.fetches.get(chat_id) {
            Some(FetchScript::Messages(stamps)) => Ok(stamps
                .iter()
                .take(limit)
                .map(|&timestamp| Message {
                    id: None,
                    timestamp,
                    from_me: None,
                })
                .collect()),
            Some(FetchScript::Fail(msg)) => Err(SessionError::Client(msg.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn destroy(&self) {
        self.record("destroy".to_string());
    }
}

/// Hands out the same scripted session for every connection.
pub struct MockFactory(pub Arc<MockSession>);

impl SessionFactory for MockFactory {
    fn create(&self, _connection_id: &str) -> Arc<dyn MessagingSession> {
        self.0.clone()
    }
}
