//! Automation Bridge Session
//!
//! Talks to a sidecar process that owns the headless WhatsApp Web client and
//! exposes it over HTTP. One bridge session is opened per UI connection, keyed
//! by the connection id.

use super::{ChatSummary, Contact, Message, MessagingSession, Result, SessionEvent, SessionFactory};
use crate::config::BridgeConfig;
use crate::error::SessionError;
use crate::utils::summarize_body;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Consecutive failed status polls before the session is given up on
const MAX_STATUS_FAILURES: u32 = 5;

/// Session state as reported by `GET /sessions/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeState {
    Starting,
    Qr,
    Authenticated,
    Ready,
    Disconnected,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeStatus {
    pub state: BridgeState,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    error: String,
}

/// Turns successive status polls into de-duplicated lifecycle events.
#[derive(Debug, Default)]
struct StatusTracker {
    last_qr: Option<String>,
    authenticated: bool,
    ready: bool,
    finished: bool,
}

impl StatusTracker {
    fn advance(&mut self, status: BridgeStatus) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        match status.state {
            BridgeState::Starting => {}
            BridgeState::Qr => {
                if let Some(code) = status.qr
                    && self.last_qr.as_deref() != Some(code.as_str())
                {
                    self.last_qr = Some(code.clone());
                    events.push(SessionEvent::Qr(code));
                }
            }
            BridgeState::Authenticated => {
                if !self.authenticated {
                    self.authenticated = true;
                    events.push(SessionEvent::Authenticated);
                }
            }
            BridgeState::Ready => {
                if !self.ready {
                    self.ready = true;
                    events.push(SessionEvent::Ready);
                }
            }
            BridgeState::Disconnected => {
                self.finished = true;
                events.push(SessionEvent::Disconnected(
                    status.reason.unwrap_or_else(|| "disconnected".to_string()),
                ));
            }
        }
        events
    }
}

/// [`MessagingSession`] backed by the automation bridge.
pub struct BridgeSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    poll_interval: Duration,
    initialized: AtomicBool,
    shutdown: CancellationToken,
}

impl BridgeSession {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        session_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            poll_interval,
            initialized: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    fn session_url(&self) -> String {
        format!(
            "{}/sessions/{}",
            self.base_url,
            urlencoding::encode(&self.session_id)
        )
    }

    fn chat_url(&self, chat_id: &str, action: &str) -> String {
        format!(
            "{}/chats/{}/{}",
            self.session_url(),
            urlencoding::encode(chat_id),
            action
        )
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SessionError::NotInitialized)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = check(self.client.get(url).send().await?).await?;
        resp.json::<T>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }

    async fn poll_status(
        client: reqwest::Client,
        status_url: String,
        interval: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
        shutdown: CancellationToken,
    ) {
        let mut tracker = StatusTracker::default();
        let mut failures = 0u32;
        loop {
            let status = async {
                let resp = check(client.get(&status_url).send().await?).await?;
                resp.json::<BridgeStatus>()
                    .await
                    .map_err(|e| SessionError::Decode(e.to_string()))
            };
            let status = tokio::select! {
                _ = shutdown.cancelled() => break,
                status = status => status,
            };

            match status {
                Ok(status) => {
                    failures = 0;
                    for event in tracker.advance(status) {
                        tracing::debug!("Session: bridge event {:?}", event);
                        if events.send(event).is_err() {
                            tracing::debug!("Session: event receiver dropped, stopping poller");
                            return;
                        }
                    }
                    if tracker.finished {
                        return;
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        "Session: status poll failed ({}/{}): {}",
                        failures,
                        MAX_STATUS_FAILURES,
                        e
                    );
                    if failures >= MAX_STATUS_FAILURES {
                        let _ = events.send(SessionEvent::Disconnected(format!(
                            "bridge status unavailable: {}",
                            e
                        )));
                        return;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::debug!("Session: status poller stopped");
    }
}

/// Map a non-success response to a [`SessionError`]. `410 Gone` means the
/// bridge session is over. A JSON `{"error": ...}` body is relayed verbatim as
/// the client's own failure message.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<BridgeErrorBody>(&body).ok();
    if status == reqwest::StatusCode::GONE {
        return Err(SessionError::Disconnected(
            parsed
                .map(|p| p.error)
                .unwrap_or_else(|| summarize_body(&body, 200)),
        ));
    }
    if let Some(parsed) = parsed {
        return Err(SessionError::Client(parsed.error));
    }
    Err(SessionError::Bridge {
        status: status.as_u16(),
        body: summarize_body(&body, 200),
    })
}

#[async_trait]
impl MessagingSession for BridgeSession {
    async fn initialize(&self, events: mpsc::UnboundedSender<SessionEvent>) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            tracing::warn!("Session: {} already initialized", self.session_id);
            return Ok(());
        }

        tracing::info!("Session: starting bridge session {}", self.session_id);
        let started = async { check(self.client.post(self.session_url()).send().await?).await };
        if let Err(e) = started.await {
            self.initialized.store(false, Ordering::Release);
            return Err(e);
        }

        tokio::spawn(Self::poll_status(
            self.client.clone(),
            format!("{}/status", self.session_url()),
            self.poll_interval,
            events,
            self.shutdown.child_token(),
        ));
        Ok(())
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        self.ensure_initialized()?;
        self.get_json(&format!("{}/contacts", self.session_url()))
            .await
    }

    async fn chats(&self) -> Result<Vec<ChatSummary>> {
        self.ensure_initialized()?;
        self.get_json(&format!("{}/chats", self.session_url())).await
    }

    async fn sync_history(&self, chat_id: &str) -> Result<()> {
        self.ensure_initialized()?;
        check(
            self.client
                .post(self.chat_url(chat_id, "sync-history"))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn fetch_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.ensure_initialized()?;
        let url = format!("{}?limit={}", self.chat_url(chat_id, "messages"), limit);
        self.get_json(&url).await
    }

    async fn destroy(&self) {
        self.shutdown.cancel();
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        match self.client.delete(self.session_url()).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("Session: bridge session {} destroyed", self.session_id);
            }
            Ok(resp) => {
                tracing::warn!(
                    "Session: destroying {} returned {}",
                    self.session_id,
                    resp.status()
                );
            }
            Err(e) => {
                tracing::warn!("Session: failed to destroy {}: {}", self.session_id, e);
            }
        }
    }
}

/// Creates one [`BridgeSession`] per UI connection, sharing the HTTP client.
pub struct BridgeSessionFactory {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl BridgeSessionFactory {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            poll_interval: Duration::from_millis(config.status_poll_interval_ms),
        })
    }
}

impl SessionFactory for BridgeSessionFactory {
    fn create(&self, connection_id: &str) -> Arc<dyn MessagingSession> {
        Arc::new(BridgeSession::new(
            self.client.clone(),
            self.base_url.clone(),
            connection_id,
            self.poll_interval,
        ))
    }
}
