//! Connection Workflow
//!
//! Everything one browser connection triggers: start a messaging session,
//! relay login QR codes, wait for the chat list to sync, scan contacts and push
//! the ranked results back.

use crate::channel::{ChannelEvent, ErrorPayload, UiChannel, qr};
use crate::config::Config;
use crate::error::WorkflowError;
use crate::scan::{self, ContactStatus, ScanOptions, SyncOptions};
use crate::session::{MessagingSession, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// State owned by one connection's workflow.
pub struct ConnectionContext {
    pub connection_id: String,
    pub session: Arc<dyn MessagingSession>,
    pub channel: Arc<dyn UiChannel>,
    pub config: Arc<Config>,
    /// Cancelled when the browser disconnects
    pub cancel: CancellationToken,
}

/// Run the workflow to completion. Reportable failures are pushed to the UI
/// as an `error` event; the session is destroyed on every exit path.
pub async fn run(ctx: ConnectionContext) -> Result<(), WorkflowError> {
    let result = drive(&ctx).await;

    match &result {
        Ok(()) => tracing::info!("Workflow {}: done", ctx.connection_id),
        Err(e) if e.is_reportable() => {
            tracing::error!("Workflow {}: {}", ctx.connection_id, e);
            let payload = ErrorPayload {
                code: e.code(),
                message: e.to_string(),
            };
            if ctx.channel.emit(ChannelEvent::Error(payload)).is_err() {
                tracing::debug!("Workflow {}: peer gone, error not delivered", ctx.connection_id);
            }
        }
        Err(e) => tracing::info!("Workflow {}: stopped ({})", ctx.connection_id, e),
    }

    ctx.session.destroy().await;
    result
}

async fn drive(ctx: &ConnectionContext) -> Result<(), WorkflowError> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    ctx.session.initialize(events_tx).await?;
    tracing::info!("Workflow {}: session initializing", ctx.connection_id);

    wait_until_ready(ctx, &mut events_rx).await?;

    let session = ctx.session.as_ref();
    let sync = scan::wait_for_stable(
        || async move { session.chats().await.map(|chats| chats.len()) },
        &SyncOptions::from(&ctx.config.sync),
        &ctx.cancel,
    )
    .await?;
    tracing::info!(
        "Workflow {}: {} chats synced, loading contacts",
        ctx.connection_id,
        sync.chat_count
    );

    let contacts = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(WorkflowError::Cancelled),
        contacts = session.contacts() => contacts?,
    };

    let report = scan::scan(
        session,
        contacts,
        &ScanOptions::from(&ctx.config.scan),
        |progress| {
            if ctx.channel.emit(ChannelEvent::Progress(progress)).is_err() {
                ctx.cancel.cancel();
            }
        },
        &ctx.cancel,
    )
    .await;
    if report.cancelled {
        return Err(WorkflowError::Cancelled);
    }

    let ranked = scan::rank(report.results);
    let failed = ranked
        .iter()
        .filter(|r| r.status() == ContactStatus::Failed)
        .count();
    let active = ranked
        .iter()
        .filter(|r| r.status() == ContactStatus::Active)
        .count();
    tracing::info!(
        "Workflow {}: {} contacts ranked ({} active, {} failed)",
        ctx.connection_id,
        ranked.len(),
        active,
        failed
    );

    ctx.channel.emit(ChannelEvent::ContactResults(ranked))?;
    Ok(())
}

/// Relay lifecycle events until the session reports ready.
async fn wait_until_ready(
    ctx: &ConnectionContext,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<(), WorkflowError> {
    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(WorkflowError::Cancelled),
            event = events.recv() => event,
        };

        match event {
            Some(SessionEvent::Qr(code)) => {
                tracing::info!("Workflow {}: QR code received", ctx.connection_id);
                if ctx.config.server.print_qr
                    && let Some(text) = qr::render_unicode(&code)
                {
                    println!("\nScan this QR code with WhatsApp:\n\n{}", text);
                }
                let payload = qr::render_svg(&code).unwrap_or_else(|| {
                    tracing::warn!(
                        "Workflow {}: QR payload too large to render, sending raw code",
                        ctx.connection_id
                    );
                    code.clone()
                });
                ctx.channel.emit(ChannelEvent::QrCode(payload))?;
            }
            Some(SessionEvent::Authenticated) => {
                tracing::info!("Workflow {}: authenticated", ctx.connection_id);
            }
            Some(SessionEvent::Ready) => {
                tracing::info!("Workflow {}: client ready", ctx.connection_id);
                ctx.channel.emit(ChannelEvent::HideQrCode)?;
                ctx.channel.emit(ChannelEvent::ClientReady)?;
                return Ok(());
            }
            Some(SessionEvent::Disconnected(reason)) => {
                return Err(WorkflowError::SessionDisconnected(reason));
            }
            None => {
                return Err(WorkflowError::SessionDisconnected(
                    "session event stream closed".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use crate::error::ErrorCode;
    use crate::session::mock::{FetchScript, MockSession};

    fn fast_config() -> Arc<Config> {
        let mut config = Config::default();
        config.sync.check_interval_ms = 1;
        Arc::new(config)
    }

    fn context(session: Arc<MockSession>, channel: Arc<RecordingChannel>) -> ConnectionContext {
        ConnectionContext {
            connection_id: "test".to_string(),
            session,
            channel,
            config: fast_config(),
            cancel: CancellationToken::new(),
        }
    }

    fn ready_session() -> MockSession {
        MockSession::new()
            .with_events(vec![
                SessionEvent::Qr("2@login".into()),
                SessionEvent::Authenticated,
                SessionEvent::Ready,
            ])
            .with_chat_counts(&[3, 5, 5, 5])
            .with_contact("a@c.us", "A", FetchScript::Messages(vec![100]))
            .with_contact("b@c.us", "B", FetchScript::Messages(vec![]))
            .with_contact("c@c.us", "C", FetchScript::Fail("timeout".into()))
            .with_contact("d@c.us", "D", FetchScript::Messages(vec![200]))
    }

    #[tokio::test]
    async fn test_full_run_emits_in_order() {
        let session = Arc::new(ready_session());
        let channel = Arc::new(RecordingChannel::default());
        run(context(session.clone(), channel.clone())).await.unwrap();

        assert_eq!(
            channel.names(),
            vec![
                "qrCode",
                "hideQrCode",
                "clientReady",
                "progress",
                "progress",
                "progress",
                "progress",
                "contactResults"
            ]
        );

        let events = channel.events();
        let ChannelEvent::QrCode(svg) = &events[0] else {
            panic!("expected qrCode first");
        };
        assert!(svg.contains("<svg"));

        let ChannelEvent::ContactResults(results) = events.last().unwrap() else {
            panic!("expected contactResults last");
        };
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["D", "A", "B", "C"]);
        assert_eq!(results[3].error.as_deref(), Some("timeout"));

        let calls = session.calls();
        assert_eq!(calls.first().map(String::as_str), Some("initialize"));
        assert_eq!(calls.last().map(String::as_str), Some("destroy"));
        let chat_polls = calls.iter().filter(|c| c.starts_with("chats:")).count();
        assert_eq!(chat_polls, 4);
    }

    #[tokio::test]
    async fn test_progress_precedes_each_fetch() {
        let session = Arc::new(ready_session());
        let channel = Arc::new(RecordingChannel::default());
        run(context(session.clone(), channel.clone())).await.unwrap();

        let progress: Vec<ProgressSnapshot> = channel
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ChannelEvent::Progress(p) => Some((p.current_index, p.percentage_complete)),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            vec![
                (0, "25.00%".to_string()),
                (1, "50.00%".to_string()),
                (2, "75.00%".to_string()),
                (3, "100.00%".to_string()),
            ]
        );
    }

    type ProgressSnapshot = (usize, String);

    #[tokio::test]
    async fn test_disconnect_before_ready_reports_error() {
        let session = Arc::new(
            MockSession::new().with_events(vec![
                SessionEvent::Qr("2@login".into()),
                SessionEvent::Disconnected("logged out".into()),
            ]),
        );
        let channel = Arc::new(RecordingChannel::default());
        let err = run(context(session.clone(), channel.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::SessionDisconnected(_)));
        assert_eq!(channel.names(), vec!["qrCode", "error"]);
        let ChannelEvent::Error(payload) = channel.events().pop().unwrap() else {
            panic!("expected error event");
        };
        assert_eq!(payload.code, ErrorCode::Disconnected);
        assert!(payload.message.contains("logged out"));
        assert_eq!(session.calls().last().map(String::as_str), Some("destroy"));
    }

    #[tokio::test]
    async fn test_chat_provider_failure_is_reported() {
        let mut session = MockSession::new().with_events(vec![SessionEvent::Ready]);
        session.chats_error = Some("boom".into());
        let session = Arc::new(session);
        let channel = Arc::new(RecordingChannel::default());

        let err = run(context(session.clone(), channel.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionFailed);
        assert_eq!(channel.names(), vec!["hideQrCode", "clientReady", "error"]);
        assert!(!session.calls().iter().any(|c| c == "contacts"));
    }

    #[tokio::test]
    async fn test_contacts_failure_is_reported() {
        let mut session = MockSession::new().with_events(vec![SessionEvent::Ready]);
        session.contacts_error = Some("contacts unavailable".into());
        let session = Arc::new(session);
        let channel = Arc::new(RecordingChannel::default());

        let err = run(context(session.clone(), channel.clone()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("contacts unavailable"));
        assert_eq!(channel.names().last(), Some(&"error"));
    }

    #[tokio::test]
    async fn test_cancelled_run_still_destroys_session() {
        let session = Arc::new(ready_session());
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(session.clone(), channel.clone());
        ctx.cancel.cancel();

        let err = run(ctx).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled));
        assert!(!channel.names().contains(&"error"));
        assert_eq!(session.calls(), vec!["initialize", "destroy"]);
    }

    #[tokio::test]
    async fn test_closed_channel_stops_scan() {
        let session = Arc::new(ready_session());
        let channel = Arc::new(RecordingChannel::default());
        channel.close();

        let err = run(context(session.clone(), channel.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Channel(_)));
        assert!(!session.calls().iter().any(|c| c.starts_with("fetch:")));
        assert_eq!(session.calls().last().map(String::as_str), Some("destroy"));
    }

    #[tokio::test]
    async fn test_empty_contact_list() {
        let session = Arc::new(MockSession::new().with_events(vec![SessionEvent::Ready]));
        let channel = Arc::new(RecordingChannel::default());
        run(context(session, channel.clone())).await.unwrap();

        assert_eq!(
            channel.events().last(),
            Some(&ChannelEvent::ContactResults(Vec::new()))
        );
        assert!(!channel.names().contains(&"progress"));
    }
}
