//! UI Channel
//!
//! Per-connection push channel to the browser. Events are serialized as
//! `{"event": <name>, "data": <payload>}` JSON text frames.

pub mod qr;
pub mod websocket;

use crate::error::{ChannelError, ErrorCode};
use crate::scan::{ContactResult, ProgressEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// Events pushed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ChannelEvent {
    /// Login QR code as an SVG document
    QrCode(String),
    HideQrCode,
    ClientReady,
    Progress(ProgressEvent),
    ContactResults(Vec<ContactResult>),
    Error(ErrorPayload),
    Pong,
}

impl ChannelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::QrCode(_) => "qrCode",
            ChannelEvent::HideQrCode => "hideQrCode",
            ChannelEvent::ClientReady => "clientReady",
            ChannelEvent::Progress(_) => "progress",
            ChannelEvent::ContactResults(_) => "contactResults",
            ChannelEvent::Error(_) => "error",
            ChannelEvent::Pong => "pong",
        }
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Something the workflow can push events to.
pub trait UiChannel: Send + Sync {
    /// Fails only once the peer has gone away.
    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError>;
}

/// Queue feeding a connection's socket writer task.
#[derive(Debug, Clone)]
pub struct SocketChannel {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl SocketChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiChannel for SocketChannel {
    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        tracing::trace!("Channel: emit {}", event.name());
        self.tx.send(event).map_err(|_| ChannelError::Closed)
    }
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
}

/// A frame received from the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Ping,
    /// Well-formed but not something we act on
    Other(String),
    Malformed,
}

pub fn parse_inbound(text: &str) -> Inbound {
    match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) if frame.event == "ping" => Inbound::Ping,
        Ok(frame) => Inbound::Other(frame.event),
        Err(_) => Inbound::Malformed,
    }
}

/// Captures emitted events for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingChannel {
    events: std::sync::Mutex<Vec<ChannelEvent>>,
    closed: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingChannel {
    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(ChannelEvent::name).collect()
    }

    /// Make every later `emit` fail as if the peer disconnected.
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl UiChannel for RecordingChannel {
    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_shapes() {
        let frame = ChannelEvent::QrCode("<svg/>".into()).to_frame().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&frame).unwrap(),
            json!({"event": "qrCode", "data": "<svg/>"})
        );

        let frame = ChannelEvent::HideQrCode.to_frame().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&frame).unwrap(),
            json!({"event": "hideQrCode"})
        );

        let frame = ChannelEvent::Progress(ProgressEvent::new(0, 4)).to_frame().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&frame).unwrap(),
            json!({
                "event": "progress",
                "data": {"totalCount": 4, "currentIndex": 0, "percentageComplete": "25.00%"}
            })
        );
    }

    #[test]
    fn test_error_frame() {
        let event = ChannelEvent::Error(ErrorPayload {
            code: ErrorCode::SyncTimeout,
            message: "too slow".into(),
        });
        let value: serde_json::Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "error", "data": {"code": "sync_timeout", "message": "too slow"}})
        );
    }

    #[test]
    fn test_names_match_wire_tags() {
        for event in [
            ChannelEvent::QrCode(String::new()),
            ChannelEvent::HideQrCode,
            ChannelEvent::ClientReady,
            ChannelEvent::ContactResults(Vec::new()),
            ChannelEvent::Pong,
        ] {
            let value: serde_json::Value =
                serde_json::from_str(&event.to_frame().unwrap()).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }

    #[test]
    fn test_parse_inbound() {
        assert_eq!(parse_inbound(r#"{"event":"ping"}"#), Inbound::Ping);
        assert_eq!(
            parse_inbound(r#"{"event":"hello","data":{"x":1}}"#),
            Inbound::Other("hello".into())
        );
        assert_eq!(parse_inbound("not json"), Inbound::Malformed);
    }

    #[test]
    fn test_socket_channel_closed_after_receiver_drop() {
        let (channel, rx) = SocketChannel::new();
        assert!(channel.emit(ChannelEvent::ClientReady).is_ok());
        drop(rx);
        assert!(matches!(
            channel.emit(ChannelEvent::ClientReady),
            Err(ChannelError::Closed)
        ));
    }
}
