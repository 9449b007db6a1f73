use crate::channel::{ChannelEvent, Inbound, SocketChannel, UiChannel, parse_inbound};
use crate::server::AppState;
use crate::workflow::{self, ConnectionContext};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Each socket gets its own session and workflow. The workflow runs detached
/// and is cancelled when the socket closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("WebSocket: client connected ({})", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (channel, mut outbound) = SocketChannel::new();
    let channel = Arc::new(channel);
    let cancel = CancellationToken::new();

    // Writer: drains the channel until every sender is gone or the socket
    // refuses writes.
    let writer_id = connection_id.clone();
    tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("WebSocket {}: failed to encode {}: {}", writer_id, event.name(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                debug!("WebSocket {}: write failed, stopping writer", writer_id);
                break;
            }
        }
    });

    let ctx = ConnectionContext {
        connection_id: connection_id.clone(),
        session: state.factory.create(&connection_id),
        channel: channel.clone(),
        config: state.config.clone(),
        cancel: cancel.clone(),
    };
    tokio::spawn(workflow::run(ctx));

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match parse_inbound(&text) {
                Inbound::Ping => {
                    if channel.emit(ChannelEvent::Pong).is_err() {
                        break;
                    }
                }
                Inbound::Other(event) => {
                    debug!("WebSocket {}: ignoring event {:?}", connection_id, event);
                }
                Inbound::Malformed => {
                    debug!("WebSocket {}: ignoring malformed frame", connection_id);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket {}: read error: {}", connection_id, e);
                break;
            }
        }
    }

    cancel.cancel();
    info!("WebSocket: client disconnected ({})", connection_id);
}
