//! `GET /ws/stream` (spec.md §4.11 Stream Multiplexer): registers an
//! observer session, forwards everything queued for it to the socket, and
//! unregisters on disconnect. Modeled on the teacher's own
//! `apps/server/src/api/websocket.rs` split-socket idiom.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use genesis_stream::OutboundMessage;
use serde::Deserialize;

use crate::state::AppState;

/// Query parameters accepted at handshake time.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// When `true`, this session receives `WorldFrame::encode_legacy`
    /// output instead of the current binary layout.
    #[serde(default)]
    legacy: bool,
}

/// `GET /ws/stream`.
pub async fn ws_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<StreamParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr, params.legacy))
}

async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr, wants_legacy: bool) {
    if !state.stream_connect_limiter.check(&addr.ip().to_string()) {
        tracing::warn!(%addr, "rejecting /ws/stream connection: rate limit exceeded");
        return;
    }

    let registry = state.collaborators.stream.registry();
    let (session_id, queue) = registry.register(wants_legacy);
    tracing::info!(%session_id, %addr, wants_legacy, "observer session connected");

    let (mut sender, mut receiver) = socket.split();

    let outbound = tokio::spawn(async move {
        loop {
            let message = match queue.pop().await {
                OutboundMessage::Frame(bytes) => Message::Binary(bytes),
                OutboundMessage::Narration(bytes) => Message::Text(String::from_utf8_lossy(&bytes).into_owned()),
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "observer socket read error");
                break;
            }
        }
    }

    outbound.abort();
    registry.unregister(session_id);
    tracing::info!(%session_id, "observer session disconnected");
}
