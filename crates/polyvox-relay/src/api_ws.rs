//! Signaling WebSocket handler.
//!
//! The relay never inspects SDP or candidate payloads. It authenticates
//! the socket with an ephemeral token, stamps each client message with the
//! authenticated sender identity and its own clock, and fans the result out
//! to the whole room. Malformed payloads are dropped without closing the
//! socket.

use std::sync::Arc;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use axum::extract::{Extension, Query, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use polyvox_types::{ClientSignal, SignalMessage, TokenClaims};

use crate::{AppState, RoomRegistry};

/// Query parameters for the WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    pub token: Option<String>,
}

/// WebSocket handler: `GET /ws?token=...`.
///
/// The token is the only admission credential: a missing or invalid token
/// yields `401` before the upgrade. A plain HTTP request without the
/// upgrade headers is rejected with `426` by the extractor.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<WsConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(issuer) = &state.issuer else {
        tracing::error!("websocket connect attempted but no signing secret is configured");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let Some(token) = params.token.as_deref() else {
        tracing::warn!("websocket connect missing token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match issuer.verify(token) {
        Ok(claims) => {
            tracing::info!(
                room_id = %claims.room_id,
                peer_id = %claims.peer_id,
                "websocket auth success"
            );
            ws.on_upgrade(move |socket| handle_socket(socket, state, claims))
        }
        Err(err) => {
            tracing::warn!(error = %err, "websocket token verification failed");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

/// Milliseconds since the Unix epoch, the stamp applied to every relayed
/// message.
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Serializes and fans a message out to a room.
async fn broadcast_signal(registry: &RoomRegistry, room_id: &str, msg: &SignalMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => registry.broadcast(room_id, json).await,
        Err(e) => {
            tracing::error!(room_id = %room_id, "failed to serialize signal for broadcast: {}", e);
        }
    }
}

/// Handles one authenticated signaling socket, from admission to cleanup.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, claims: TokenClaims) {
    let TokenClaims {
        room_id,
        peer_id,
        name,
        ..
    } = claims;

    let (mut sender, mut receiver) = socket.split();

    // Bounded channel per session so a slow consumer cannot grow memory
    // without limit; past 256 queued messages, fanout drops for this peer.
    let (tx, mut rx) = mpsc::channel::<String>(256);

    let session_id = state.registry.join(&room_id, &peer_id, tx).await;

    // Forward queued fanout to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    if let Some(mirror) = &state.mirror {
        let mirror = Arc::clone(mirror);
        let (room, peer) = (room_id.clone(), peer_id.clone());
        tokio::spawn(async move { mirror.add(&room, &peer).await });
    }

    // Everyone in the room, the newcomer included, learns of the join.
    // Existing peers react by offering; the newcomer treats its own echo
    // as confirmation it is admitted.
    let join = SignalMessage::PeerJoin {
        peer_id: peer_id.clone(),
        name: name.clone(),
        room_id: room_id.clone(),
        ts: now_ms(),
    };
    broadcast_signal(&state.registry, &room_id, &join).await;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => {
                match serde_json::from_str::<ClientSignal>(&text) {
                    Ok(signal) => {
                        // Identity and time come from the relay, never the
                        // client payload.
                        let stamped = signal.stamp(&peer_id, now_ms());
                        broadcast_signal(&state.registry, &room_id, &stamped).await;
                    }
                    Err(e) => {
                        // Silent drop: no error frame, no close.
                        tracing::trace!(
                            peer_id = %peer_id,
                            "dropping malformed signaling payload: {}",
                            e
                        );
                    }
                }
            }
            AxumMessage::Close(_) => break,
            // Pings are answered by axum; binary frames carry nothing here.
            _ => {}
        }
    }

    // Cleanup with session_id check, so a reconnect that replaced this
    // session is left alone.
    let removed = state.registry.leave(&room_id, &peer_id, session_id).await;
    send_task.abort();

    if removed {
        if let Some(mirror) = &state.mirror {
            let mirror = Arc::clone(mirror);
            let (room, peer) = (room_id.clone(), peer_id.clone());
            tokio::spawn(async move { mirror.remove(&room, &peer).await });
        }

        let leave = SignalMessage::PeerLeave {
            peer_id: peer_id.clone(),
            room_id: room_id.clone(),
            ts: now_ms(),
        };
        broadcast_signal(&state.registry, &room_id, &leave).await;
        tracing::info!(room_id = %room_id, peer_id = %peer_id, "peer left room");
    }
}
