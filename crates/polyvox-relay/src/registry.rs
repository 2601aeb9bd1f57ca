//! In-process room membership and fanout.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// A connected peer's send handle.
#[derive(Clone)]
struct PeerHandle {
    session_id: Uuid,
    tx: mpsc::Sender<String>,
}

/// Type alias for the room map to satisfy clippy complexity checks.
type RoomMap = HashMap<String, HashMap<String, PeerHandle>>;

/// Authoritative room membership for this process.
///
/// One entry per live socket, keyed by room and peer id. Rooms exist only
/// while occupied: the last leave removes the room entry entirely, so an
/// idle relay holds no state.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<RoomMap>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a peer in a room, returning the unique session ID.
    ///
    /// If the peer id is already present (a reconnect racing its own
    /// cleanup), the newer socket replaces the older handle; the older
    /// socket's removal is then rejected by the session ID check.
    pub async fn join(&self, room_id: &str, peer_id: &str, tx: mpsc::Sender<String>) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        if room.contains_key(peer_id) {
            tracing::info!(
                room_id = %room_id,
                peer_id = %peer_id,
                "replacing existing session for reconnecting peer"
            );
        }
        room.insert(peer_id.to_string(), PeerHandle { session_id, tx });
        session_id
    }

    /// Removes a peer if the session ID still matches, deleting the room
    /// when it empties. Stale removals (a replaced session cleaning up
    /// after itself) and unknown peers are no-ops.
    pub async fn leave(&self, room_id: &str, peer_id: &str, session_id: Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(room_id) else {
            return false;
        };
        match room.get(peer_id) {
            Some(handle) if handle.session_id == session_id => {}
            _ => return false,
        }
        room.remove(peer_id);
        if room.is_empty() {
            rooms.remove(room_id);
        }
        true
    }

    /// Sends a message string to every member of a room, the sender
    /// included. Slow consumers have the message dropped rather than
    /// stalling the room.
    pub async fn broadcast(&self, room_id: &str, message_json: String) {
        let rooms = self.rooms.read().await;
        if let Some(room) = rooms.get(room_id) {
            for (peer_id, handle) in room {
                if let Err(e) = handle.tx.try_send(message_json.clone()) {
                    tracing::warn!(
                        room_id = %room_id,
                        peer_id = %peer_id,
                        "dropping broadcast message for slow consumer: {}",
                        e
                    );
                }
            }
        }
    }

    /// Peer ids currently in a room.
    pub async fn members(&self, room_id: &str) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|room| room.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of occupied rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
