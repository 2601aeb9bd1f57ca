//! Shared wire types for the Polyvox signaling core.
//!
//! This crate defines the signaling message union exchanged over the relay
//! WebSocket, the ICE candidate payload shape, and the verified token claims
//! a relay socket runs under.
//!
//! No crate in the workspace depends on anything *except* `polyvox-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use serde::{Deserialize, Serialize};

/// An ICE candidate as carried inside an `ice` signaling message.
///
/// Mirrors the JSON shape of the browser's `RTCIceCandidateInit` dictionary,
/// so browser and native peers interoperate without translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    /// The candidate-attribute line (`candidate:... typ host ...`).
    pub candidate: String,
    /// Media stream identification tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description the candidate belongs to.
    // The browser key capitalizes the L; serde's camelCase would not.
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    /// ICE username fragment, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// A signaling message as broadcast *by the relay*.
///
/// Every variant carries `peer_id` (the authenticated sender) and `ts`
/// (milliseconds since the Unix epoch, stamped at relay time). Both are
/// relay-assigned: whatever a client put in those fields is discarded
/// before re-broadcast, so the relay is the single identity and time
/// authority for ordering.
///
/// `peer-join` and `peer-leave` originate at the relay itself when a socket
/// is admitted to or removed from a room; clients never send them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    /// A peer was admitted to the room.
    #[serde(rename = "peer-join", rename_all = "camelCase")]
    PeerJoin {
        peer_id: String,
        name: String,
        room_id: String,
        ts: u64,
    },
    /// A peer's socket closed and it left the room.
    #[serde(rename = "peer-leave", rename_all = "camelCase")]
    PeerLeave {
        peer_id: String,
        room_id: String,
        ts: u64,
    },
    /// SDP offer addressed to `target`.
    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer {
        peer_id: String,
        target: String,
        sdp: String,
        ts: u64,
    },
    /// SDP answer addressed to `target`.
    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer {
        peer_id: String,
        target: String,
        sdp: String,
        ts: u64,
    },
    /// Trickled ICE candidate addressed to `target`.
    #[serde(rename = "ice", rename_all = "camelCase")]
    Ice {
        peer_id: String,
        target: String,
        candidate: IceCandidateInit,
        ts: u64,
    },
    /// Room-wide text message.
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat { peer_id: String, text: String, ts: u64 },
}

impl SignalMessage {
    /// The authenticated sender of this message.
    pub fn peer_id(&self) -> &str {
        match self {
            SignalMessage::PeerJoin { peer_id, .. }
            | SignalMessage::PeerLeave { peer_id, .. }
            | SignalMessage::Offer { peer_id, .. }
            | SignalMessage::Answer { peer_id, .. }
            | SignalMessage::Ice { peer_id, .. }
            | SignalMessage::Chat { peer_id, .. } => peer_id,
        }
    }

    /// The relay-assigned timestamp (ms since the Unix epoch).
    pub fn ts(&self) -> u64 {
        match self {
            SignalMessage::PeerJoin { ts, .. }
            | SignalMessage::PeerLeave { ts, .. }
            | SignalMessage::Offer { ts, .. }
            | SignalMessage::Answer { ts, .. }
            | SignalMessage::Ice { ts, .. }
            | SignalMessage::Chat { ts, .. } => *ts,
        }
    }

    /// The point-to-point target, for the variants that carry one.
    pub fn target(&self) -> Option<&str> {
        match self {
            SignalMessage::Offer { target, .. }
            | SignalMessage::Answer { target, .. }
            | SignalMessage::Ice { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// A signaling payload as *sent by a client* to the relay.
///
/// Clients cannot set `peerId` or `ts` — the relay stamps both from the
/// authenticated socket identity and its own clock. Unknown `type` tags
/// fail deserialization and the payload is dropped; the relay validates at
/// the boundary rather than injecting fields into arbitrary JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientSignal {
    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer { target: String, sdp: String },
    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer { target: String, sdp: String },
    #[serde(rename = "ice", rename_all = "camelCase")]
    Ice {
        target: String,
        candidate: IceCandidateInit,
    },
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat { text: String },
}

impl ClientSignal {
    /// Stamps this payload with the authenticated sender identity and the
    /// relay receipt time, producing the message the relay broadcasts.
    pub fn stamp(self, peer_id: &str, ts: u64) -> SignalMessage {
        match self {
            ClientSignal::Offer { target, sdp } => SignalMessage::Offer {
                peer_id: peer_id.to_string(),
                target,
                sdp,
                ts,
            },
            ClientSignal::Answer { target, sdp } => SignalMessage::Answer {
                peer_id: peer_id.to_string(),
                target,
                sdp,
                ts,
            },
            ClientSignal::Ice { target, candidate } => SignalMessage::Ice {
                peer_id: peer_id.to_string(),
                target,
                candidate,
                ts,
            },
            ClientSignal::Chat { text } => SignalMessage::Chat {
                peer_id: peer_id.to_string(),
                text,
                ts,
            },
        }
    }
}

/// The claims embedded in an ephemeral signaling token.
///
/// Possession of a valid, unexpired token is necessary and sufficient to
/// open a signaling socket for this room/peer identity. The token is
/// single-purpose: it authorizes signaling admission and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// The room the token admits to.
    pub room_id: String,
    /// The peer identity the socket will run under (`sub`).
    pub peer_id: String,
    /// Display name, defaulted to a placeholder at mint time.
    pub name: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Connection status surfaced to client UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Reconnecting,
}
