//! Client-side WebRTC mesh management.
//!
//! One peer connection per remote participant, all sharing a single lazily
//! captured microphone track. Negotiation is driven entirely by relayed
//! signaling messages: on a `peer-join` the existing side offers, the
//! newcomer answers, and trickled ICE candidates complete the pair.

pub mod error;
pub mod manager;
pub mod media;

pub use error::{MediaError, PeerError};
pub use manager::{PeerEvent, PeerManager, PeerManagerConfig, DEFAULT_STUN_SERVER};
pub use media::AudioCapture;
