//! Direct voice session against a realtime speech provider.
//!
//! The browser-side counterpart of the relay's credential proxy: fetch a
//! short-lived client secret, stand up a dedicated peer connection with a
//! control data channel, swap SDP over plain HTTP, and stream the
//! provider's partial transcripts back as events.

pub mod config;
pub mod error;
pub mod events;
pub mod session;

pub use config::{RealtimeConfig, TurnDetection, DEFAULT_MODEL, DEFAULT_VOICE, EVENTS_CHANNEL_LABEL};
pub use error::RealtimeError;
pub use events::{parse_event, RealtimeEvent};
pub use session::{ClientCredential, RealtimeSession};
