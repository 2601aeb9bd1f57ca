//! Local capture abstraction.

use std::sync::Arc;

use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::error::MediaError;

/// Source of the local microphone track.
///
/// The mesh logic does not care where samples come from: a sound card, a
/// file, or a test fixture all look the same behind this trait. The manager
/// calls `capture` at most once per session and shares the returned track
/// across every peer connection.
pub trait AudioCapture: Send + Sync {
    fn capture(&self) -> Result<Arc<TrackLocalStaticSample>, MediaError>;
}
