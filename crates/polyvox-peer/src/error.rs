use thiserror::Error;

/// Failure to acquire a local capture track.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no audio capture device found")]
    DeviceNotFound,
    #[error("capture backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced by peer mesh operations.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error(transparent)]
    Webrtc(#[from] webrtc::Error),

    #[error(transparent)]
    Media(#[from] MediaError),

    /// The outbound signaling channel is gone; the session is over.
    #[error("signaling channel closed")]
    SignalChannelClosed,
}
