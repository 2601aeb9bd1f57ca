use thiserror::Error;

/// Errors raised while establishing or running a realtime session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The credential proxy refused to mint a client secret.
    #[error("credential endpoint returned status {0}")]
    Credential(u16),

    /// The provider rejected the SDP offer.
    #[error("provider rejected the session offer with status {0}")]
    Provider(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Webrtc(#[from] webrtc::Error),

    #[error(transparent)]
    Media(#[from] polyvox_peer::MediaError),
}
