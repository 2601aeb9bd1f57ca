//! Session establishment: credential fetch, peer connection, SDP-over-HTTP.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use polyvox_peer::AudioCapture;

use crate::config::{RealtimeConfig, EVENTS_CHANNEL_LABEL};
use crate::error::RealtimeError;
use crate::events::parse_event;
use crate::RealtimeEvent;

/// Short-lived secret minted by the credential proxy.
///
/// The proxy flattens the provider's response so clients never see the
/// upstream shape or key.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredential {
    pub client_secret: String,
    pub expires_at: u64,
    pub model: String,
}

/// One live connection to the speech provider.
pub struct RealtimeSession {
    pc: Arc<RTCPeerConnection>,
    data_channel: Arc<RTCDataChannel>,
    remote_track: Arc<Mutex<Option<Arc<TrackRemote>>>>,
}

impl RealtimeSession {
    /// Connects end to end: credential, peer connection, control channel,
    /// microphone track, SDP exchange.
    ///
    /// Decoded provider events arrive on `event_tx`; the caller keeps the
    /// receiving half. The session configuration (`session.update`) is sent
    /// as soon as the control channel opens.
    pub async fn connect(
        config: RealtimeConfig,
        http: reqwest::Client,
        capture: Arc<dyn AudioCapture>,
        event_tx: mpsc::Sender<RealtimeEvent>,
    ) -> Result<Self, RealtimeError> {
        let credential = fetch_credential(&http, &config.credential_url).await?;
        debug!(model = %credential.model, "obtained realtime client secret");

        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        // Provider connectivity is direct; no STUN needed for an
        // HTTP-negotiated session.
        let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);

        let data_channel = pc.create_data_channel(EVENTS_CHANNEL_LABEL, None).await?;

        let update = session_update(&config);
        let dc_open = Arc::clone(&data_channel);
        data_channel.on_open(Box::new(move || {
            let dc = Arc::clone(&dc_open);
            let update = update.clone();
            Box::pin(async move {
                info!("control channel open, sending session configuration");
                if let Err(err) = dc.send_text(update).await {
                    warn!(error = %err, "failed to send session configuration");
                }
            })
        }));

        data_channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let event_tx = event_tx.clone();
            Box::pin(async move {
                let Ok(text) = std::str::from_utf8(&msg.data) else {
                    return;
                };
                if let Some(event) = parse_event(text) {
                    if event_tx.send(event).await.is_err() {
                        debug!("event receiver gone, dropping provider event");
                    }
                }
            })
        }));

        // The provider answers with its own audio track; keep a handle so
        // the embedder can route playback.
        let remote_track: Arc<Mutex<Option<Arc<TrackRemote>>>> = Arc::new(Mutex::new(None));
        let remote_slot = Arc::clone(&remote_track);
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let slot = Arc::clone(&remote_slot);
            Box::pin(async move {
                info!("provider audio track started");
                *lock(&slot) = Some(track);
            })
        }));

        let track = capture.capture()?;
        let sender = pc
            .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        // Drain RTCP so the interceptor chain keeps processing.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        let offer = pc.create_offer(None).await?;
        pc.set_local_description(offer.clone()).await?;

        let answer_sdp = exchange_sdp(&http, &config, &credential, offer.sdp).await?;
        pc.set_remote_description(RTCSessionDescription::answer(answer_sdp)?)
            .await?;

        Ok(Self {
            pc,
            data_channel,
            remote_track,
        })
    }

    /// The provider's return audio track, once negotiation delivers it.
    pub fn remote_audio(&self) -> Option<Arc<TrackRemote>> {
        lock(&self.remote_track).clone()
    }

    /// Tears the session down. Errors on close are logged, not surfaced;
    /// there is nothing a caller can do with them.
    pub async fn disconnect(self) {
        if let Err(err) = self.data_channel.close().await {
            debug!(error = %err, "error closing control channel");
        }
        for sender in self.pc.get_senders().await {
            if let Err(err) = sender.stop().await {
                debug!(error = %err, "error stopping outbound track sender");
            }
        }
        if let Err(err) = self.pc.close().await {
            warn!(error = %err, "error closing provider connection");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn fetch_credential(
    http: &reqwest::Client,
    url: &str,
) -> Result<ClientCredential, RealtimeError> {
    let resp = http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(RealtimeError::Credential(resp.status().as_u16()));
    }
    Ok(resp.json::<ClientCredential>().await?)
}

/// POSTs the local offer as `application/sdp` and returns the answer SDP.
async fn exchange_sdp(
    http: &reqwest::Client,
    config: &RealtimeConfig,
    credential: &ClientCredential,
    offer_sdp: String,
) -> Result<String, RealtimeError> {
    let url = format!("{}?model={}", config.sdp_url, config.model);
    let resp = http
        .post(&url)
        .bearer_auth(&credential.client_secret)
        .header(reqwest::header::CONTENT_TYPE, "application/sdp")
        .body(offer_sdp)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(RealtimeError::Provider(resp.status().as_u16()));
    }
    Ok(resp.text().await?)
}

/// The `session.update` control message sent on channel open.
fn session_update(config: &RealtimeConfig) -> String {
    serde_json::json!({
        "type": "session.update",
        "session": {
            "instructions": config.instructions,
            "voice": config.voice,
            "turn_detection": {
                "type": "server_vad",
                "threshold": config.turn_detection.threshold,
                "prefix_padding_ms": config.turn_detection.prefix_padding_ms,
                "silence_duration_ms": config.turn_detection.silence_duration_ms,
            },
        },
    })
    .to_string()
}
