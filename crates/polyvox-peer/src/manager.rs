//! Peer connection lifecycle, keyed by remote peer id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use polyvox_types::{ClientSignal, IceCandidateInit, SignalMessage};

use crate::error::PeerError;
use crate::media::AudioCapture;

/// STUN used when the config does not name its own servers.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Identity and transport settings for one mesh participant.
#[derive(Debug, Clone)]
pub struct PeerManagerConfig {
    /// Our own peer id, as minted into the signaling token.
    pub self_id: String,
    /// STUN server URLs. No TURN: peers that cannot hole-punch do not pair.
    pub ice_servers: Vec<String>,
}

impl PeerManagerConfig {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
        }
    }
}

/// Events surfaced to the application layer.
pub enum PeerEvent {
    /// A remote peer's audio track started arriving.
    RemoteTrack {
        peer_id: String,
        track: Arc<TrackRemote>,
    },
    /// A peer connection was closed and removed from the mesh.
    PeerClosed { peer_id: String },
}

/// Owns every peer connection for one room session.
///
/// Inbound signaling is fed through [`handle_signal`]; outbound signals
/// (offers, answers, trickled candidates) leave through the `signal_tx`
/// channel for the caller to relay. Glare is avoided by construction: only
/// the side that *observes* a `peer-join` creates an offer, the joining
/// side always answers.
///
/// [`handle_signal`]: PeerManager::handle_signal
pub struct PeerManager {
    config: PeerManagerConfig,
    api: API,
    capture: Arc<dyn AudioCapture>,
    signal_tx: mpsc::Sender<ClientSignal>,
    event_tx: mpsc::Sender<PeerEvent>,
    // Sync locks, never held across an await.
    peers: Mutex<HashMap<String, Arc<RTCPeerConnection>>>,
    pending_candidates: Mutex<HashMap<String, Vec<IceCandidateInit>>>,
    local_track: Mutex<Option<Arc<TrackLocalStaticSample>>>,
}

impl PeerManager {
    pub fn new(
        config: PeerManagerConfig,
        capture: Arc<dyn AudioCapture>,
        signal_tx: mpsc::Sender<ClientSignal>,
        event_tx: mpsc::Sender<PeerEvent>,
    ) -> Result<Self, PeerError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            config,
            api,
            capture,
            signal_tx,
            event_tx,
            peers: Mutex::new(HashMap::new()),
            pending_candidates: Mutex::new(HashMap::new()),
            local_track: Mutex::new(None),
        })
    }

    /// Dispatches one relayed signaling message.
    ///
    /// Messages addressed to other peers and chat traffic are ignored here;
    /// chat is an application concern, not negotiation input.
    pub async fn handle_signal(&self, msg: SignalMessage) -> Result<(), PeerError> {
        match msg {
            SignalMessage::PeerJoin { peer_id, .. } => {
                // Our own join echo carries no work; for anyone else the
                // established side initiates.
                if peer_id != self.config.self_id {
                    self.make_offer(&peer_id).await?;
                }
            }
            SignalMessage::Offer {
                peer_id,
                target,
                sdp,
                ..
            } if target == self.config.self_id => {
                self.accept_offer(&peer_id, sdp).await?;
            }
            SignalMessage::Answer {
                peer_id,
                target,
                sdp,
                ..
            } if target == self.config.self_id => {
                self.accept_answer(&peer_id, sdp).await?;
            }
            SignalMessage::Ice {
                peer_id,
                target,
                candidate,
                ..
            } if target == self.config.self_id => {
                self.add_remote_candidate(&peer_id, candidate).await?;
            }
            SignalMessage::PeerLeave { peer_id, .. } => {
                self.remove_peer(&peer_id).await;
            }
            _ => {}
        }
        Ok(())
    }

    /// Creates (or reuses) the connection for `peer_id` and sends an offer.
    pub async fn make_offer(&self, peer_id: &str) -> Result<(), PeerError> {
        let pc = self.ensure_peer(peer_id).await?;
        let offer = pc.create_offer(None).await?;
        pc.set_local_description(offer.clone()).await?;
        debug!(peer_id = %peer_id, "sending offer");
        self.send_signal(ClientSignal::Offer {
            target: peer_id.to_string(),
            sdp: offer.sdp,
        })
        .await
    }

    async fn accept_offer(&self, peer_id: &str, sdp: String) -> Result<(), PeerError> {
        let pc = self.ensure_peer(peer_id).await?;
        pc.set_remote_description(RTCSessionDescription::offer(sdp)?)
            .await?;
        self.flush_pending_candidates(peer_id, &pc).await?;
        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer.clone()).await?;
        debug!(peer_id = %peer_id, "sending answer");
        self.send_signal(ClientSignal::Answer {
            target: peer_id.to_string(),
            sdp: answer.sdp,
        })
        .await
    }

    async fn accept_answer(&self, peer_id: &str, sdp: String) -> Result<(), PeerError> {
        let Some(pc) = self.get_peer(peer_id) else {
            // An answer presupposes our offer; without a connection there is
            // nothing it could complete.
            warn!(peer_id = %peer_id, "answer from unknown peer, ignoring");
            return Ok(());
        };
        pc.set_remote_description(RTCSessionDescription::answer(sdp)?)
            .await?;
        self.flush_pending_candidates(peer_id, &pc).await?;
        Ok(())
    }

    async fn add_remote_candidate(
        &self,
        peer_id: &str,
        candidate: IceCandidateInit,
    ) -> Result<(), PeerError> {
        let Some(pc) = self.get_peer(peer_id) else {
            // Trickled candidates can outrun the offer on the relay; hold
            // them until the connection exists.
            self.queue_candidate(peer_id, candidate);
            return Ok(());
        };
        if pc.remote_description().await.is_none() {
            self.queue_candidate(peer_id, candidate);
            return Ok(());
        }
        pc.add_ice_candidate(rtc_candidate(candidate)).await?;
        Ok(())
    }

    /// Closes and forgets the connection for `peer_id`. No-op when unknown.
    pub async fn remove_peer(&self, peer_id: &str) {
        lock(&self.pending_candidates).remove(peer_id);
        let Some(pc) = lock(&self.peers).remove(peer_id) else {
            return;
        };
        if let Err(err) = pc.close().await {
            warn!(peer_id = %peer_id, error = %err, "error closing peer connection");
        }
        let closed = PeerEvent::PeerClosed {
            peer_id: peer_id.to_string(),
        };
        if self.event_tx.try_send(closed).is_err() {
            debug!(peer_id = %peer_id, "event receiver gone, dropped close notification");
        }
    }

    /// Tears down every connection, as on room exit.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<RTCPeerConnection>)> =
            lock(&self.peers).drain().collect();
        lock(&self.pending_candidates).clear();
        for (peer_id, pc) in drained {
            if let Err(err) = pc.close().await {
                warn!(peer_id = %peer_id, error = %err, "error closing peer connection");
            }
        }
    }

    pub fn peer_count(&self) -> usize {
        lock(&self.peers).len()
    }

    pub fn connected_peers(&self) -> Vec<String> {
        lock(&self.peers).keys().cloned().collect()
    }

    fn get_peer(&self, peer_id: &str) -> Option<Arc<RTCPeerConnection>> {
        lock(&self.peers).get(peer_id).map(Arc::clone)
    }

    async fn ensure_peer(&self, peer_id: &str) -> Result<Arc<RTCPeerConnection>, PeerError> {
        if let Some(pc) = self.get_peer(peer_id) {
            return Ok(pc);
        }
        let pc = self.build_connection(peer_id).await?;
        // Another task may have built the same peer while we were not
        // holding the lock; the first insert wins.
        let raced = {
            let mut peers = lock(&self.peers);
            match peers.get(peer_id) {
                Some(current) => Some(Arc::clone(current)),
                None => {
                    peers.insert(peer_id.to_string(), Arc::clone(&pc));
                    None
                }
            }
        };
        if let Some(current) = raced {
            let _ = pc.close().await;
            return Ok(current);
        }
        Ok(pc)
    }

    async fn build_connection(&self, peer_id: &str) -> Result<Arc<RTCPeerConnection>, PeerError> {
        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.config.ice_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(rtc_config).await?);

        let track = self.local_track()?;
        let sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        // Drain RTCP so the interceptor chain keeps processing.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        let signal_tx = self.signal_tx.clone();
        let target = peer_id.to_string();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signal_tx = signal_tx.clone();
            let target = target.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let signal = ClientSignal::Ice {
                            target,
                            candidate: wire_candidate(init),
                        };
                        if signal_tx.send(signal).await.is_err() {
                            debug!("signal channel closed, dropping local candidate");
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to serialize local candidate"),
                }
            })
        }));

        let event_tx = self.event_tx.clone();
        let remote_id = peer_id.to_string();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                let event_tx = event_tx.clone();
                let peer_id = remote_id.clone();
                Box::pin(async move {
                    debug!(peer_id = %peer_id, "remote track arrived");
                    let event = PeerEvent::RemoteTrack {
                        peer_id: peer_id.clone(),
                        track,
                    };
                    if event_tx.try_send(event).is_err() {
                        warn!(peer_id = %peer_id, "event receiver lagging, dropped remote track");
                    }
                })
            },
        ));

        Ok(pc)
    }

    /// The shared local track, capturing it on first use.
    fn local_track(&self) -> Result<Arc<TrackLocalStaticSample>, PeerError> {
        let mut guard = lock(&self.local_track);
        if let Some(track) = guard.as_ref() {
            return Ok(Arc::clone(track));
        }
        let track = self.capture.capture()?;
        *guard = Some(Arc::clone(&track));
        Ok(track)
    }

    fn queue_candidate(&self, peer_id: &str, candidate: IceCandidateInit) {
        lock(&self.pending_candidates)
            .entry(peer_id.to_string())
            .or_default()
            .push(candidate);
    }

    async fn flush_pending_candidates(
        &self,
        peer_id: &str,
        pc: &RTCPeerConnection,
    ) -> Result<(), PeerError> {
        let pending = lock(&self.pending_candidates)
            .remove(peer_id)
            .unwrap_or_default();
        for candidate in pending {
            pc.add_ice_candidate(rtc_candidate(candidate)).await?;
        }
        Ok(())
    }

    async fn send_signal(&self, signal: ClientSignal) -> Result<(), PeerError> {
        self.signal_tx
            .send(signal)
            .await
            .map_err(|_| PeerError::SignalChannelClosed)
    }
}

/// Recovers the guard when a panicking thread poisoned the lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn rtc_candidate(init: IceCandidateInit) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn wire_candidate(init: RTCIceCandidateInit) -> IceCandidateInit {
    IceCandidateInit {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}
