use bytes::Bytes;
use ringbuf::HeapProd;
use ringbuf::traits::Producer;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use parley_core::IceServerConfig;

use crate::error::{ClientError, Result};
use crate::media::backend::{
    AudioBackend, CaptureHandle, CHANNELS, FRAME_DURATION_MS, PlaybackHandle, SAMPLE_RATE,
};
use crate::media::codec::{AudioDecoder, AudioEncoder, DEFAULT_BITRATE};

/// Events the media layer reports to the session loop. Callbacks never touch
/// negotiation state directly; everything goes through this channel.
#[derive(Debug)]
pub enum MediaEvent {
    LocalCandidate(RTCIceCandidateInit),
    PeerStateChanged(RTCPeerConnectionState),
}

/// Owns the local capture handle, the peer connection and the audio pumps.
/// Exactly one per room visit; released when the visit ends.
pub struct MediaSession {
    backend: Arc<dyn AudioBackend>,
    ice_servers: Vec<IceServerConfig>,
    events: mpsc::Sender<MediaEvent>,
    capture_frames: Option<Arc<tokio::sync::Mutex<mpsc::Receiver<Vec<f32>>>>>,
    capture_stop: Option<oneshot::Sender<()>>,
    playback_stop: Option<oneshot::Sender<()>>,
    playback_slot: Arc<Mutex<Option<HeapProd<f32>>>>,
    pc: Option<Arc<RTCPeerConnection>>,
    encode_pump: Option<JoinHandle<()>>,
}

impl MediaSession {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        ice_servers: Vec<IceServerConfig>,
    ) -> (Self, mpsc::Receiver<MediaEvent>) {
        let (events, events_rx) = mpsc::channel(64);
        let session = Self {
            backend,
            ice_servers,
            events,
            capture_frames: None,
            capture_stop: None,
            playback_stop: None,
            playback_slot: Arc::new(Mutex::new(None)),
            pc: None,
            encode_pump: None,
        };
        (session, events_rx)
    }

    /// Acquires the local capture device. Single attempt, no retry.
    pub async fn acquire(&mut self) -> Result<()> {
        if self.capture_frames.is_some() {
            return Ok(());
        }
        let backend = Arc::clone(&self.backend);
        let handle = tokio::task::spawn_blocking(move || backend.start_capture())
            .await
            .map_err(|e| ClientError::MediaAcquisition(e.to_string()))??;
        let CaptureHandle { frames, stop } = handle;
        self.capture_frames = Some(Arc::new(tokio::sync::Mutex::new(frames)));
        self.capture_stop = Some(stop);
        info!("local audio capture acquired");
        Ok(())
    }

    pub fn is_acquired(&self) -> bool {
        self.capture_frames.is_some()
    }

    pub fn peer(&self) -> Option<&Arc<RTCPeerConnection>> {
        self.pc.as_ref()
    }

    /// Builds the peer connection resource: codecs, interceptors, ICE
    /// servers, candidate/state/track callbacks, and the outbound Opus track
    /// when capture is live (receive-only otherwise).
    pub async fn create_peer(&mut self) -> Result<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Trickle ICE: every local candidate goes to the session loop, which
        // transmits it immediately whatever the negotiation phase.
        let ice_tx = self.events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(MediaEvent::LocalCandidate(init)).await;
                    }
                    Err(e) => warn!("failed to serialize local candidate: {}", e),
                }
            })
        }));

        let state_tx = self.events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            Box::pin(async move {
                debug!("peer connection state: {}", s);
                let _ = tx.send(MediaEvent::PeerStateChanged(s)).await;
            })
        }));

        // Fresh playback sink for this peer's remote track. Playback failure
        // is non-fatal; the call continues without audio out.
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || backend.start_playback()).await {
            Ok(Ok(PlaybackHandle { producer, stop })) => {
                *self.playback_slot.lock().unwrap() = Some(producer);
                self.playback_stop = Some(stop);
            }
            Ok(Err(e)) => warn!("playback unavailable: {}", e),
            Err(e) => warn!("playback task failed: {}", e),
        }

        let slot = Arc::clone(&self.playback_slot);
        pc.on_track(Box::new(move |track: Arc<TrackRemote>,
                                   _receiver: Arc<RTCRtpReceiver>,
                                   _transceiver: Arc<RTCRtpTransceiver>| {
            let mime = track.codec().capability.mime_type.to_lowercase();
            if !mime.contains("opus") {
                return Box::pin(async {});
            }
            let producer = slot.lock().unwrap().take();
            Box::pin(async move {
                let Some(producer) = producer else {
                    debug!("remote track ignored, no playback sink");
                    return;
                };
                info!("remote audio track started");
                tokio::spawn(read_remote_track(track, producer));
            })
        }));

        match &self.capture_frames {
            Some(frames) => {
                let track = Arc::new(TrackLocalStaticSample::new(
                    RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_OPUS.to_owned(),
                        clock_rate: SAMPLE_RATE,
                        channels: CHANNELS,
                        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                        rtcp_feedback: vec![],
                    },
                    "audio".to_owned(),
                    "parley".to_owned(),
                ));
                pc.add_transceiver_from_track(
                    Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Sendrecv,
                        send_encodings: vec![],
                    }),
                )
                .await?;
                self.encode_pump = Some(tokio::spawn(pump_capture(Arc::clone(frames), track)));
            }
            None => {
                pc.add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await?;
            }
        }

        self.pc = Some(Arc::clone(&pc));
        Ok(pc)
    }

    /// Closes the current peer resource so negotiation can rebuild it (glare
    /// yield). Capture stays live; playback restarts with the next peer.
    pub async fn reset_peer(&mut self) {
        if let Some(pump) = self.encode_pump.take() {
            pump.abort();
        }
        self.playback_stop = None;
        let _ = self.playback_slot.lock().unwrap().take();
        if let Some(pc) = self.pc.take() {
            if let Err(e) = pc.close().await {
                warn!("failed to close peer connection: {}", e);
            }
        }
    }

    /// Releases every scoped media resource. Idempotent; must not outlive
    /// the room visit.
    pub async fn close(&mut self) {
        self.reset_peer().await;
        self.capture_stop = None;
        self.capture_frames = None;
    }
}

/// Capture frames -> Opus -> local track. Lives as long as the current peer;
/// the frame receiver stays shared so a rebuilt peer can resume pumping.
async fn pump_capture(
    frames: Arc<tokio::sync::Mutex<mpsc::Receiver<Vec<f32>>>>,
    track: Arc<TrackLocalStaticSample>,
) {
    let mut encoder = match AudioEncoder::new(DEFAULT_BITRATE) {
        Ok(encoder) => encoder,
        Err(e) => {
            warn!("cannot start opus encoder: {}", e);
            return;
        }
    };

    let mut rx = frames.lock().await;
    while let Some(frame) = rx.recv().await {
        let packet = match encoder.encode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("opus encode failed: {}", e);
                continue;
            }
        };
        let sample = Sample {
            data: Bytes::from(packet),
            duration: Duration::from_millis(FRAME_DURATION_MS as u64),
            ..Default::default()
        };
        if track.write_sample(&sample).await.is_err() {
            break;
        }
    }
}

/// Remote track RTP -> Opus decode -> playback ring buffer.
async fn read_remote_track(track: Arc<TrackRemote>, mut producer: HeapProd<f32>) {
    let mut decoder = match AudioDecoder::new() {
        Ok(decoder) => decoder,
        Err(e) => {
            warn!("cannot start opus decoder: {}", e);
            return;
        }
    };

    loop {
        match track.read_rtp().await {
            Ok((packet, _)) => {
                if packet.payload.is_empty() {
                    continue;
                }
                match decoder.decode(&packet.payload) {
                    Ok(pcm) => {
                        let _ = producer.push_slice(pcm);
                    }
                    Err(_) => {
                        // Undecodable packet, skip it.
                    }
                }
            }
            Err(e) => {
                debug!("remote track ended: {}", e);
                break;
            }
        }
    }
}
