use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use parley_core::{NegotiationRole, SessionState, SignalMessage};

use crate::error::Result;
use crate::media::MediaSession;

/// Outbound half of the signaling exchange. The live channel implements it
/// by serializing envelopes; tests capture them instead.
#[async_trait]
pub trait SignalingSink: Send + Sync {
    async fn send_offer(&self, desc: RTCSessionDescription);

    async fn send_answer(&self, desc: RTCSessionDescription);

    async fn send_ice(&self, candidate: RTCIceCandidateInit);
}

/// The offer/answer/ICE state machine. Owns the media session and, through
/// it, the peer connection; the only component that mutates either. Every
/// failure is logged and absorbed here, so chat keeps working no matter
/// what the call does.
pub struct NegotiationEngine {
    media: MediaSession,
    sink: Arc<dyn SignalingSink>,
    role: NegotiationRole,
    state: SessionState,
    local_offer: Option<RTCSessionDescription>,
    pending_candidates: Vec<RTCIceCandidateInit>,
    remote_description_set: bool,
}

impl NegotiationEngine {
    pub fn new(media: MediaSession, sink: Arc<dyn SignalingSink>) -> Self {
        Self {
            media,
            sink,
            role: NegotiationRole::Unassigned,
            state: SessionState::Idle,
            local_offer: None,
            pending_candidates: Vec::new(),
            remote_description_set: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn peer(&self) -> Option<Arc<RTCPeerConnection>> {
        self.media.peer().cloned()
    }

    /// Remote candidates parked until the remote description lands.
    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Channel-open entry point. Acquires local media (one attempt; failure
    /// logs, aborts to `Idle` and leaves chat alone) and starts the
    /// initiator path.
    pub async fn start(&mut self) {
        if self.state != SessionState::Idle {
            return;
        }
        self.state = SessionState::LocalMediaAcquiring;
        if let Err(e) = self.media.acquire().await {
            warn!("media acquisition failed, call disabled: {}", e);
            self.state = SessionState::Idle;
            return;
        }
        if let Err(e) = self.start_as_initiator().await {
            warn!("failed to start negotiation: {}", e);
            self.media.reset_peer().await;
            self.state = SessionState::Idle;
        }
    }

    async fn start_as_initiator(&mut self) -> Result<()> {
        let pc = self.media.create_peer().await?;
        self.state = SessionState::PeerCreated;
        self.role = NegotiationRole::Initiator;

        self.state = SessionState::OfferCreating;
        let offer = pc.create_offer(None).await?;
        pc.set_local_description(offer.clone()).await?;
        self.local_offer = Some(offer.clone());

        self.state = SessionState::OfferSent;
        self.sink.send_offer(offer).await;
        self.state = SessionState::AwaitingAnswer;
        info!("offer sent, awaiting answer");
        Ok(())
    }

    /// One classified negotiation envelope, in channel arrival order.
    pub async fn handle_signal(&mut self, msg: SignalMessage) {
        if self.state == SessionState::Closed {
            debug!("ignoring {} envelope after close", msg.kind());
            return;
        }
        match msg {
            SignalMessage::Offer(desc) => self.handle_offer(desc).await,
            SignalMessage::Answer(desc) => self.handle_answer(desc).await,
            SignalMessage::IceCandidate(candidate) => self.handle_candidate(candidate).await,
        }
    }

    async fn handle_offer(&mut self, desc: RTCSessionDescription) {
        if self.role == NegotiationRole::Initiator {
            // Glare: both sides opened with an offer. Deterministic
            // tie-break on the SDP text: the higher side keeps its offer,
            // the lower side yields and answers.
            let ours = self
                .local_offer
                .as_ref()
                .map(|o| o.sdp.as_str())
                .unwrap_or_default();
            if ours > desc.sdp.as_str() {
                // Keep our offer and re-send it: the peer may never have
                // seen it (it can predate the peer joining the room), and a
                // duplicate offer only costs the responder a repeat answer.
                debug!("glare: keeping local offer, dropping remote");
                if let Some(offer) = self.local_offer.clone() {
                    self.sink.send_offer(offer).await;
                }
                return;
            }
            info!("glare: yielding to remote offer");
            self.media.reset_peer().await;
            self.local_offer = None;
            self.remote_description_set = false;
        }

        self.role = NegotiationRole::Responder;
        self.state = SessionState::AwaitingOffer;
        if let Err(e) = self.answer_remote_offer(desc).await {
            warn!("failed to answer remote offer: {}", e);
        }
    }

    async fn answer_remote_offer(&mut self, desc: RTCSessionDescription) -> Result<()> {
        let pc = match self.media.peer() {
            Some(pc) => Arc::clone(pc),
            None => {
                // An offer can arrive before we ever negotiated; the peer
                // resource is created on demand.
                let pc = self.media.create_peer().await?;
                self.state = SessionState::PeerCreated;
                pc
            }
        };

        pc.set_remote_description(desc).await?;
        self.remote_description_set = true;
        self.flush_pending_candidates(&pc).await;

        self.state = SessionState::AnswerCreating;
        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer.clone()).await?;

        self.state = SessionState::AnswerSent;
        self.sink.send_answer(answer).await;
        self.state = SessionState::Connected;
        info!("answer sent, descriptions exchanged");
        Ok(())
    }

    async fn handle_answer(&mut self, desc: RTCSessionDescription) {
        let Some(pc) = self.media.peer().cloned() else {
            warn!("answer received with no peer resource, ignoring");
            return;
        };

        // Out-of-phase answers are attempted like any other; a failure is
        // logged and the state stays put (no rollback).
        match pc.set_remote_description(desc).await {
            Ok(()) => {
                self.remote_description_set = true;
                self.flush_pending_candidates(&pc).await;
                if self.state == SessionState::AwaitingAnswer {
                    self.state = SessionState::Connected;
                    info!("answer received, descriptions exchanged");
                }
            }
            Err(e) => warn!("failed to set remote answer: {}", e),
        }
    }

    async fn handle_candidate(&mut self, candidate: RTCIceCandidateInit) {
        if !self.remote_description_set {
            self.pending_candidates.push(candidate);
            return;
        }
        let Some(pc) = self.media.peer().cloned() else {
            self.pending_candidates.push(candidate);
            return;
        };
        if let Err(e) = pc.add_ice_candidate(candidate).await {
            warn!("failed to add remote candidate: {}", e);
        }
    }

    async fn flush_pending_candidates(&mut self, pc: &Arc<RTCPeerConnection>) {
        for candidate in self.pending_candidates.drain(..) {
            if let Err(e) = pc.add_ice_candidate(candidate).await {
                warn!("failed to add queued candidate: {}", e);
            }
        }
    }

    /// Local candidate discovered by the peer resource; transmitted
    /// immediately, whatever the phase.
    pub async fn handle_local_candidate(&mut self, candidate: RTCIceCandidateInit) {
        if self.state == SessionState::Closed {
            return;
        }
        self.sink.send_ice(candidate).await;
    }

    /// Terminal teardown; reachable from every state and idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.media.close().await;
        self.state = SessionState::Closed;
    }
}
