use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use parley_core::{ChannelState, ChatEntry, IceServerConfig, RoomKey};

use crate::channel::{ChannelEvent, SignalingChannel, room_endpoint};
use crate::chat::ChatLog;
use crate::classify::{Inbound, classify};
use crate::error::Result;
use crate::media::{AudioBackend, CpalBackend, MediaEvent, MediaSession};
use crate::negotiation::NegotiationEngine;

/// Commands accepted by a running session.
#[derive(Debug)]
pub enum RoomCommand {
    SendChat(String),
    Leave,
}

/// Coarse call status derived from the peer connection state, for surfaces
/// that should not depend on webrtc types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Negotiating,
    Live,
    Ended,
    Failed,
}

/// Events surfaced to the embedding surface (CLI, tests).
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ChannelOpen,
    ChannelClosed,
    ChannelFailed(String),
    Chat(ChatEntry),
    Call(CallStatus),
}

/// Everything a room visit needs; one per visit.
pub struct RoomConfig {
    /// HTTP base of the room service; the ws endpoint derives from it.
    pub server: Url,
    pub room_key: RoomKey,
    pub ice_servers: Vec<IceServerConfig>,
    /// When false the session never starts a call; chat only.
    pub call_enabled: bool,
    pub backend: Arc<dyn AudioBackend>,
}

impl RoomConfig {
    pub fn new(server: Url, room_key: RoomKey) -> Self {
        Self {
            server,
            room_key,
            ice_servers: IceServerConfig::default_set(),
            call_enabled: true,
            backend: Arc::new(CpalBackend::default()),
        }
    }
}

/// Handle held by the embedding surface while the session runs.
pub struct RoomHandle {
    pub commands: mpsc::Sender<RoomCommand>,
    pub events: mpsc::UnboundedReceiver<RoomEvent>,
}

/// One room visit: owns the signaling channel, the negotiation engine and
/// the chat log. All state transitions happen on the single `run` task, in
/// channel arrival order; nothing here is a global.
pub struct RoomSession {
    channel: SignalingChannel,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    engine: NegotiationEngine,
    media_events: mpsc::Receiver<MediaEvent>,
    chat: ChatLog,
    call_enabled: bool,
    events: mpsc::UnboundedSender<RoomEvent>,
    commands: mpsc::Receiver<RoomCommand>,
}

impl RoomSession {
    /// Connects the room's signaling channel and assembles the session.
    /// Connection failures surface as `RoomEvent::ChannelFailed`, never
    /// here.
    pub fn join(config: RoomConfig) -> Result<(Self, RoomHandle)> {
        let endpoint = room_endpoint(&config.server, &config.room_key)?;
        info!("joining room {} via {}", config.room_key, endpoint);

        let (channel, channel_events) = SignalingChannel::connect(endpoint);
        let (media, media_events) = MediaSession::new(config.backend, config.ice_servers);
        let engine = NegotiationEngine::new(media, Arc::new(channel.signal_sink()));

        let (command_tx, commands) = mpsc::channel(32);
        let (events, events_rx) = mpsc::unbounded_channel();

        let session = Self {
            channel,
            channel_events,
            engine,
            media_events,
            chat: ChatLog::new(),
            call_enabled: config.call_enabled,
            events,
            commands,
        };
        let handle = RoomHandle {
            commands: command_tx,
            events: events_rx,
        };
        Ok((session, handle))
    }

    /// The session event loop. Processes channel events, media events and
    /// user commands one at a time until the visit ends, then runs the
    /// scoped teardown on every exit path.
    pub async fn run(mut self) {
        info!("room session started");

        loop {
            tokio::select! {
                event = self.channel_events.recv() => match event {
                    Some(ChannelEvent::Opened) => {
                        let _ = self.events.send(RoomEvent::ChannelOpen);
                        if self.call_enabled {
                            self.engine.start().await;
                        }
                    }
                    Some(ChannelEvent::Frame(frame)) => self.handle_frame(frame).await,
                    Some(ChannelEvent::Closed) | None => {
                        let _ = self.events.send(RoomEvent::ChannelClosed);
                        break;
                    }
                    Some(ChannelEvent::Failed(reason)) => {
                        warn!("room channel failed: {}", reason);
                        let _ = self.events.send(RoomEvent::ChannelFailed(reason));
                        break;
                    }
                },
                Some(event) = self.media_events.recv() => match event {
                    MediaEvent::LocalCandidate(candidate) => {
                        self.engine.handle_local_candidate(candidate).await;
                    }
                    MediaEvent::PeerStateChanged(state) => {
                        if let Some(status) = call_status(state) {
                            let _ = self.events.send(RoomEvent::Call(status));
                        }
                    }
                },
                command = self.commands.recv() => match command {
                    Some(RoomCommand::SendChat(text)) => self.send_chat(text),
                    Some(RoomCommand::Leave) | None => break,
                },
            }
        }

        self.engine.close().await;
        self.channel.close();
        info!("room session finished");
    }

    async fn handle_frame(&mut self, frame: String) {
        match classify(frame) {
            Inbound::Signal(msg) => {
                debug!("inbound {} envelope", msg.kind());
                self.engine.handle_signal(msg).await;
            }
            Inbound::Chat(text) => {
                let entry = self.chat.push_remote(text);
                let _ = self.events.send(RoomEvent::Chat(entry));
            }
        }
    }

    /// Optimistic echo: the local entry lands in the log before the frame
    /// goes out. Rejected entirely while the channel is not open.
    fn send_chat(&mut self, text: String) {
        if self.channel.state() != ChannelState::Open {
            debug!("chat send dropped, channel not open");
            return;
        }
        let entry = self.chat.push_local(text.clone());
        let _ = self.events.send(RoomEvent::Chat(entry));
        self.channel.send(text);
    }
}

fn call_status(state: RTCPeerConnectionState) -> Option<CallStatus> {
    match state {
        RTCPeerConnectionState::New | RTCPeerConnectionState::Connecting => {
            Some(CallStatus::Negotiating)
        }
        RTCPeerConnectionState::Connected => Some(CallStatus::Live),
        RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Closed => {
            Some(CallStatus::Ended)
        }
        RTCPeerConnectionState::Failed => Some(CallStatus::Failed),
        _ => None,
    }
}
