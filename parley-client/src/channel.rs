use futures::{SinkExt, StreamExt};
use parley_core::{ChannelState, RoomKey, SignalMessage};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::negotiation::SignalingSink;

/// Events surfaced by the signaling channel, strictly in network arrival
/// order. One receiver per channel; no reordering, no batching.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened,
    Frame(String),
    Closed,
    Failed(String),
}

/// The room's single bidirectional message connection.
///
/// Carries both raw chat text and serialized negotiation envelopes. Connect
/// failures never surface synchronously: the channel starts in `Connecting`
/// and reports `Opened` or `Failed` on the event stream.
pub struct SignalingChannel {
    state: watch::Receiver<ChannelState>,
    outbound: mpsc::UnboundedSender<Message>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl SignalingChannel {
    pub fn connect(url: Url) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(run_transport(url, out_rx, close_rx, event_tx, state_tx));

        let channel = Self {
            state: state_rx,
            outbound: out_tx,
            close_tx: Some(close_tx),
        };
        (channel, event_rx)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Transmits a raw UTF-8 text frame. A no-op unless the channel is
    /// `Open`; sends are dropped rather than queued.
    pub fn send(&self, text: String) {
        send_when_open(&self.outbound, &self.state, text);
    }

    /// Outbound half for the negotiation engine. Envelopes go through the
    /// same gate as chat text.
    pub fn signal_sink(&self) -> ChannelSink {
        ChannelSink {
            outbound: self.outbound.clone(),
            state: self.state.clone(),
        }
    }

    /// Requests shutdown of the underlying transport. Idempotent; runs on
    /// every exit path so the socket never outlives the room visit.
    /// Dropping the channel requests the same shutdown.
    pub fn close(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            info!("signaling channel close requested");
            let _ = close_tx.send(());
        }
    }
}

fn send_when_open(
    outbound: &mpsc::UnboundedSender<Message>,
    state: &watch::Receiver<ChannelState>,
    text: String,
) {
    if *state.borrow() != ChannelState::Open {
        debug!("dropping send, channel not open");
        return;
    }
    if outbound.send(Message::Text(text)).is_err() {
        debug!("dropping send, transport task gone");
    }
}

/// Serializing sink over the live channel; the engine's only way out.
#[derive(Clone)]
pub struct ChannelSink {
    outbound: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<ChannelState>,
}

impl ChannelSink {
    fn send_signal(&self, msg: SignalMessage) {
        match serde_json::to_string(&msg) {
            Ok(json) => send_when_open(&self.outbound, &self.state, json),
            Err(e) => error!("failed to serialize {} envelope: {}", msg.kind(), e),
        }
    }
}

#[async_trait::async_trait]
impl SignalingSink for ChannelSink {
    async fn send_offer(
        &self,
        desc: webrtc::peer_connection::sdp::session_description::RTCSessionDescription,
    ) {
        self.send_signal(SignalMessage::Offer(desc));
    }

    async fn send_answer(
        &self,
        desc: webrtc::peer_connection::sdp::session_description::RTCSessionDescription,
    ) {
        self.send_signal(SignalMessage::Answer(desc));
    }

    async fn send_ice(&self, candidate: webrtc::ice_transport::ice_candidate::RTCIceCandidateInit) {
        self.send_signal(SignalMessage::IceCandidate(candidate));
    }
}

/// Owns the socket: pumps outbound messages and forwards inbound text frames
/// until the close signal, the remote close, or a transport error.
async fn run_transport(
    url: Url,
    mut out_rx: mpsc::UnboundedReceiver<Message>,
    mut close_rx: oneshot::Receiver<()>,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    state_tx: watch::Sender<ChannelState>,
) {
    let ws_stream = tokio::select! {
        connected = connect_async(url.as_str()) => match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                warn!("signaling connect failed: {}", e);
                let _ = state_tx.send(ChannelState::Failed);
                let _ = event_tx.send(ChannelEvent::Failed(e.to_string()));
                return;
            }
        },
        // Closed (or dropped) while still connecting.
        _ = &mut close_rx => {
            let _ = state_tx.send(ChannelState::Closed);
            let _ = event_tx.send(ChannelEvent::Closed);
            return;
        }
    };

    info!("signaling channel open: {}", url);
    let _ = state_tx.send(ChannelState::Open);
    let _ = event_tx.send(ChannelEvent::Opened);

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = &mut close_rx => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = state_tx.send(ChannelState::Closed);
                let _ = event_tx.send(ChannelEvent::Closed);
                break;
            },
            out = out_rx.recv() => {
                // The channel half never drops before the close signal.
                let Some(msg) = out else { break };
                if let Err(e) = sink.send(msg).await {
                    warn!("signaling send failed: {}", e);
                    let _ = state_tx.send(ChannelState::Failed);
                    let _ = event_tx.send(ChannelEvent::Failed(e.to_string()));
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = event_tx.send(ChannelEvent::Frame(text));
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("signaling channel closed by remote");
                    let _ = state_tx.send(ChannelState::Closed);
                    let _ = event_tx.send(ChannelEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("signaling transport error: {}", e);
                    let _ = state_tx.send(ChannelState::Failed);
                    let _ = event_tx.send(ChannelEvent::Failed(e.to_string()));
                    break;
                }
            },
        }
    }
}

/// Derives the room's WebSocket endpoint from the HTTP base URL:
/// `http(s)://host[:port]` becomes `ws(s)://host[:port]/ws/<roomKey>`.
pub fn room_endpoint(base: &Url, key: &RoomKey) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Channel(format!("cannot derive ws endpoint from {base}")))?;
    url.set_path(&format!("/ws/{}", key.as_str()));
    url.set_query(None);
    Ok(url)
}
