pub mod channel;
pub mod chat;
pub mod classify;
pub mod error;
pub mod media;
pub mod negotiation;
pub mod rooms;
pub mod session;

pub use channel::{ChannelEvent, ChannelSink, SignalingChannel, room_endpoint};
pub use chat::ChatLog;
pub use classify::{Inbound, classify};
pub use error::{ClientError, Result};
pub use media::{
    AudioBackend, CaptureHandle, CpalBackend, MediaEvent, MediaSession, PlaybackHandle,
    SilenceBackend,
};
pub use negotiation::{NegotiationEngine, SignalingSink};
pub use rooms::{CreatedRoom, RoomsClient};
pub use session::{CallStatus, RoomCommand, RoomConfig, RoomEvent, RoomHandle, RoomSession};
