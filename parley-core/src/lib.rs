pub mod model;

pub use model::{
    ChannelState, ChatEntry, ChatOrigin, IceServerConfig, NegotiationRole, RoomKey, SessionState,
    SignalMessage,
};
