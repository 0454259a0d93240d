mod chat;
mod ice;
mod room;
mod signal;
mod state;

pub use chat::{ChatEntry, ChatOrigin};
pub use ice::IceServerConfig;
pub use room::RoomKey;
pub use signal::SignalMessage;
pub use state::{ChannelState, NegotiationRole, SessionState};
