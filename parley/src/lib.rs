pub use parley_core::model::RoomKey;

pub mod model {
    pub use parley_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use parley_client::*;
}
