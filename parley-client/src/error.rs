use thiserror::Error;

/// Failures of the room client. All of them are handled locally: logged,
/// attempted at most once, never re-thrown across the session boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("media acquisition failed: {0}")]
    MediaAcquisition(String),

    #[error("signaling channel failure: {0}")]
    Channel(String),

    #[error("negotiation failure: {0}")]
    Negotiation(#[from] webrtc::Error),

    #[error("audio codec error: {0}")]
    Codec(#[from] opus::Error),

    #[error("room service error: {0}")]
    Rooms(#[from] reqwest::Error),

    #[error("room not found or expired: {0}")]
    RoomNotFound(String),

    #[error("invalid endpoint url: {0}")]
    Endpoint(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
