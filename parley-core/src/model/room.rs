use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque room key issued by the room service.
///
/// Accepts either a bare key or a full shareable room link
/// (`http://host/room/<key>`), since that is what users paste.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoomKey(String);

impl RoomKey {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.rsplit_once("/room/") {
            Some((_, key)) if !key.is_empty() => Self(key.trim_matches('/').to_string()),
            _ => Self(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomKey {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
