use serde::{Deserialize, Serialize};

/// Which side of the room produced a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatOrigin {
    Local,
    Remote,
}

/// A single chat line. Entries are never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub text: String,
    pub origin: ChatOrigin,
}

impl ChatEntry {
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: ChatOrigin::Local,
        }
    }

    pub fn remote(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: ChatOrigin::Remote,
        }
    }
}
