use parley_core::ChatEntry;

/// Append-only log of chat entries, in send/arrival order. No dedup, no
/// removal; whether a send is accepted at all is the session's decision.
#[derive(Debug, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a locally sent line and returns the entry for fan-out.
    pub fn push_local(&mut self, text: impl Into<String>) -> ChatEntry {
        let entry = ChatEntry::local(text);
        self.entries.push(entry.clone());
        entry
    }

    /// Appends a received line, verbatim.
    pub fn push_remote(&mut self, text: impl Into<String>) -> ChatEntry {
        let entry = ChatEntry::remote(text);
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
