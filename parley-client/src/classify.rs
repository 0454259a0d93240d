use parley_core::SignalMessage;

/// An inbound frame after classification.
#[derive(Debug)]
pub enum Inbound {
    Signal(SignalMessage),
    Chat(String),
}

/// Routes one inbound text frame.
///
/// A frame is negotiation iff it decodes as a [`SignalMessage`]; everything
/// else (non-JSON, unknown `type`, missing envelope shape) is chat text,
/// verbatim. Malformed structured input degrades to chat instead of being
/// dropped; the two message kinds share one channel by design.
pub fn classify(frame: String) -> Inbound {
    match serde_json::from_str::<SignalMessage>(&frame) {
        Ok(signal) => Inbound::Signal(signal),
        Err(_) => Inbound::Chat(frame),
    }
}
