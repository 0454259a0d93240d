use serde::{Deserialize, Serialize};

/// Which side of the offer/answer exchange this session took.
///
/// Assigned once per room visit, on the first negotiation action taken or
/// received; the only later change is the documented glare yield from
/// `Initiator` to `Responder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationRole {
    Unassigned,
    Initiator,
    Responder,
}

/// Lifecycle of the signaling connection. Sends are only permitted in `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Phases of the negotiation state machine. `Closed` is terminal and
/// reachable from every other state on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LocalMediaAcquiring,
    PeerCreated,
    OfferCreating,
    OfferSent,
    AwaitingAnswer,
    AwaitingOffer,
    AnswerCreating,
    AnswerSent,
    Connected,
    Closed,
}
