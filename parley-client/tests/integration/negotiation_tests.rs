use std::sync::Arc;
use std::time::Duration;

use parley_client::{
    AudioBackend, CaptureHandle, ClientError, MediaEvent, MediaSession, NegotiationEngine,
    PlaybackHandle,
};
use parley_core::{NegotiationRole, SessionState, SignalMessage};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::integration::{EVENT_TIMEOUT_MS, init_tracing, test_engine};
use crate::utils::CollectingSink;

#[tokio::test]
async fn initiator_offer_then_answer_connects() {
    init_tracing();

    let sink_a = CollectingSink::new();
    let sink_b = CollectingSink::new();
    let (mut a, _a_media) = test_engine(sink_a.clone());
    let (mut b, _b_media) = test_engine(sink_b.clone());

    a.start().await;
    assert_eq!(a.role(), NegotiationRole::Initiator);
    assert_eq!(a.state(), SessionState::AwaitingAnswer);

    let offer = sink_a.offers().await.pop().expect("offer was sent");

    // B never started: the offer assigns the responder role and creates its
    // peer resource on demand, then exactly one answer goes out.
    b.handle_signal(SignalMessage::Offer(offer.clone())).await;
    assert_eq!(b.role(), NegotiationRole::Responder);
    assert_eq!(b.state(), SessionState::Connected);
    assert_eq!(sink_b.answers().await.len(), 1);
    assert_eq!(sink_b.offers().await.len(), 0);

    // B's remote description is exactly the offer A sent.
    let b_remote = b
        .peer()
        .expect("responder peer exists")
        .remote_description()
        .await
        .expect("remote description set");
    assert_eq!(b_remote.sdp, offer.sdp);

    let answer = sink_b.answers().await.pop().expect("answer was sent");
    a.handle_signal(SignalMessage::Answer(answer.clone())).await;
    assert_eq!(a.state(), SessionState::Connected);

    let a_remote = a
        .peer()
        .expect("initiator peer exists")
        .remote_description()
        .await
        .expect("remote description set");
    assert_eq!(a_remote.sdp, answer.sdp);

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn glare_resolves_to_single_initiator() {
    init_tracing();

    let sink_a = CollectingSink::new();
    let sink_b = CollectingSink::new();
    let (mut a, _a_media) = test_engine(sink_a.clone());
    let (mut b, _b_media) = test_engine(sink_b.clone());

    // Both open the channel within the same window; both offer.
    a.start().await;
    b.start().await;
    let offer_a = sink_a.offers().await.pop().expect("a offered");
    let offer_b = sink_b.offers().await.pop().expect("b offered");

    // Cross delivery: each side sees the other's offer while its own is
    // outstanding.
    a.handle_signal(SignalMessage::Offer(offer_b.clone())).await;
    b.handle_signal(SignalMessage::Offer(offer_a.clone())).await;

    let roles = [a.role(), b.role()];
    assert!(
        roles.contains(&NegotiationRole::Initiator) && roles.contains(&NegotiationRole::Responder),
        "tie-break must leave one initiator and one responder, got {roles:?}"
    );

    // Exactly one side yielded and answered.
    let answers_a = sink_a.answers().await;
    let answers_b = sink_b.answers().await;
    assert_eq!(answers_a.len() + answers_b.len(), 1);

    if let Some(answer) = answers_b.into_iter().next() {
        a.handle_signal(SignalMessage::Answer(answer)).await;
        assert_eq!(a.state(), SessionState::Connected);
        assert_eq!(b.state(), SessionState::Connected);
    } else if let Some(answer) = answers_a.into_iter().next() {
        b.handle_signal(SignalMessage::Answer(answer)).await;
        assert_eq!(b.state(), SessionState::Connected);
        assert_eq!(a.state(), SessionState::Connected);
    }

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn candidates_queue_until_remote_description() {
    init_tracing();

    let sink_a = CollectingSink::new();
    let sink_b = CollectingSink::new();
    let (mut a, mut a_media) = test_engine(sink_a.clone());
    let (mut b, _b_media) = test_engine(sink_b.clone());

    a.start().await;
    let offer = sink_a.offers().await.pop().expect("a offered");

    // Pump A's first gathered candidate through the engine, as the session
    // loop would.
    let candidate = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), async {
        loop {
            match a_media.recv().await {
                Some(MediaEvent::LocalCandidate(c)) => break c,
                Some(_) => continue,
                None => panic!("media event stream ended"),
            }
        }
    })
    .await
    .expect("host candidate gathered");
    a.handle_local_candidate(candidate.clone()).await;
    assert_eq!(sink_a.candidates().await.len(), 1);

    // Delivered before the offer, the candidate parks in the queue.
    b.handle_signal(SignalMessage::IceCandidate(candidate)).await;
    assert_eq!(b.pending_candidate_count(), 1);

    // The offer lands; the queued candidate is applied and the queue drains.
    b.handle_signal(SignalMessage::Offer(offer)).await;
    assert_eq!(b.pending_candidate_count(), 0);
    assert_eq!(b.state(), SessionState::Connected);

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn unexpected_answer_is_absorbed() {
    init_tracing();

    let sink = CollectingSink::new();
    let (mut engine, _media) = test_engine(sink.clone());

    let stray: RTCSessionDescription =
        serde_json::from_str(r#"{"type":"answer","sdp":"v=0\r\n"}"#).unwrap();

    // No peer resource at all: the answer is ignored outright.
    engine.handle_signal(SignalMessage::Answer(stray.clone())).await;
    assert_eq!(engine.state(), SessionState::Idle);

    // With an offer in flight, a malformed answer fails to apply and the
    // state stays put; no rollback, no panic.
    engine.start().await;
    assert_eq!(engine.state(), SessionState::AwaitingAnswer);
    engine.handle_signal(SignalMessage::Answer(stray)).await;
    assert_eq!(engine.state(), SessionState::AwaitingAnswer);

    engine.close().await;
}

struct FailingBackend;

impl AudioBackend for FailingBackend {
    fn start_capture(&self) -> parley_client::Result<CaptureHandle> {
        Err(ClientError::MediaAcquisition("no input device".to_string()))
    }

    fn start_playback(&self) -> parley_client::Result<PlaybackHandle> {
        Err(ClientError::MediaAcquisition("no output device".to_string()))
    }
}

#[tokio::test]
async fn media_failure_aborts_negotiation_to_idle() {
    init_tracing();

    let sink = CollectingSink::new();
    let (media, _media_events) = MediaSession::new(Arc::new(FailingBackend), vec![]);
    let mut engine = NegotiationEngine::new(media, Arc::new(sink.clone()));

    engine.start().await;
    assert_eq!(engine.state(), SessionState::Idle);
    assert!(sink.offers().await.is_empty(), "no offer after media failure");

    // A second channel-open does not retry into a broken state either.
    engine.start().await;
    assert_eq!(engine.state(), SessionState::Idle);

    engine.close().await;
    assert_eq!(engine.state(), SessionState::Closed);
}

#[tokio::test]
async fn close_is_terminal_and_idempotent() {
    init_tracing();

    let sink = CollectingSink::new();
    let (mut engine, _media) = test_engine(sink.clone());

    engine.start().await;
    engine.close().await;
    assert_eq!(engine.state(), SessionState::Closed);

    // Envelopes after close are ignored.
    let stray: RTCSessionDescription =
        serde_json::from_str(r#"{"type":"offer","sdp":"v=0\r\n"}"#).unwrap();
    engine.handle_signal(SignalMessage::Offer(stray)).await;
    assert_eq!(engine.state(), SessionState::Closed);

    engine.close().await;
    assert_eq!(engine.state(), SessionState::Closed);
}
