use std::time::Duration;
use url::Url;

use parley_client::{RoomCommand, RoomConfig, RoomEvent, RoomSession, RoomsClient};
use parley_core::{ChatOrigin, RoomKey};

use crate::integration::{EVENT_TIMEOUT_MS, init_tracing, wait_for_event};
use crate::utils::RelayServer;

async fn join_chat_only(relay: &RelayServer, key: &RoomKey) -> parley_client::RoomHandle {
    let mut config = RoomConfig::new(relay.base.clone(), key.clone());
    config.call_enabled = false;
    let (session, mut handle) = RoomSession::join(config).expect("join");
    tokio::spawn(session.run());
    wait_for_event(&mut handle.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::ChannelOpen)
    })
    .await
    .expect("channel open");
    handle
}

#[tokio::test]
async fn chat_roundtrip_over_relay() {
    init_tracing();

    let relay = RelayServer::spawn().await;
    let rooms = RoomsClient::new(relay.base.clone());
    let created = rooms.create().await.expect("create room");

    let mut handle_a = join_chat_only(&relay, &created.room_key).await;
    let mut handle_b = join_chat_only(&relay, &created.room_key).await;

    handle_a
        .commands
        .send(RoomCommand::SendChat("hello".to_string()))
        .await
        .expect("send command");

    // Optimistic echo: the local entry is first, unmodified.
    let echo = wait_for_event(&mut handle_a.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Chat(_))
    })
    .await
    .expect("local echo");
    match echo {
        RoomEvent::Chat(entry) => {
            assert_eq!(entry.origin, ChatOrigin::Local);
            assert_eq!(entry.text, "hello");
        }
        other => panic!("expected chat entry, got {other:?}"),
    }

    // The peer receives the relayed line with the relay's origin prefix.
    let received = wait_for_event(&mut handle_b.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Chat(entry) if entry.origin == ChatOrigin::Remote)
    })
    .await
    .expect("relayed chat");
    match received {
        RoomEvent::Chat(entry) => assert_eq!(entry.text, "other: hello"),
        other => panic!("expected chat entry, got {other:?}"),
    }

    // The sender also gets its own line back from the relay.
    let relayed_back = wait_for_event(&mut handle_a.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Chat(entry) if entry.origin == ChatOrigin::Remote)
    })
    .await
    .expect("relay echo");
    match relayed_back {
        RoomEvent::Chat(entry) => assert_eq!(entry.text, "me: hello"),
        other => panic!("expected chat entry, got {other:?}"),
    }

    let _ = handle_a.commands.send(RoomCommand::Leave).await;
    let _ = handle_b.commands.send(RoomCommand::Leave).await;
}

#[tokio::test]
async fn malformed_envelope_degrades_to_chat() {
    init_tracing();

    let relay = RelayServer::spawn().await;
    let rooms = RoomsClient::new(relay.base.clone());
    let created = rooms.create().await.expect("create room");

    let mut handle_a = join_chat_only(&relay, &created.room_key).await;
    let mut handle_b = join_chat_only(&relay, &created.room_key).await;

    // Valid JSON, not a valid envelope. The relay forwards it verbatim (to
    // others only); the receiver's decode fails and the frame lands in the
    // chat log untouched.
    let frame = r#"{"type":"bogus","data":1}"#;
    handle_a
        .commands
        .send(RoomCommand::SendChat(frame.to_string()))
        .await
        .expect("send command");

    let received = wait_for_event(&mut handle_b.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Chat(entry) if entry.origin == ChatOrigin::Remote)
    })
    .await
    .expect("fallback chat");
    match received {
        RoomEvent::Chat(entry) => assert_eq!(entry.text, frame),
        other => panic!("expected chat entry, got {other:?}"),
    }

    let _ = handle_a.commands.send(RoomCommand::Leave).await;
    let _ = handle_b.commands.send(RoomCommand::Leave).await;
}

#[tokio::test]
async fn chat_before_open_is_dropped() {
    init_tracing();

    // Bound but never accepted: the channel stays in Connecting forever.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();

    let mut config = RoomConfig::new(base, RoomKey::parse("abc123"));
    config.call_enabled = false;
    let (session, mut handle) = RoomSession::join(config).expect("join");
    tokio::spawn(session.run());

    handle
        .commands
        .send(RoomCommand::SendChat("too early".to_string()))
        .await
        .expect("send command");

    // No transmission, no log entry, no event of any kind.
    let got = tokio::time::timeout(Duration::from_millis(300), handle.events.recv()).await;
    assert!(got.is_err(), "expected silence while connecting, got {got:?}");

    let _ = handle.commands.send(RoomCommand::Leave).await;
}

#[tokio::test]
async fn unknown_room_is_rejected_by_check() {
    init_tracing();

    let relay = RelayServer::spawn().await;
    let rooms = RoomsClient::new(relay.base.clone());

    let err = rooms.check(&RoomKey::parse("no-such-room")).await;
    assert!(err.is_err(), "check must fail for unknown rooms");

    let created = rooms.create().await.expect("create room");
    rooms.check(&created.room_key).await.expect("created room is joinable");
}
