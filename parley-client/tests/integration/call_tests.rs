use std::sync::Arc;

use parley_client::{CallStatus, RoomCommand, RoomConfig, RoomEvent, RoomSession, RoomsClient, SilenceBackend};
use parley_core::RoomKey;

use crate::integration::{CALL_TIMEOUT_MS, init_tracing, wait_for_event};
use crate::utils::RelayServer;

fn call_config(relay: &RelayServer, key: &RoomKey) -> RoomConfig {
    let mut config = RoomConfig::new(relay.base.clone(), key.clone());
    config.backend = Arc::new(SilenceBackend);
    // Host candidates are enough on loopback.
    config.ice_servers = vec![];
    config
}

#[tokio::test]
async fn two_clients_negotiate_a_live_call() {
    init_tracing();

    let relay = RelayServer::spawn().await;
    let rooms = RoomsClient::new(relay.base.clone());
    let created = rooms.create().await.expect("create room");

    // Both clients open the room channel within the same window, so both
    // default to initiator and the glare tie-break decides who answers.
    let (session_a, mut handle_a) =
        RoomSession::join(call_config(&relay, &created.room_key)).expect("join a");
    let (session_b, mut handle_b) =
        RoomSession::join(call_config(&relay, &created.room_key)).expect("join b");
    tokio::spawn(session_a.run());
    tokio::spawn(session_b.run());

    let live_a = wait_for_event(&mut handle_a.events, CALL_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Call(CallStatus::Live))
    })
    .await;
    assert!(live_a.is_some(), "client a never reached a live call");

    let live_b = wait_for_event(&mut handle_b.events, CALL_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Call(CallStatus::Live))
    })
    .await;
    assert!(live_b.is_some(), "client b never reached a live call");

    // Chat keeps working next to the call on the same channel.
    handle_a
        .commands
        .send(RoomCommand::SendChat("still here".to_string()))
        .await
        .expect("send command");
    let received = wait_for_event(&mut handle_b.events, CALL_TIMEOUT_MS, |e| {
        matches!(e, RoomEvent::Chat(entry) if entry.text.contains("still here"))
    })
    .await;
    assert!(received.is_some(), "chat must flow during the call");

    let _ = handle_a.commands.send(RoomCommand::Leave).await;
    let _ = handle_b.commands.send(RoomCommand::Leave).await;
}
