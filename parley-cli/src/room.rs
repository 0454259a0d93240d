use anyhow::Result;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_client::{CallStatus, RoomCommand, RoomConfig, RoomEvent, RoomSession};
use parley_core::ChatOrigin;

/// Interactive loop for one room visit. Typed lines become chat sends,
/// `/quit` leaves, room events print as they arrive.
pub async fn run(config: RoomConfig) -> Result<()> {
    let key = config.room_key.clone();
    let (session, mut handle) = RoomSession::join(config)?;
    let session_task = tokio::spawn(session.run());

    println!("{} {}", "Room:".bold(), key.to_string().bold());
    println!("{}", "Type a message and press enter. /quit to leave.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(RoomEvent::ChannelOpen) => {
                    println!("{}", "Connected to the room channel.".green());
                }
                Some(RoomEvent::Chat(entry)) => match entry.origin {
                    ChatOrigin::Local => println!("{} {}", "me:".blue().bold(), entry.text),
                    ChatOrigin::Remote => println!("{} {}", "peer:".magenta().bold(), entry.text),
                },
                Some(RoomEvent::Call(status)) => print_call_status(status),
                Some(RoomEvent::ChannelFailed(reason)) => {
                    println!("{} {}", "Channel failed:".red().bold(), reason);
                    break;
                }
                Some(RoomEvent::ChannelClosed) | None => {
                    println!("{}", "Room channel closed.".yellow());
                    break;
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if text == "/quit" {
                        let _ = handle.commands.send(RoomCommand::Leave).await;
                        break;
                    }
                    let _ = handle
                        .commands
                        .send(RoomCommand::SendChat(text.to_string()))
                        .await;
                }
                Ok(None) | Err(_) => {
                    let _ = handle.commands.send(RoomCommand::Leave).await;
                    break;
                }
            },
        }
    }

    let _ = session_task.await;
    Ok(())
}

fn print_call_status(status: CallStatus) {
    match status {
        CallStatus::Negotiating => println!("{}", "Call: negotiating".dimmed()),
        CallStatus::Live => println!("{}", "Call: live, audio is flowing.".green().bold()),
        CallStatus::Ended => println!("{}", "Call: ended.".yellow()),
        CallStatus::Failed => println!("{}", "Call: failed (chat still works).".red()),
    }
}
