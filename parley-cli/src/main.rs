use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{Confirm, Input, Select};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

use parley_client::{RoomConfig, RoomsClient, SilenceBackend};
use parley_core::{IceServerConfig, RoomKey};

mod room;

#[derive(Parser)]
#[command(name = "parley", about = "Two-party voice rooms with text chat", version)]
struct Cli {
    /// Room service base URL.
    #[arg(long, global = true, default_value = "http://localhost:8000")]
    server: String,

    /// STUN/TURN server URL (repeatable; public STUN by default).
    #[arg(long = "stun", global = true)]
    stun: Vec<String>,

    /// Join without microphone capture or an audio call (chat only).
    #[arg(long, global = true)]
    no_audio: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new room and print the shareable link.
    Create,
    /// Join an existing room by key or shareable link.
    Join {
        /// Room key or full room link.
        room: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let server = Url::parse(&cli.server).context("invalid --server url")?;

    match &cli.command {
        Some(Commands::Create) => create_room(&cli, &server).await,
        Some(Commands::Join { room }) => join_room(&cli, &server, RoomKey::parse(room)).await,
        None => landing(&cli, &server).await,
    }
}

async fn landing(cli: &Cli, server: &Url) -> Result<()> {
    println!("{}", "Virtual meeting space".bold());
    let choice = Select::new()
        .with_prompt("What would you like to do?")
        .items(&["Create a room", "Join a room"])
        .default(0)
        .interact()?;

    match choice {
        0 => create_room(cli, server).await,
        _ => {
            let room: String = Input::new()
                .with_prompt("Room key or link")
                .interact_text()?;
            join_room(cli, server, RoomKey::parse(&room)).await
        }
    }
}

async fn create_room(cli: &Cli, server: &Url) -> Result<()> {
    let rooms = RoomsClient::new(server.clone());
    let created = rooms.create().await.context("failed to create room")?;

    println!("{}", "Room ready! Share this link:".green().bold());
    println!("  {}", created.room_link.bold());

    let enter = Confirm::new()
        .with_prompt("Enter the room now?")
        .default(true)
        .interact()?;
    if enter {
        enter_room(cli, server, created.room_key).await?;
    }
    Ok(())
}

async fn join_room(cli: &Cli, server: &Url, key: RoomKey) -> Result<()> {
    let rooms = RoomsClient::new(server.clone());
    if let Err(e) = rooms.check(&key).await {
        println!("{} {}", "Cannot join:".red().bold(), e);
        return Ok(());
    }
    enter_room(cli, server, key).await
}

async fn enter_room(cli: &Cli, server: &Url, key: RoomKey) -> Result<()> {
    let mut config = RoomConfig::new(server.clone(), key);
    if !cli.stun.is_empty() {
        config.ice_servers = cli.stun.iter().cloned().map(IceServerConfig::stun).collect();
    }
    if cli.no_audio {
        config.call_enabled = false;
        config.backend = Arc::new(SilenceBackend);
    }
    room::run(config).await
}
