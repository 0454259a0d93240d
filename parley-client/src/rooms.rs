use serde::Deserialize;
use tracing::debug;
use url::Url;

use parley_core::RoomKey;

use crate::error::{ClientError, Result};

/// A freshly created room: the shareable link plus the key extracted from
/// it (or sent alongside it; either shape of the response works).
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub room_key: RoomKey,
    pub room_link: String,
}

#[derive(Deserialize)]
struct CreatedRoomWire {
    room_key: Option<RoomKey>,
    room_link: String,
}

/// Stateless client for the room service collaborator endpoints. Knows
/// nothing about key formats or room lifetimes; success means joinable.
pub struct RoomsClient {
    http: reqwest::Client,
    base: Url,
}

impl RoomsClient {
    pub fn new(mut base: Url) -> Self {
        // `Url::join` resolves against the last path segment, so the base
        // must end in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub async fn create(&self) -> Result<CreatedRoom> {
        let url = self.base.join("create_room")?;
        debug!("creating room via {}", url);
        let wire = self
            .http
            .post(url)
            .send()
            .await?
            .error_for_status()?
            .json::<CreatedRoomWire>()
            .await?;
        let room_key = wire
            .room_key
            .unwrap_or_else(|| RoomKey::parse(&wire.room_link));
        Ok(CreatedRoom {
            room_key,
            room_link: wire.room_link,
        })
    }

    /// Success implies the room exists and is joinable.
    pub async fn check(&self, key: &RoomKey) -> Result<()> {
        let url = self.base.join(&format!("room/{key}"))?;
        debug!("checking room via {}", url);
        let response = self.http.get(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::RoomNotFound(key.to_string()))
        }
    }
}
