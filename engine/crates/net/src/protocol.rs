use serde::{Deserialize, Serialize};

/// Client-to-server envelope, flat as it appears on the wire.
///
/// Every field is optional on input; which ones matter depends on `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientEnvelope {
    #[serde(rename = "playerID")]
    pub player_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Generic payload; the world id for `getWorld`.
    pub message: String,
    pub direction: String,
}

impl ClientEnvelope {
    pub fn get_player(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            kind: "getPlayer".to_string(),
            ..Self::default()
        }
    }

    pub fn move_player(player_id: impl Into<String>, direction: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            kind: "move".to_string(),
            direction: direction.into(),
            ..Self::default()
        }
    }

    pub fn get_world(world_id: impl Into<String>) -> Self {
        Self {
            kind: "getWorld".to_string(),
            message: world_id.into(),
            ..Self::default()
        }
    }

    /// Interpret the envelope by its `type` tag.
    pub fn into_request(self) -> ClientRequest {
        match self.kind.as_str() {
            "getPlayer" => ClientRequest::GetPlayer {
                player_id: self.player_id,
            },
            "move" => ClientRequest::Move {
                player_id: self.player_id,
                direction: self.direction,
            },
            "getWorld" => ClientRequest::GetWorld {
                world_id: self.message,
            },
            _ => ClientRequest::Unknown { kind: self.kind },
        }
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    GetPlayer { player_id: String },
    /// `direction` stays a raw token; validating it is part of the move.
    Move { player_id: String, direction: String },
    GetWorld { world_id: String },
    Unknown { kind: String },
}

/// Server-to-client message (internally tagged JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// `world` is null when the requested id is unknown.
    World { world: Option<WorldWire> },
    Player { player: PlayerWire },
    PlayerUpdate { msg: String, player: PlayerWire },
    MobsUpdate { mobs: Vec<MobWire> },
    Error { msg: String },
    Success { msg: String },
}

impl ServerMessage {
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self::Error {
            msg: msg.to_string(),
        }
    }
}

/// Wire representation of a world: dimensions plus row-major layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldWire {
    pub id: String,
    pub width: usize,
    pub height: usize,
    pub layout: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerWire {
    pub id: String,
    #[serde(rename = "worldID")]
    pub world_id: String,
    pub x: i32,
    pub y: i32,
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
    pub range: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobWire {
    pub id: String,
    pub name: String,
    #[serde(rename = "worldID")]
    pub world_id: String,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
    pub attack_speed: i32,
    pub glyph: char,
}
