use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{TimestampMilliSeconds, serde_as, skip_serializing_none};

use crate::dao::models::{
    GameEntity, GameSettingsEntity, GameStatus, PlayerEntity, PlayerRole, PlayerStatus, Winner,
};

pub const GAME_PREFIX: &str = "game::";
pub const PLAYER_PREFIX: &str = "player::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body of a `_changes` long-poll response.
#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameBody,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameBody {
    pub game_id: String,
    pub game_mode: String,
    pub status: GameStatus,
    pub settings: GameSettingsEntity,
    #[serde(default)]
    pub seekers: Vec<String>,
    #[serde(default)]
    pub hiders: Vec<String>,
    #[serde(default)]
    pub caught_hiders: Vec<String>,
    pub winner: Option<Winner>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub start_time: Option<SystemTime>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub hide_end_time: Option<SystemTime>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub game_end_time: Option<SystemTime>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub seekers_released_at: Option<SystemTime>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub finished_at: Option<SystemTime>,
    #[serde(default)]
    pub version: u64,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(&game.id),
            rev,
            game: GameBody {
                game_id: game.id,
                game_mode: game.game_mode,
                status: game.status,
                settings: game.settings,
                seekers: game.seekers,
                hiders: game.hiders,
                caught_hiders: game.caught_hiders,
                winner: game.winner,
                start_time: game.start_time,
                hide_end_time: game.hide_end_time,
                game_end_time: game.game_end_time,
                seekers_released_at: game.seekers_released_at,
                finished_at: game.finished_at,
                version: game.version,
            },
        }
    }
}

impl From<CouchGameDocument> for GameEntity {
    fn from(doc: CouchGameDocument) -> Self {
        let body = doc.game;
        Self {
            id: body.game_id,
            game_mode: body.game_mode,
            status: body.status,
            settings: body.settings,
            seekers: body.seekers,
            hiders: body.hiders,
            caught_hiders: body.caught_hiders,
            winner: body.winner,
            start_time: body.start_time,
            hide_end_time: body.hide_end_time,
            game_end_time: body.game_end_time,
            seekers_released_at: body.seekers_released_at,
            finished_at: body.finished_at,
            version: body.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub player: PlayerBody,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBody {
    pub game_id: String,
    pub player_id: String,
    pub uid: String,
    pub name: String,
    pub fcm_token: Option<String>,
    pub role: Option<PlayerRole>,
    pub status: Option<PlayerStatus>,
    #[serde(default)]
    pub caught_hiders: Vec<String>,
}

impl From<(String, PlayerEntity, Option<String>)> for CouchPlayerDocument {
    fn from((game_id, player, rev): (String, PlayerEntity, Option<String>)) -> Self {
        Self {
            id: player_doc_id(&game_id, &player.id),
            rev,
            player: PlayerBody {
                game_id,
                player_id: player.id,
                uid: player.uid,
                name: player.name,
                fcm_token: player.fcm_token,
                role: player.role,
                status: player.status,
                caught_hiders: player.caught_hiders,
            },
        }
    }
}

impl From<CouchPlayerDocument> for PlayerEntity {
    fn from(doc: CouchPlayerDocument) -> Self {
        let body = doc.player;
        Self {
            id: body.player_id,
            uid: body.uid,
            name: body.name,
            fcm_token: body.fcm_token,
            role: body.role,
            status: body.status,
            caught_hiders: body.caught_hiders,
        }
    }
}

pub fn game_doc_id(id: &str) -> String {
    format!("{GAME_PREFIX}{id}")
}

pub fn player_doc_id(game_id: &str, player_id: &str) -> String {
    format!("{}{}", players_prefix(game_id), player_id)
}

/// Key prefix shared by every player document of `game_id`.
pub fn players_prefix(game_id: &str) -> String {
    format!("{PLAYER_PREFIX}{game_id}:")
}
