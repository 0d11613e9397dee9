use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::{
    game_store::{GameUpdate, PlayerUpdate},
    models::{
        GameEntity, GameSettingsEntity, GameStatus, PlayerEntity, PlayerRole, PlayerStatus, Winner,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    game_mode: String,
    status: GameStatus,
    settings: GameSettingsEntity,
    #[serde(default)]
    seekers: Vec<String>,
    #[serde(default)]
    hiders: Vec<String>,
    #[serde(default)]
    caught_hiders: Vec<String>,
    winner: Option<Winner>,
    start_time: Option<DateTime>,
    hide_end_time: Option<DateTime>,
    game_end_time: Option<DateTime>,
    seekers_released_at: Option<DateTime>,
    finished_at: Option<DateTime>,
    #[serde(default)]
    version: i64,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            game_mode: value.game_mode,
            status: value.status,
            settings: value.settings,
            seekers: value.seekers,
            hiders: value.hiders,
            caught_hiders: value.caught_hiders,
            winner: value.winner,
            start_time: value.start_time.map(DateTime::from_system_time),
            hide_end_time: value.hide_end_time.map(DateTime::from_system_time),
            game_end_time: value.game_end_time.map(DateTime::from_system_time),
            seekers_released_at: value.seekers_released_at.map(DateTime::from_system_time),
            finished_at: value.finished_at.map(DateTime::from_system_time),
            version: value.version as i64,
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            game_mode: value.game_mode,
            status: value.status,
            settings: value.settings,
            seekers: value.seekers,
            hiders: value.hiders,
            caught_hiders: value.caught_hiders,
            winner: value.winner,
            start_time: value.start_time.map(DateTime::to_system_time),
            hide_end_time: value.hide_end_time.map(DateTime::to_system_time),
            game_end_time: value.game_end_time.map(DateTime::to_system_time),
            seekers_released_at: value.seekers_released_at.map(DateTime::to_system_time),
            finished_at: value.finished_at.map(DateTime::to_system_time),
            version: value.version.max(0) as u64,
        }
    }
}

/// Player stored in the flat `players` collection, keyed by `(gameId, playerId)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPlayerDocument {
    pub game_id: String,
    pub player_id: String,
    uid: String,
    name: String,
    fcm_token: Option<String>,
    role: Option<PlayerRole>,
    status: Option<PlayerStatus>,
    #[serde(default)]
    caught_hiders: Vec<String>,
}

impl From<(String, PlayerEntity)> for MongoPlayerDocument {
    fn from((game_id, player): (String, PlayerEntity)) -> Self {
        Self {
            game_id,
            player_id: player.id,
            uid: player.uid,
            name: player.name,
            fcm_token: player.fcm_token,
            role: player.role,
            status: player.status,
            caught_hiders: player.caught_hiders,
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.player_id,
            uid: value.uid,
            name: value.name,
            fcm_token: value.fcm_token,
            role: value.role,
            status: value.status,
            caught_hiders: value.caught_hiders,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

/// Match game `id` only while its stored version equals `expected`.
///
/// Games created by the lobby carry no `version` field yet; they count as version 0.
pub fn versioned_game_filter(id: &str, expected: Option<u64>) -> Document {
    let mut filter = doc_id(id);
    match expected {
        None => {}
        Some(0) => {
            filter.insert("version", doc! { "$in": [0_i64, null] });
        }
        Some(version) => {
            filter.insert("version", version as i64);
        }
    }
    filter
}

pub fn player_key(game_id: &str, player_id: &str) -> Document {
    doc! {"gameId": game_id, "playerId": player_id}
}

/// Translate a partial game update into a `$set` document.
pub fn game_set_document(update: &GameUpdate) -> Document {
    let mut set = Document::new();
    if let Some(status) = update.status {
        set.insert("status", status.as_str());
    }
    if let Some(seekers) = &update.seekers {
        set.insert("seekers", seekers.clone());
    }
    if let Some(hiders) = &update.hiders {
        set.insert("hiders", hiders.clone());
    }
    if let Some(caught) = &update.caught_hiders {
        set.insert("caughtHiders", caught.clone());
    }
    if let Some(winner) = update.winner {
        set.insert("winner", winner.as_str());
    }
    let timestamps = [
        ("startTime", update.start_time),
        ("hideEndTime", update.hide_end_time),
        ("gameEndTime", update.game_end_time),
        ("seekersReleasedAt", update.seekers_released_at),
        ("finishedAt", update.finished_at),
    ];
    for (key, value) in timestamps {
        if let Some(at) = value {
            set.insert(key, DateTime::from_system_time(at));
        }
    }
    set
}

/// Translate a partial player update into a `$set` document.
pub fn player_set_document(update: &PlayerUpdate) -> Document {
    let mut set = Document::new();
    if let Some(role) = update.role {
        set.insert("role", role.as_str());
    }
    if let Some(status) = update.status {
        set.insert("status", status.as_str());
    }
    if let Some(caught) = &update.caught_hiders {
        set.insert("caughtHiders", caught.clone());
    }
    set
}
