/// CouchDB-backed store.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-process store with a broadcast change feed.
pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::dao::{
    models::{GameEntity, GameStatus, PlayerEntity, PlayerRole, PlayerStatus, Winner},
    storage::{StorageError, StorageResult},
};

/// Abstraction over the document database holding games and their players.
pub trait GameStore: Send + Sync {
    /// Insert or replace a game record.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert or replace a player of an existing game.
    fn save_player(
        &self,
        game_id: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a game, `None` when it does not exist.
    fn find_game(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Load one player of a game.
    fn find_player(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Roster of a game.
    fn list_players(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Apply `update` to the game and bump its version.
    ///
    /// When `expected_version` is set the write only succeeds if the stored
    /// version still matches, otherwise [`StorageError::Conflict`] is returned.
    fn update_game(
        &self,
        id: &str,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Apply `update` to one player; fails when the player is missing.
    fn update_player(
        &self,
        game_id: &str,
        player_id: &str,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Subscribe to every subsequent write on a game document.
    fn watch_games(&self) -> BoxStream<'static, StorageResult<GameChange>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Partial update of a game document; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameUpdate {
    /// New lifecycle status.
    pub status: Option<GameStatus>,
    /// Uids of the seekers.
    pub seekers: Option<Vec<String>>,
    /// Uids of the hiders.
    pub hiders: Option<Vec<String>>,
    /// Uids of the hiders caught so far.
    pub caught_hiders: Option<Vec<String>>,
    /// Winning side.
    pub winner: Option<Winner>,
    /// When the hiding window opened.
    pub start_time: Option<SystemTime>,
    /// When the seekers are due for release.
    pub hide_end_time: Option<SystemTime>,
    /// When the game times out.
    pub game_end_time: Option<SystemTime>,
    /// When the seekers were actually released.
    pub seekers_released_at: Option<SystemTime>,
    /// When the game was finished.
    pub finished_at: Option<SystemTime>,
}

impl GameUpdate {
    /// Merge the update into `game` and bump its version.
    pub fn apply_to(self, game: &mut GameEntity) {
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(seekers) = self.seekers {
            game.seekers = seekers;
        }
        if let Some(hiders) = self.hiders {
            game.hiders = hiders;
        }
        if let Some(caught) = self.caught_hiders {
            game.caught_hiders = caught;
        }
        if let Some(winner) = self.winner {
            game.winner = Some(winner);
        }
        if let Some(at) = self.start_time {
            game.start_time = Some(at);
        }
        if let Some(at) = self.hide_end_time {
            game.hide_end_time = Some(at);
        }
        if let Some(at) = self.game_end_time {
            game.game_end_time = Some(at);
        }
        if let Some(at) = self.seekers_released_at {
            game.seekers_released_at = Some(at);
        }
        if let Some(at) = self.finished_at {
            game.finished_at = Some(at);
        }
        game.version += 1;
    }
}

/// Partial update of a player document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerUpdate {
    /// Seeker or hider.
    pub role: Option<PlayerRole>,
    /// Player status within the phase.
    pub status: Option<PlayerStatus>,
    /// Hiders this seeker caught.
    pub caught_hiders: Option<Vec<String>>,
}

impl PlayerUpdate {
    /// Merge the update into `player`.
    pub fn apply_to(self, player: &mut PlayerEntity) {
        if let Some(role) = self.role {
            player.role = Some(role);
        }
        if let Some(status) = self.status {
            player.status = Some(status);
        }
        if let Some(caught) = self.caught_hiders {
            player.caught_hiders = caught;
        }
    }
}

/// A write observed on a game document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameChange {
    /// Identifier of the written game.
    pub game_id: String,
    /// Snapshot before the write, when the backend can provide it.
    pub before: Option<GameEntity>,
    /// Record as written.
    pub after: GameEntity,
}

/// Reject the write when the stored version moved since the caller read it.
pub(crate) fn ensure_version(game: &GameEntity, expected: Option<u64>) -> StorageResult<()> {
    match expected {
        Some(expected) if expected != game.version => Err(StorageError::Conflict {
            path: format!("games/{}", game.id),
            expected,
            actual: game.version,
        }),
        _ => Ok(()),
    }
}
