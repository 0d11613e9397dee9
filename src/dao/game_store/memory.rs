//! Process-local store used for development runs and the test-suite.

use std::sync::Arc;

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;

use crate::dao::{
    game_store::{GameChange, GameStore, GameUpdate, PlayerUpdate, ensure_version},
    models::{GameEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

const CHANGE_FEED_CAPACITY: usize = 64;

/// [`GameStore`] kept in process memory; every write is published on its change feed.
#[derive(Clone)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    games: DashMap<String, StoredGame>,
    changes: broadcast::Sender<GameChange>,
}

struct StoredGame {
    game: GameEntity,
    players: IndexMap<String, PlayerEntity>,
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGameStore {
    /// Empty store.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                games: DashMap::new(),
                changes,
            }),
        }
    }

    fn publish(&self, change: GameChange) {
        // Nobody listening is fine.
        let _ = self.inner.changes.send(change);
    }

    fn save_game_sync(&self, game: GameEntity) {
        let id = game.id.clone();
        let before = match self.inner.games.get_mut(&id) {
            Some(mut stored) => Some(std::mem::replace(&mut stored.game, game.clone())),
            None => {
                self.inner.games.insert(
                    id.clone(),
                    StoredGame {
                        game: game.clone(),
                        players: IndexMap::new(),
                    },
                );
                None
            }
        };

        self.publish(GameChange {
            game_id: id,
            before,
            after: game,
        });
    }

    fn update_game_sync(
        &self,
        id: &str,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> StorageResult<GameEntity> {
        let (before, after) = {
            let mut stored = self
                .inner
                .games
                .get_mut(id)
                .ok_or_else(|| StorageError::game_not_found(id))?;
            ensure_version(&stored.game, expected_version)?;
            let before = stored.game.clone();
            update.apply_to(&mut stored.game);
            (before, stored.game.clone())
        };

        self.publish(GameChange {
            game_id: id.to_owned(),
            before: Some(before),
            after: after.clone(),
        });
        Ok(after)
    }

    fn update_player_sync(
        &self,
        game_id: &str,
        player_id: &str,
        update: PlayerUpdate,
    ) -> StorageResult<()> {
        let mut stored = self
            .inner
            .games
            .get_mut(game_id)
            .ok_or_else(|| StorageError::game_not_found(game_id))?;
        let player = stored
            .players
            .get_mut(player_id)
            .ok_or_else(|| StorageError::player_not_found(game_id, player_id))?;
        update.apply_to(player);
        Ok(())
    }
}

impl GameStore for MemoryGameStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.save_game_sync(game);
            Ok(())
        })
    }

    fn save_player(
        &self,
        game_id: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        Box::pin(async move {
            let mut stored = store
                .inner
                .games
                .get_mut(&game_id)
                .ok_or_else(|| StorageError::game_not_found(&game_id))?;
            stored.players.insert(player.id.clone(), player);
            Ok(())
        })
    }

    fn find_game(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { Ok(store.inner.games.get(&id).map(|stored| stored.game.clone())) })
    }

    fn find_player(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        let (game_id, player_id) = (game_id.to_owned(), player_id.to_owned());
        Box::pin(async move {
            Ok(store
                .inner
                .games
                .get(&game_id)
                .and_then(|stored| stored.players.get(&player_id).cloned()))
        })
    }

    fn list_players(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        Box::pin(async move {
            Ok(store
                .inner
                .games
                .get(&game_id)
                .map(|stored| stored.players.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn update_game(
        &self,
        id: &str,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { store.update_game_sync(&id, expected_version, update) })
    }

    fn update_player(
        &self,
        game_id: &str,
        player_id: &str,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let (game_id, player_id) = (game_id.to_owned(), player_id.to_owned());
        Box::pin(async move { store.update_player_sync(&game_id, &player_id, update) })
    }

    fn watch_games(&self) -> BoxStream<'static, StorageResult<GameChange>> {
        BroadcastStream::new(self.inner.changes.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(change) => Some(Ok(change)),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "in-memory change feed lagged; dropping events");
                        None
                    }
                }
            })
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{GameSettingsEntity, GameStatus};

    fn game(id: &str) -> GameEntity {
        GameEntity::new_starting(
            id,
            "classic",
            GameSettingsEntity {
                seeker_amount: 1,
                hide_duration: 5,
                game_duration: 10,
            },
        )
    }

    #[tokio::test]
    async fn versioned_update_rejects_stale_writer() {
        let store = MemoryGameStore::new();
        store.save_game(game("g1")).await.unwrap();

        let updated = store
            .update_game(
                "g1",
                Some(0),
                GameUpdate {
                    status: Some(GameStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 1);

        let err = store
            .update_game(
                "g1",
                Some(0),
                GameUpdate {
                    status: Some(GameStatus::Finished),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Conflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));

        let stored = store.find_game("g1").await.unwrap().unwrap();
        assert_eq!(stored.status, GameStatus::InProgress);
    }

    #[tokio::test]
    async fn update_of_missing_player_is_not_found() {
        let store = MemoryGameStore::new();
        store.save_game(game("g1")).await.unwrap();

        let err = store
            .update_player("g1", "nobody", PlayerUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn change_feed_carries_before_and_after() {
        let store = MemoryGameStore::new();
        store.save_game(game("g1")).await.unwrap();
        let mut feed = store.watch_games();

        store
            .update_game(
                "g1",
                None,
                GameUpdate {
                    caught_hiders: Some(vec!["u2".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let change = feed.next().await.unwrap().unwrap();
        assert_eq!(change.game_id, "g1");
        assert!(change.before.unwrap().caught_hiders.is_empty());
        assert_eq!(change.after.caught_hiders, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn players_keep_insertion_order() {
        let store = MemoryGameStore::new();
        store.save_game(game("g1")).await.unwrap();
        for id in ["p3", "p1", "p2"] {
            store
                .save_player("g1", PlayerEntity::new(id, id, id, None))
                .await
                .unwrap();
        }

        let ids: Vec<_> = store
            .list_players("g1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["p3", "p1", "p2"]);
    }
}
