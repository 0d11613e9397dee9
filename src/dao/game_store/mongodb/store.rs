use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, future::BoxFuture, stream::BoxStream};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    options::{FullDocumentBeforeChangeType, FullDocumentType, IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGameDocument, MongoPlayerDocument, doc_id, game_set_document, player_key,
        player_set_document, versioned_game_filter,
    },
};
use crate::dao::{
    game_store::{GameChange, GameStore, GameUpdate, PlayerUpdate},
    models::{GameEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

const GAME_COLLECTION_NAME: &str = "games";
const PLAYER_COLLECTION_NAME: &str = "players";

/// [`GameStore`] over the `games` and `players` collections.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let players = self.player_collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"gameId": 1, "playerId": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_game_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        players
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "gameId,playerId",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn player_collection(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id.clone();
        let document: MongoGameDocument = game.into();
        self.collection()
            .await
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;
        Ok(())
    }

    async fn save_player(&self, game_id: String, player: PlayerEntity) -> MongoResult<()> {
        let player_id = player.id.clone();
        let document: MongoPlayerDocument = (game_id.clone(), player).into();
        self.player_collection()
            .await
            .replace_one(player_key(&game_id, &player_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                game_id,
                player_id,
                source,
            })?;
        Ok(())
    }

    async fn find_game(&self, id: String) -> MongoResult<Option<GameEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_player(
        &self,
        game_id: String,
        player_id: String,
    ) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .player_collection()
            .await
            .find_one(player_key(&game_id, &player_id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayers { game_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_players(&self, game_id: String) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .player_collection()
            .await
            .find(doc! {"gameId": game_id.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadPlayers {
                game_id: game_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadPlayers { game_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn update_game(
        &self,
        id: String,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> StorageResult<GameEntity> {
        let filter = versioned_game_filter(&id, expected_version);
        let mut changes = doc! { "$inc": { "version": 1_i64 } };
        let set = game_set_document(&update);
        if !set.is_empty() {
            changes.insert("$set", set);
        }

        let collection = self.collection().await;
        let updated = collection
            .find_one_and_update(filter, changes)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame {
                id: id.clone(),
                source,
            })?;

        if let Some(document) = updated {
            return Ok(document.into());
        }

        // No match: either the game is gone or another writer moved the version.
        match self.find_game(id.clone()).await? {
            Some(current) => Err(StorageError::Conflict {
                path: format!("{GAME_COLLECTION_NAME}/{id}"),
                expected: expected_version.unwrap_or_default(),
                actual: current.version,
            }),
            None => Err(StorageError::game_not_found(&id)),
        }
    }

    async fn update_player(
        &self,
        game_id: String,
        player_id: String,
        update: PlayerUpdate,
    ) -> StorageResult<()> {
        let set = player_set_document(&update);
        if set.is_empty() {
            return Ok(());
        }

        let result = self
            .player_collection()
            .await
            .update_one(player_key(&game_id, &player_id), doc! { "$set": set })
            .await
            .map_err(|source| MongoDaoError::UpdatePlayer {
                game_id: game_id.clone(),
                player_id: player_id.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(StorageError::player_not_found(&game_id, &player_id));
        }
        Ok(())
    }

    fn watch(&self) -> BoxStream<'static, StorageResult<GameChange>> {
        let store = self.clone();
        let stream = async_stream::stream! {
            let collection = store.collection().await;
            // Pre-images are only returned when enabled on the collection.
            let change_stream = collection
                .watch()
                .full_document(FullDocumentType::UpdateLookup)
                .full_document_before_change(FullDocumentBeforeChangeType::WhenAvailable)
                .await;
            let mut change_stream = match change_stream {
                Ok(change_stream) => Box::pin(change_stream),
                Err(source) => {
                    yield Err(MongoDaoError::ChangeStream { collection: GAME_COLLECTION_NAME, source }.into());
                    return;
                }
            };

            loop {
                match change_stream.next().await {
                    Some(Ok(event)) => {
                        let Some(after) = event.full_document else {
                            continue;
                        };
                        let after: GameEntity = after.into();
                        yield Ok(GameChange {
                            game_id: after.id.clone(),
                            before: event.full_document_before_change.map(Into::into),
                            after,
                        });
                    }
                    Some(Err(source)) => {
                        yield Err(MongoDaoError::ChangeStream { collection: GAME_COLLECTION_NAME, source }.into());
                        return;
                    }
                    None => return,
                }
            }
        };
        stream.boxed()
    }
}

impl GameStore for MongoGameStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn save_player(
        &self,
        game_id: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        Box::pin(async move { store.save_player(game_id, player).await.map_err(Into::into) })
    }

    fn find_game(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_player(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        let (game_id, player_id) = (game_id.to_owned(), player_id.to_owned());
        Box::pin(async move {
            store
                .find_player(game_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_players(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        Box::pin(async move { store.list_players(game_id).await.map_err(Into::into) })
    }

    fn update_game(
        &self,
        id: &str,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { store.update_game(id, expected_version, update).await })
    }

    fn update_player(
        &self,
        game_id: &str,
        player_id: &str,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let (game_id, player_id) = (game_id.to_owned(), player_id.to_owned());
        Box::pin(async move { store.update_player(game_id, player_id, update).await })
    }

    fn watch_games(&self) -> BoxStream<'static, StorageResult<GameChange>> {
        self.watch()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
