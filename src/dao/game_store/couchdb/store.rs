use std::sync::Arc;

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tracing::debug;

use crate::dao::{
    game_store::{GameChange, GameStore, GameUpdate, PlayerUpdate, ensure_version},
    models::{GameEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchGameDocument, CouchPlayerDocument, END_SUFFIX,
        GAME_PREFIX, game_doc_id, player_doc_id, players_prefix,
    },
};

const ALL_DOCS: &str = "_all_docs";
const CHANGES: &str = "_changes";
const LONGPOLL_TIMEOUT_MS: &str = "60000";

/// [`GameStore`] backed by a single CouchDB database.
///
/// Games live under `game::{id}` and players under `player::{game}:{player}`.
#[derive(Clone)]
pub struct CouchGameStore {
    http: Client,
    db_url: Arc<str>,
    credentials: Option<Arc<(String, String)>>,
}

impl CouchGameStore {
    /// Build the client and create the database when it does not exist yet.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::Client { source })?;

        let store = Self {
            http,
            db_url: config.database_url().into(),
            credentials: config.credentials.map(Arc::new),
        };
        store.create_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.is_empty() {
            self.db_url.to_string()
        } else {
            format!("{}/{}", self.db_url, path)
        };
        let builder = self.http.request(method, url);
        match self.credentials.as_deref() {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder, path: &str) -> CouchResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                path: path.to_string(),
                source,
            })
    }

    async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> CouchResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::Body {
                path: path.to_string(),
                source,
            })
    }

    fn unexpected(path: &str, status: StatusCode) -> CouchDaoError {
        CouchDaoError::Status {
            path: path.to_string(),
            status,
        }
    }

    /// `PUT /{db}` answers 412 when the database already exists.
    async fn create_database(&self) -> CouchResult<()> {
        let response = Self::send(self.request(Method::PUT, ""), &self.db_url).await?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED => Ok(()),
            status if status.is_success() => {
                debug!(db = %self.db_url, "created CouchDB database");
                Ok(())
            }
            status => Err(Self::unexpected(&self.db_url, status)),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, doc_id: &str) -> CouchResult<Option<T>> {
        let response = Self::send(self.request(Method::GET, doc_id), doc_id).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::decode(response, doc_id).await.map(Some),
            status => Err(Self::unexpected(doc_id, status)),
        }
    }

    async fn store<T: Serialize>(&self, doc_id: &str, document: &T) -> CouchResult<()> {
        let response = Self::send(self.request(Method::PUT, doc_id).json(document), doc_id).await?;
        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            status => Err(Self::unexpected(doc_id, status)),
        }
    }

    async fn by_prefix<T: DeserializeOwned>(&self, prefix: &str) -> CouchResult<Vec<T>> {
        let range = [
            ("include_docs", "true".to_string()),
            ("startkey", Value::from(prefix).to_string()),
            ("endkey", Value::from(format!("{prefix}{END_SUFFIX}")).to_string()),
        ];
        let response = Self::send(self.request(Method::GET, ALL_DOCS).query(&range), ALL_DOCS).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(ALL_DOCS, response.status()));
        }

        let page: AllDocsResponse = Self::decode(response, ALL_DOCS).await?;
        page.rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::Document {
                    path: prefix.to_string(),
                    source,
                })
            })
            .collect()
    }

    /// One long-poll round on `_changes`; returns the game writes and the next `since` token.
    async fn poll_changes(&self, since: &str) -> CouchResult<(Vec<GameChange>, String)> {
        let params = [
            ("feed", "longpoll"),
            ("include_docs", "true"),
            ("timeout", LONGPOLL_TIMEOUT_MS),
            ("since", since),
        ];
        let response = Self::send(self.request(Method::GET, CHANGES).query(&params), CHANGES).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(CHANGES, response.status()));
        }

        let page: ChangesResponse = Self::decode(response, CHANGES).await?;
        let next = match page.last_seq {
            Value::String(seq) => seq,
            other => other.to_string(),
        };

        let mut changes = Vec::new();
        for row in page.results {
            if row.deleted || !row.id.starts_with(GAME_PREFIX) {
                continue;
            }
            let Some(doc) = row.doc else { continue };
            let document: CouchGameDocument =
                from_value(doc).map_err(|source| CouchDaoError::Document {
                    path: row.id.clone(),
                    source,
                })?;
            let after = GameEntity::from(document);
            // `_changes` only carries the latest revision.
            changes.push(GameChange {
                game_id: after.id.clone(),
                before: None,
                after,
            });
        }

        Ok((changes, next))
    }

    async fn update_game_doc(
        &self,
        id: &str,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> StorageResult<GameEntity> {
        let doc_id = game_doc_id(id);
        let current = self
            .fetch::<CouchGameDocument>(&doc_id)
            .await?
            .ok_or_else(|| StorageError::game_not_found(id))?;
        let rev = current.rev.clone();
        let mut game = GameEntity::from(current);
        ensure_version(&game, expected_version)?;
        let read_version = game.version;
        update.apply_to(&mut game);

        match self
            .store(&doc_id, &CouchGameDocument::from((game.clone(), rev)))
            .await
        {
            Ok(()) => Ok(game),
            Err(CouchDaoError::Conflict { path }) => Err(StorageError::Conflict {
                path,
                expected: expected_version.unwrap_or(read_version),
                actual: read_version + 1,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_player_doc(
        &self,
        game_id: String,
        player_id: &str,
        update: PlayerUpdate,
    ) -> StorageResult<()> {
        let doc_id = player_doc_id(&game_id, player_id);
        let current = self
            .fetch::<CouchPlayerDocument>(&doc_id)
            .await?
            .ok_or_else(|| StorageError::player_not_found(&game_id, player_id))?;
        let rev = current.rev.clone();
        let mut player = PlayerEntity::from(current);
        update.apply_to(&mut player);

        let doc = CouchPlayerDocument::from((game_id, player, rev));
        Ok(self.store(&doc_id, &doc).await?)
    }
}

impl GameStore for CouchGameStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let couch = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(&game.id);
            let rev = couch
                .fetch::<CouchGameDocument>(&doc_id)
                .await?
                .and_then(|doc| doc.rev);
            Ok(couch
                .store(&doc_id, &CouchGameDocument::from((game, rev)))
                .await?)
        })
    }

    fn save_player(
        &self,
        game_id: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let couch = self.clone();
        let game_id = game_id.to_owned();
        Box::pin(async move {
            let doc_id = player_doc_id(&game_id, &player.id);
            let rev = couch
                .fetch::<CouchPlayerDocument>(&doc_id)
                .await?
                .and_then(|doc| doc.rev);
            let doc = CouchPlayerDocument::from((game_id, player, rev));
            Ok(couch.store(&doc_id, &doc).await?)
        })
    }

    fn find_game(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let couch = self.clone();
        let doc_id = game_doc_id(id);
        Box::pin(async move {
            let doc = couch.fetch::<CouchGameDocument>(&doc_id).await?;
            Ok(doc.map(GameEntity::from))
        })
    }

    fn find_player(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let couch = self.clone();
        let doc_id = player_doc_id(game_id, player_id);
        Box::pin(async move {
            let doc = couch.fetch::<CouchPlayerDocument>(&doc_id).await?;
            Ok(doc.map(PlayerEntity::from))
        })
    }

    fn list_players(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let couch = self.clone();
        let prefix = players_prefix(game_id);
        Box::pin(async move {
            let docs = couch.by_prefix::<CouchPlayerDocument>(&prefix).await?;
            Ok(docs.into_iter().map(PlayerEntity::from).collect())
        })
    }

    fn update_game(
        &self,
        id: &str,
        expected_version: Option<u64>,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let couch = self.clone();
        let id = id.to_owned();
        Box::pin(async move { couch.update_game_doc(&id, expected_version, update).await })
    }

    fn update_player(
        &self,
        game_id: &str,
        player_id: &str,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let couch = self.clone();
        let (game_id, player_id) = (game_id.to_owned(), player_id.to_owned());
        Box::pin(async move { couch.update_player_doc(game_id, &player_id, update).await })
    }

    fn watch_games(&self) -> BoxStream<'static, StorageResult<GameChange>> {
        let couch = self.clone();
        async_stream::stream! {
            let mut since = String::from("now");
            loop {
                match couch.poll_changes(&since).await {
                    Ok((changes, next)) => {
                        since = next;
                        for change in changes {
                            yield Ok(change);
                        }
                    }
                    Err(err) => {
                        yield Err(StorageError::from(err));
                        break;
                    }
                }
            }
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let couch = self.clone();
        Box::pin(async move {
            let response = Self::send(couch.request(Method::HEAD, ""), &couch.db_url).await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::unexpected(&couch.db_url, response.status()).into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let couch = self.clone();
        Box::pin(async move { Ok(couch.create_database().await?) })
    }
}
