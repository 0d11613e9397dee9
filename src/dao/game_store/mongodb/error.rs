use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB adapter, one variant per operation.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save game `{id}`")]
    SaveGame {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load game `{id}`")]
    LoadGame {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update game `{id}`")]
    UpdateGame {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save player `{player_id}` of game `{game_id}`")]
    SavePlayer {
        game_id: String,
        player_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load players of game `{game_id}`")]
    LoadPlayers {
        game_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update player `{player_id}` of game `{game_id}`")]
    UpdatePlayer {
        game_id: String,
        player_id: String,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB change stream on `{collection}` failed")]
    ChangeStream {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
