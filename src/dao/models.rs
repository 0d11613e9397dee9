use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use validator::Validate;

/// Game mode identifier understood by the phase controller.
pub const CLASSIC_GAME_MODE: &str = "classic";

/// Lifecycle status persisted on the game document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Lobby is closed and the game waits for roles to be assigned.
    Starting,
    /// Roles are assigned; hiding or seeking is under way.
    InProgress,
    /// Terminal state, a winner has been decided.
    Finished,
}

/// Side that won a finished game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    /// Every hider was caught before the deadline.
    Seeker,
    /// At least one hider survived until the game end time.
    Hider,
}

/// Role handed out to a player when the game starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    Seeker,
    Hider,
}

/// Per-player status written by the controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Seeker waiting for the hiding window to end.
    AwaitingStart,
    /// Player is free to move (hiders immediately, seekers once released).
    Active,
}

/// Settings chosen in the lobby.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GameSettingsEntity {
    /// Number of players drawn as seekers.
    #[validate(range(min = 1))]
    pub seeker_amount: u32,
    /// Length of the hiding window in minutes.
    #[validate(range(min = 1))]
    pub hide_duration: u32,
    /// Length of the seeking window in minutes.
    #[validate(range(min = 1))]
    pub game_duration: u32,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: String,
    /// Game mode; only [`CLASSIC_GAME_MODE`] is handled.
    pub game_mode: String,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Lobby settings.
    pub settings: GameSettingsEntity,
    /// Uids of the seekers, filled on start.
    pub seekers: Vec<String>,
    /// Uids of the hiders, filled on start.
    pub hiders: Vec<String>,
    /// Uids of the hiders caught so far (written by clients).
    pub caught_hiders: Vec<String>,
    /// Winning side once finished.
    pub winner: Option<Winner>,
    /// Moment roles were assigned.
    pub start_time: Option<SystemTime>,
    /// End of the hiding window.
    pub hide_end_time: Option<SystemTime>,
    /// End of the seeking window.
    pub game_end_time: Option<SystemTime>,
    /// Moment the seekers were released.
    pub seekers_released_at: Option<SystemTime>,
    /// Moment the game finished.
    pub finished_at: Option<SystemTime>,
    /// Optimistic concurrency counter bumped on every controller update.
    pub version: u64,
}

impl GameEntity {
    /// Fresh lobby game waiting in `starting` status.
    pub fn new_starting(
        id: impl Into<String>,
        game_mode: impl Into<String>,
        settings: GameSettingsEntity,
    ) -> Self {
        Self {
            id: id.into(),
            game_mode: game_mode.into(),
            status: GameStatus::Starting,
            settings,
            seekers: Vec::new(),
            hiders: Vec::new(),
            caught_hiders: Vec::new(),
            winner: None,
            start_time: None,
            hide_end_time: None,
            game_end_time: None,
            seekers_released_at: None,
            finished_at: None,
            version: 0,
        }
    }
}

/// Player document stored under a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Document identifier inside the game's player collection.
    pub id: String,
    /// Authenticated user id, used in the game's seeker/hider lists.
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Push delivery token, absent when the device never registered.
    pub fcm_token: Option<String>,
    /// Assigned role.
    pub role: Option<PlayerRole>,
    /// Assigned status.
    pub status: Option<PlayerStatus>,
    /// Hiders caught by this seeker.
    #[serde(default)]
    pub caught_hiders: Vec<String>,
}

impl PlayerEntity {
    /// Player as it appears in a lobby, without role or status.
    pub fn new(
        id: impl Into<String>,
        uid: impl Into<String>,
        name: impl Into<String>,
        fcm_token: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            uid: uid.into(),
            name: name.into(),
            fcm_token,
            role: None,
            status: None,
            caught_hiders: Vec::new(),
        }
    }
}

impl GameStatus {
    /// Wire representation shared by every backend.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Starting => "starting",
            GameStatus::InProgress => "in_progress",
            GameStatus::Finished => "finished",
        }
    }
}

impl Winner {
    /// Wire representation shared by every backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Winner::Seeker => "seeker",
            Winner::Hider => "hider",
        }
    }
}

impl PlayerRole {
    /// Wire representation shared by every backend.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerRole::Seeker => "seeker",
            PlayerRole::Hider => "hider",
        }
    }
}

impl PlayerStatus {
    /// Wire representation shared by every backend.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::AwaitingStart => "awaiting_start",
            PlayerStatus::Active => "active",
        }
    }
}
