use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{GameEntity, GameStatus, Winner},
    dto::{
        format_system_time,
        phase::{AppliedTransition, VisibleGamePhase},
    },
    services::game_service::StartOutcome,
    state::state_machine::GamePhase,
};

/// Current state of a game as seen by the controller.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub id: String,
    pub game_mode: String,
    pub status: GameStatus,
    pub phase: VisibleGamePhase,
    pub winner: Option<Winner>,
    pub seekers: Vec<String>,
    pub hiders: Vec<String>,
    pub caught_hiders: Vec<String>,
    /// RFC 3339 timestamps.
    pub start_time: Option<String>,
    pub hide_end_time: Option<String>,
    pub game_end_time: Option<String>,
    pub seekers_released_at: Option<String>,
    pub finished_at: Option<String>,
    pub version: u64,
    /// Whether this process holds pending deadline timers for the game.
    pub timers_scheduled: bool,
}

impl GameSnapshot {
    pub fn new(game: GameEntity, timers_scheduled: bool) -> Self {
        let phase = GamePhase::of(&game).into();
        Self {
            phase,
            id: game.id,
            game_mode: game.game_mode,
            status: game.status,
            winner: game.winner,
            seekers: game.seekers,
            hiders: game.hiders,
            caught_hiders: game.caught_hiders,
            start_time: game.start_time.map(format_system_time),
            hide_end_time: game.hide_end_time.map(format_system_time),
            game_end_time: game.game_end_time.map(format_system_time),
            seekers_released_at: game.seekers_released_at.map(format_system_time),
            finished_at: game.finished_at.map(format_system_time),
            version: game.version,
            timers_scheduled,
        }
    }
}

/// What the start trigger did.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartAction {
    Started,
    TimersArmed,
    AlreadyRunning,
}

/// Response of `GET /start-game/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartGameResponse {
    pub success: bool,
    pub action: StartAction,
    pub game: GameSnapshot,
}

impl StartGameResponse {
    pub fn new(outcome: StartOutcome, timers_scheduled: bool) -> Self {
        let (action, game) = match outcome {
            StartOutcome::Started(game) => (StartAction::Started, game),
            StartOutcome::TimersArmed(game) => (StartAction::TimersArmed, game),
            StartOutcome::AlreadyRunning(game) => (StartAction::AlreadyRunning, game),
        };
        Self {
            success: true,
            action,
            game: GameSnapshot::new(game, timers_scheduled),
        }
    }
}

/// Response of `POST /games/{id}/deadlines`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeadlineResponse {
    /// Transition applied by this tick, if any.
    pub applied: Option<AppliedTransition>,
    pub game: GameSnapshot,
}
