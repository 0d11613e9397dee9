use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{GameEntity, GameStatus, Winner};

/// Phases a single game goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// The game has been created and waits for its start trigger.
    Setup,
    /// Roles are assigned; hiders hide while seekers wait.
    Hiding,
    /// Seekers have been released.
    Seeking,
    /// The game is over and carries its winner.
    Finished(Winner),
}

impl GamePhase {
    /// Derive the phase from the persisted record.
    pub fn of(game: &GameEntity) -> Self {
        match game.status {
            GameStatus::Starting => GamePhase::Setup,
            GameStatus::InProgress if game.seekers_released_at.is_some() => GamePhase::Seeking,
            GameStatus::InProgress => GamePhase::Hiding,
            // Records written by older deployments may lack a winner.
            GameStatus::Finished => GamePhase::Finished(game.winner.unwrap_or(Winner::Hider)),
        }
    }

    /// Whether the phase accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GamePhase::Finished(_))
    }
}

/// Events that move a game between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Roles were assigned and the hiding window opened.
    Start,
    /// The hiding window elapsed.
    ReleaseSeekers,
    /// Every hider has been caught.
    AllHidersCaught,
    /// The game duration elapsed.
    TimeExpired,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the game was in when the event was received.
    pub from: GamePhase,
    /// The rejected event.
    pub event: PhaseEvent,
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that still has to be written to the store.
///
/// The write must be conditioned on `expected_version` so a concurrent trigger that
/// already moved the game makes this plan fail instead of overwriting it.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Identifier used to correlate log lines of one transition.
    pub id: PlanId,
    /// Game the plan applies to.
    pub game_id: String,
    /// Phase at planning time.
    pub from: GamePhase,
    /// Phase after the transition.
    pub to: GamePhase,
    /// Event that triggered the plan.
    pub event: PhaseEvent,
    /// Record version observed at planning time.
    pub expected_version: u64,
    /// When the plan was created.
    pub pending_since: Instant,
}

/// Compute the phase reached by applying `event` in `from`.
pub fn transition(from: GamePhase, event: PhaseEvent) -> Result<GamePhase, InvalidTransition> {
    let next = match (from, event) {
        (GamePhase::Setup, PhaseEvent::Start) => GamePhase::Hiding,
        (GamePhase::Hiding, PhaseEvent::ReleaseSeekers) => GamePhase::Seeking,
        (GamePhase::Hiding | GamePhase::Seeking, PhaseEvent::AllHidersCaught) => {
            GamePhase::Finished(Winner::Seeker)
        }
        (GamePhase::Hiding | GamePhase::Seeking, PhaseEvent::TimeExpired) => {
            GamePhase::Finished(Winner::Hider)
        }
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

/// Plan `event` against the current state of `game`.
pub fn plan(game: &GameEntity, event: PhaseEvent) -> Result<Plan, InvalidTransition> {
    let from = GamePhase::of(game);
    let to = transition(from, event)?;

    Ok(Plan {
        id: Uuid::new_v4(),
        game_id: game.id.clone(),
        from,
        to,
        event,
        expected_version: game.version,
        pending_since: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::GameSettingsEntity;

    fn game() -> GameEntity {
        GameEntity::new_starting(
            "g1",
            "classic",
            GameSettingsEntity {
                seeker_amount: 1,
                hide_duration: 5,
                game_duration: 10,
            },
        )
    }

    fn apply(phase: GamePhase, event: PhaseEvent) -> GamePhase {
        transition(phase, event).unwrap()
    }

    #[test]
    fn new_game_is_in_setup() {
        assert_eq!(GamePhase::of(&game()), GamePhase::Setup);
    }

    #[test]
    fn happy_path_ends_with_hiders_winning() {
        let phase = apply(GamePhase::Setup, PhaseEvent::Start);
        assert_eq!(phase, GamePhase::Hiding);
        let phase = apply(phase, PhaseEvent::ReleaseSeekers);
        assert_eq!(phase, GamePhase::Seeking);
        assert_eq!(
            apply(phase, PhaseEvent::TimeExpired),
            GamePhase::Finished(Winner::Hider)
        );
    }

    #[test]
    fn capture_finishes_from_hiding_and_seeking() {
        assert_eq!(
            apply(GamePhase::Hiding, PhaseEvent::AllHidersCaught),
            GamePhase::Finished(Winner::Seeker)
        );
        assert_eq!(
            apply(GamePhase::Seeking, PhaseEvent::AllHidersCaught),
            GamePhase::Finished(Winner::Seeker)
        );
    }

    #[test]
    fn finished_rejects_every_event() {
        for winner in [Winner::Seeker, Winner::Hider] {
            for event in [
                PhaseEvent::Start,
                PhaseEvent::ReleaseSeekers,
                PhaseEvent::AllHidersCaught,
                PhaseEvent::TimeExpired,
            ] {
                let err = transition(GamePhase::Finished(winner), event).unwrap_err();
                assert_eq!(err.from, GamePhase::Finished(winner));
                assert_eq!(err.event, event);
            }
        }
    }

    #[test]
    fn setup_only_accepts_start() {
        let err = transition(GamePhase::Setup, PhaseEvent::TimeExpired).unwrap_err();
        assert_eq!(err.from, GamePhase::Setup);
        assert!(transition(GamePhase::Seeking, PhaseEvent::ReleaseSeekers).is_err());
        assert!(transition(GamePhase::Hiding, PhaseEvent::Start).is_err());
    }

    #[test]
    fn phase_is_derived_from_release_timestamp() {
        let mut game = game();
        game.status = GameStatus::InProgress;
        assert_eq!(GamePhase::of(&game), GamePhase::Hiding);

        game.seekers_released_at = Some(SystemTime::now());
        assert_eq!(GamePhase::of(&game), GamePhase::Seeking);

        game.status = GameStatus::Finished;
        game.winner = Some(Winner::Seeker);
        assert_eq!(GamePhase::of(&game), GamePhase::Finished(Winner::Seeker));
    }

    #[test]
    fn plan_captures_expected_version() {
        let mut game = game();
        game.version = 4;

        let plan = plan(&game, PhaseEvent::Start).unwrap();
        assert_eq!(plan.game_id, "g1");
        assert_eq!(plan.from, GamePhase::Setup);
        assert_eq!(plan.to, GamePhase::Hiding);
        assert_eq!(plan.expected_version, 4);
    }
}
