use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{GamePhase, PhaseEvent};

/// Game phase exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleGamePhase {
    /// Waiting for the start trigger.
    Setup,
    /// Hiders are hiding, seekers wait.
    Hiding,
    /// Seekers are released.
    Seeking,
    /// The game is over.
    Finished,
}

impl From<GamePhase> for VisibleGamePhase {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Setup => VisibleGamePhase::Setup,
            GamePhase::Hiding => VisibleGamePhase::Hiding,
            GamePhase::Seeking => VisibleGamePhase::Seeking,
            GamePhase::Finished(_) => VisibleGamePhase::Finished,
        }
    }
}

/// Transition applied by a deadline tick.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppliedTransition {
    SeekersReleased,
    TimeExpired,
}

impl AppliedTransition {
    /// Map the controller event; only deadline events have a wire form.
    pub fn from_event(event: PhaseEvent) -> Option<Self> {
        match event {
            PhaseEvent::ReleaseSeekers => Some(AppliedTransition::SeekersReleased),
            PhaseEvent::TimeExpired => Some(AppliedTransition::TimeExpired),
            PhaseEvent::Start | PhaseEvent::AllHidersCaught => None,
        }
    }
}
