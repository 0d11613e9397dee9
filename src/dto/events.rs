use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dao::models::GameStatus, services::change_service::Dispatch};

/// Webhook payload sent by the document store when a game document is written.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdatedEvent {
    /// Identifier of the written game.
    #[validate(length(min = 1, max = 128))]
    pub game_id: String,
    /// Status before the write; absent when the document was created.
    #[serde(default)]
    pub previous_status: Option<GameStatus>,
}

/// Acknowledgement of a webhook event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventAccepted {
    pub accepted: bool,
    pub dispatch: DispatchKind,
}

/// Wire form of the routing decision.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    Start,
    CaptureCheck,
    UnsupportedMode,
    Ignored,
}

impl From<Dispatch> for DispatchKind {
    fn from(value: Dispatch) -> Self {
        match value {
            Dispatch::Start => DispatchKind::Start,
            Dispatch::CaptureCheck => DispatchKind::CaptureCheck,
            Dispatch::UnsupportedMode => DispatchKind::UnsupportedMode,
            Dispatch::Ignored => DispatchKind::Ignored,
        }
    }
}
