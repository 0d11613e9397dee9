use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use axum_valid::Valid;

use crate::{
    dto::events::{EventAccepted, GameUpdatedEvent},
    error::AppError,
    services::{change_service, game_service},
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/events/game-updated",
    tag = "events",
    request_body = GameUpdatedEvent,
    responses(
        (status = 202, description = "Event routed to the controller", body = EventAccepted),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Game not found")
    )
)]
/// Receive a game write notification from the document store.
///
/// Controller failures are logged and do not change the response.
pub async fn game_updated(
    State(state): State<SharedState>,
    Valid(Json(event)): Valid<Json<GameUpdatedEvent>>,
) -> Result<(StatusCode, Json<EventAccepted>), AppError> {
    let after = game_service::get_game(&state, &event.game_id).await?;
    let dispatch = change_service::dispatch(&state, event.previous_status, after).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            accepted: true,
            dispatch: dispatch.into(),
        }),
    ))
}

/// Configure the webhook routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/events/game-updated", post(game_updated))
}
