use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::{
        game::{DeadlineResponse, GameSnapshot, StartGameResponse},
        phase::AppliedTransition,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/start-game/{id}",
    tag = "game",
    params(("id" = String, Path, description = "Identifier of the game to start")),
    responses(
        (status = 200, description = "Game started or timers armed", body = StartGameResponse),
        (status = 400, description = "Game mode not supported"),
        (status = 404, description = "Game not found"),
        (status = 409, description = "Game cannot start")
    )
)]
/// Start a game in `starting` status, or arm the deadlines of a running one.
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<StartGameResponse>, AppError> {
    let outcome = game_service::trigger_start(&state, &id).await?;
    let scheduled = state.scheduler().is_scheduled(&id);
    Ok(Json(StartGameResponse::new(outcome, scheduled)))
}

#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Current phase of the game", body = GameSnapshot),
        (status = 404, description = "Game not found")
    )
)]
/// Current phase snapshot of a game.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameSnapshot>, AppError> {
    let game = game_service::get_game(&state, &id).await?;
    let scheduled = state.scheduler().is_scheduled(&id);
    Ok(Json(GameSnapshot::new(game, scheduled)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/deadlines",
    tag = "game",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Due deadline applied, if any", body = DeadlineResponse),
        (status = 404, description = "Game not found")
    )
)]
/// Apply the release or end deadline when it is due. Meant for an external scheduler.
pub async fn tick_deadlines(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeadlineResponse>, AppError> {
    let applied = game_service::evaluate_deadlines(&state, &id, SystemTime::now()).await?;
    let game = game_service::get_game(&state, &id).await?;
    let scheduled = state.scheduler().is_scheduled(&id);

    Ok(Json(DeadlineResponse {
        applied: applied.and_then(AppliedTransition::from_event),
        game: GameSnapshot::new(game, scheduled),
    }))
}

/// Configure the game routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/start-game/{id}", get(start_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/deadlines", post(tick_deadlines))
}
