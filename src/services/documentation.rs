use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Ready or Not Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::start_game,
        crate::routes::game::get_game,
        crate::routes::game::tick_deadlines,
        crate::routes::events::game_updated,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::GameSnapshot,
            crate::dto::game::StartGameResponse,
            crate::dto::game::StartAction,
            crate::dto::game::DeadlineResponse,
            crate::dto::phase::VisibleGamePhase,
            crate::dto::phase::AppliedTransition,
            crate::dto::events::GameUpdatedEvent,
            crate::dto::events::EventAccepted,
            crate::dto::events::DispatchKind,
            crate::dao::models::GameStatus,
            crate::dao::models::Winner,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game start trigger and phase deadlines"),
        (name = "events", description = "Document store webhooks"),
    )
)]
/// OpenAPI document of the REST API.
pub struct ApiDoc;
