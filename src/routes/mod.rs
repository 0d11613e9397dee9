use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Store webhooks.
pub mod events;
/// Start trigger, snapshots and deadline ticks.
pub mod game;
/// Health check.
pub mod health;

/// Every REST route plus the Swagger UI, bound to `state`.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(game::router())
        .merge(events::router())
        .merge(docs::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::{AppConfig, TriggerMode},
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::{GameEntity, GameSettingsEntity, GameStatus, PlayerEntity},
        },
        push::recording::RecordingNotifier,
        state::AppState,
    };

    async fn app() -> (Router, MemoryGameStore) {
        let store = MemoryGameStore::new();
        let config = AppConfig {
            trigger: TriggerMode::Events,
            ..AppConfig::default()
        };
        let state = AppState::with_rng(
            config,
            Arc::new(RecordingNotifier::new()),
            StdRng::seed_from_u64(5),
        );
        state.set_game_store(Arc::new(store.clone())).await;
        (router(state), store)
    }

    async fn seed(store: &MemoryGameStore, id: &str, mode: &str, players: usize) {
        let settings = GameSettingsEntity {
            seeker_amount: 1,
            hide_duration: 5,
            game_duration: 10,
        };
        store
            .save_game(GameEntity::new_starting(id, mode, settings))
            .await
            .unwrap();
        for i in 0..players {
            store
                .save_player(id, PlayerEntity::new(format!("p{i}"), format!("u{i}"), "P", None))
                .await
                .unwrap();
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn start_game_returns_success_and_phase() {
        let (app, store) = app().await;
        seed(&store, "g1", "classic", 3).await;

        let (status, body) = send(&app, get("/start-game/g1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["action"], "started");
        assert_eq!(body["game"]["phase"], "hiding");

        let (status, body) = send(&app, get("/games/g1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_progress");
        assert_eq!(body["hiders"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn start_game_error_statuses() {
        let (app, store) = app().await;
        seed(&store, "solo", "classic", 1).await;
        seed(&store, "odd", "infection", 3).await;

        let (status, body) = send(&app, get("/start-game/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (status, body) = send(&app, get("/start-game/odd")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "game mode infection is not supported");

        let (status, _) = send(&app, get("/start-game/solo")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn deadline_tick_before_due_is_a_no_op() {
        let (app, store) = app().await;
        seed(&store, "g1", "classic", 2).await;
        send(&app, get("/start-game/g1")).await;

        let (status, body) = send(&app, post_json("/games/g1/deadlines", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["applied"].is_null());
        assert_eq!(body["game"]["phase"], "hiding");
    }

    #[tokio::test]
    async fn webhook_starts_game() {
        let (app, store) = app().await;
        seed(&store, "g1", "classic", 2).await;

        let (status, body) = send(
            &app,
            post_json("/events/game-updated", r#"{ "gameId": "g1", "previousStatus": null }"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["dispatch"], "start");

        let game = store.find_game("g1").await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::InProgress);
    }

    #[tokio::test]
    async fn webhook_rejects_empty_game_id() {
        let (app, _) = app().await;

        let (status, _) = send(&app, post_json("/events/game-updated", r#"{ "gameId": "" }"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn healthcheck_reports_ok_with_store() {
        let (app, _) = app().await;

        let (status, body) = send(&app, get("/healthcheck")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["trigger"], "events");
    }

    #[tokio::test]
    async fn healthcheck_reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default(), Arc::new(RecordingNotifier::new()));
        let app = router(state);

        let (status, body) = send(&app, get("/healthcheck")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");

        let (status, _) = send(&app, get("/start-game/g1")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
