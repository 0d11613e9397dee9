use tracing::warn;

use crate::{config::TriggerMode, dto::health::HealthResponse, state::SharedState};

/// Probe the store and report whether the service runs degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_game_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let trigger = match state.config().trigger {
        TriggerMode::Timers => "timers",
        TriggerMode::Events => "events",
    };
    HealthResponse::new(state.is_degraded().await, trigger)
}
