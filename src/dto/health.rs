use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Deadline triggering mode ("timers" or "events").
    pub trigger: String,
}

impl HealthResponse {
    pub fn new(degraded: bool, trigger: &str) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            trigger: trigger.to_string(),
        }
    }
}
