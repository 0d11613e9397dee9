/// Routing of game document writes to the controller.
pub mod change_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Phase transitions of a single game.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
