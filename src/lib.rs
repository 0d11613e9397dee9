//! Library crate for ready-or-not-back, exposing modules for binaries and integration tests.

pub mod config;
/// Entities and storage backends.
pub mod dao;
mod dto;
mod error;
pub mod push;
/// HTTP routes.
pub mod routes;
/// Business services behind the routes.
pub mod services;
/// Shared application state and phase logic.
pub mod state;
