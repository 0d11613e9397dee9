//! Application-level configuration loading: trigger mode, change watching and notification texts.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "READY_OR_NOT_CONFIG_PATH";
/// Environment variable selecting the storage backend.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

/// How phase deadlines are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// The server schedules the release and end deadlines itself.
    #[default]
    Timers,
    /// An external job ticks deadlines through the HTTP API.
    Events,
}

/// Title and body of one push message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageTemplate {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

impl MessageTemplate {
    fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Texts pushed at each phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationMessages {
    /// Sent when the hiding window closes.
    pub seekers_released: MessageTemplate,
    /// Sent when the game times out.
    pub hiders_win: MessageTemplate,
    /// Sent when the last hider is caught.
    pub seekers_win: MessageTemplate,
}

impl Default for NotificationMessages {
    fn default() -> Self {
        Self {
            seekers_released: MessageTemplate::new(
                "Seekers Released",
                "The seekers have been released. Don't get caught!",
            ),
            hiders_win: MessageTemplate::new("Game Finished", "The game has ended. Hiders win!"),
            seekers_win: MessageTemplate::new(
                "Game Finished",
                "All hiders have been caught. Seekers win!",
            ),
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Who owns the phase deadlines.
    pub trigger: TriggerMode,
    /// Subscribe to the store change feed and react to game updates.
    pub watch_changes: bool,
    /// Push texts per transition.
    pub messages: NotificationMessages,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerMode::Timers,
            watch_changes: true,
            messages: NotificationMessages::default(),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        trigger = ?config.trigger,
                        watch_changes = config.watch_changes,
                        "loaded application config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Couch,
    Memory,
}

impl StorageBackend {
    /// Read [`STORAGE_BACKEND_ENV`]; unknown values fall back to MongoDB with a warning.
    pub fn from_env() -> Self {
        match env::var(STORAGE_BACKEND_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "unknown storage backend; using mongo");
                StorageBackend::Mongo
            }),
            Err(_) => StorageBackend::Mongo,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(StorageBackend::Mongo),
            "couch" | "couchdb" => Some(StorageBackend::Couch),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
