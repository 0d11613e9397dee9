/// Phase timing and capture checks.
pub mod game;
/// Role draw.
pub mod roles;
/// Per-game deadline tasks.
pub mod scheduler;
/// Phase transitions.
pub mod state_machine;

use std::sync::{Arc, Mutex, PoisonError};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    push::Notifier,
    state::roles::{RoleAssignment, RoleError, assign_roles},
};

pub use self::scheduler::{Deadline, PhaseScheduler};

/// Handle passed to routes, services and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state holding the store handle, the notifier and pending deadlines.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    notifier: Arc<dyn Notifier>,
    scheduler: PhaseScheduler,
    config: AppConfig,
    degraded: watch::Sender<bool>,
    role_rng: Mutex<StdRng>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, notifier: Arc<dyn Notifier>) -> SharedState {
        Self::with_rng(config, notifier, StdRng::from_os_rng())
    }

    /// Same as [`AppState::new`] with an explicit random source for role draws.
    pub fn with_rng(config: AppConfig, notifier: Arc<dyn Notifier>, rng: StdRng) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            notifier,
            scheduler: PhaseScheduler::new(),
            config,
            degraded: degraded_tx,
            role_rng: Mutex::new(rng),
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store or [`ServiceError::Degraded`].
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        if self.game_store.read().await.is_none() {
            return true;
        }
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Push delivery.
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Deadline tasks of every game.
    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Draw roles with the shared random source.
    pub fn draw_roles<T>(
        &self,
        roster: Vec<T>,
        seeker_count: usize,
    ) -> Result<RoleAssignment<T>, RoleError> {
        let mut rng = self.role_rng.lock().unwrap_or_else(PoisonError::into_inner);
        assign_roles(roster, seeker_count, &mut *rng)
    }
}
