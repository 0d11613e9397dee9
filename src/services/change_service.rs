//! Reaction to game document writes, from the store change feed or the webhook.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        game_store::GameChange,
        models::{CLASSIC_GAME_MODE, GameEntity, GameStatus},
    },
    services::game_service,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// What a change was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The game entered `starting`: roles get assigned.
    Start,
    /// A running game was written: check for capture.
    CaptureCheck,
    /// The game mode has no controller.
    UnsupportedMode,
    /// Nothing to do for this write.
    Ignored,
}

/// Decide what a write on a game should trigger.
pub fn classify(before: Option<GameStatus>, after: &GameEntity) -> Dispatch {
    let routed = match after.status {
        GameStatus::Starting if before != Some(GameStatus::Starting) => Dispatch::Start,
        GameStatus::InProgress => Dispatch::CaptureCheck,
        _ => return Dispatch::Ignored,
    };

    if after.game_mode == CLASSIC_GAME_MODE {
        routed
    } else {
        Dispatch::UnsupportedMode
    }
}

/// Handle one change feed event.
pub async fn handle_game_change(state: &SharedState, change: GameChange) -> Dispatch {
    let before = change.before.as_ref().map(|game| game.status);
    dispatch(state, before, change.after).await
}

/// Route a game write to the controller. Errors are logged, never returned.
pub async fn dispatch(
    state: &SharedState,
    before: Option<GameStatus>,
    after: GameEntity,
) -> Dispatch {
    let decision = classify(before, &after);
    let game_id = after.id.clone();

    match decision {
        Dispatch::Start => {
            if let Err(err) = game_service::start_game(state, &game_id).await {
                error!(%game_id, error = %err, "failed to start game");
            }
        }
        Dispatch::CaptureCheck => {
            if let Err(err) = game_service::on_capture_update(state, &after).await {
                warn!(%game_id, error = %err, "failed to evaluate capture");
            }
        }
        Dispatch::UnsupportedMode => {
            error!(%game_id, game_mode = %after.game_mode, "unsupported game mode");
        }
        Dispatch::Ignored => {
            debug!(%game_id, status = after.status.as_str(), "game change ignored");
        }
    }

    decision
}

/// Follow the change feed of whichever store is installed, resubscribing after failures.
pub async fn run_watcher(state: SharedState) {
    let mut degraded = state.degraded_watcher();
    let mut delay = INITIAL_DELAY;

    loop {
        let Some(store) = state.game_store().await else {
            // Wait for the supervisor to install a store.
            if degraded.changed().await.is_err() {
                return;
            }
            continue;
        };

        info!("subscribing to game change feed");
        let mut changes = store.watch_games();
        while let Some(next) = changes.next().await {
            match next {
                Ok(change) => {
                    delay = INITIAL_DELAY;
                    let state = state.clone();
                    // Each change runs on its own task so a slow start does not stall the feed.
                    tokio::spawn(async move {
                        handle_game_change(&state, change).await;
                    });
                }
                Err(err) => {
                    warn!(error = %err, "game change feed failed");
                    break;
                }
            }
        }

        warn!(delay_ms = delay.as_millis() as u64, "game change feed closed; resubscribing");
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
