//! Fire-once deadline tasks owned per game.

use std::{future::Future, time::Duration};

use dashmap::DashMap;
use tokio::{task::AbortHandle, time::sleep};
use tracing::debug;

/// Deadline kinds a game can have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// End of the hiding window.
    Release,
    /// End of the game.
    Finish,
}

#[derive(Debug, Default)]
struct GameTimers {
    release: Option<AbortHandle>,
    finish: Option<AbortHandle>,
}

impl GameTimers {
    fn slot(&mut self, deadline: Deadline) -> &mut Option<AbortHandle> {
        match deadline {
            Deadline::Release => &mut self.release,
            Deadline::Finish => &mut self.finish,
        }
    }

    fn handles(&self) -> impl Iterator<Item = &AbortHandle> {
        self.release.iter().chain(self.finish.iter())
    }

    fn is_pending(&self) -> bool {
        self.handles().any(|handle| !handle.is_finished())
    }
}

/// Registry of the deadline tasks spawned for each game.
#[derive(Debug, Default)]
pub struct PhaseScheduler {
    timers: DashMap<String, GameTimers>,
}

impl PhaseScheduler {
    /// Scheduler with no pending deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once after `delay`, replacing any pending task of the same kind.
    pub fn schedule<F>(&self, game_id: &str, deadline: Deadline, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            task.await;
        })
        .abort_handle();

        let mut timers = self.timers.entry(game_id.to_owned()).or_default();
        if let Some(previous) = timers.slot(deadline).replace(handle) {
            previous.abort();
        }
        debug!(game_id, ?deadline, delay_secs = delay.as_secs(), "deadline scheduled");
    }

    /// Whether the game still has a deadline waiting to fire.
    pub fn is_scheduled(&self, game_id: &str) -> bool {
        self.timers
            .get(game_id)
            .is_some_and(|timers| timers.is_pending())
    }

    /// Drop the handle of a deadline that already fired.
    pub fn forget(&self, game_id: &str, deadline: Deadline) {
        let now_empty = match self.timers.get_mut(game_id) {
            Some(mut timers) => {
                timers.slot(deadline).take();
                !timers.is_pending()
            }
            None => false,
        };
        if now_empty {
            self.timers.remove_if(game_id, |_, timers| !timers.is_pending());
        }
    }

    /// Abort every pending deadline of the game.
    pub fn cancel(&self, game_id: &str) {
        if let Some((_, timers)) = self.timers.remove(game_id) {
            for handle in timers.handles() {
                handle.abort();
            }
            debug!(game_id, "deadlines cancelled");
        }
    }
}
