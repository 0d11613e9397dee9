use std::{collections::HashSet, sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    config::{MessageTemplate, TriggerMode},
    dao::{
        game_store::{GameStore, GameUpdate, PlayerUpdate},
        models::{
            CLASSIC_GAME_MODE, GameEntity, GameStatus, PlayerEntity, PlayerRole, PlayerStatus,
            Winner,
        },
    },
    error::ServiceError,
    push::{Notification, send_and_log},
    state::{
        Deadline, SharedState,
        game::{all_hiders_caught, compute_phase_timestamps, minutes, remaining_until},
        state_machine::{GamePhase, PhaseEvent, Plan, plan},
    },
};

/// Result of the start trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Roles were assigned and the hiding window opened.
    Started(GameEntity),
    /// The game was already running; its deadlines are now scheduled in this process.
    TimersArmed(GameEntity),
    /// The game was already running and nothing had to be done.
    AlreadyRunning(GameEntity),
}

impl StartOutcome {
    /// Game record behind the outcome.
    pub fn game(&self) -> &GameEntity {
        match self {
            StartOutcome::Started(game)
            | StartOutcome::TimersArmed(game)
            | StartOutcome::AlreadyRunning(game) => game,
        }
    }
}

/// Entry point of `GET /start-game/{id}`: start a `starting` game or pick up a running one.
pub async fn trigger_start(state: &SharedState, game_id: &str) -> Result<StartOutcome, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(store.as_ref(), game_id).await?;
    ensure_supported_mode(&game)?;

    match game.status {
        GameStatus::Starting => begin_game(state, store.as_ref(), game)
            .await
            .map(StartOutcome::Started),
        GameStatus::InProgress => arm_timers(state, game),
        GameStatus::Finished => Err(ServiceError::InvalidState(format!(
            "game `{game_id}` is already finished"
        ))),
    }
}

/// Assign roles, stamp the phase deadlines and move the game to `in_progress`.
///
/// The game is reloaded so the version check runs against the stored record. Nothing is
/// written when the game cannot start (wrong status, bad settings, roster too small).
pub async fn start_game(state: &SharedState, game_id: &str) -> Result<GameEntity, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(store.as_ref(), game_id).await?;
    begin_game(state, store.as_ref(), game).await
}

/// Player roles are written only once the versioned game update went through, so a
/// start that loses the version race leaves the roster untouched.
async fn begin_game(
    state: &SharedState,
    store: &dyn GameStore,
    game: GameEntity,
) -> Result<GameEntity, ServiceError> {
    ensure_supported_mode(&game)?;
    let plan = plan(&game, PhaseEvent::Start)?;

    game.settings
        .validate()
        .map_err(|err| ServiceError::InvalidSettings(err.to_string()))?;
    let now = SystemTime::now();
    let stamps = compute_phase_timestamps(
        now,
        game.settings.hide_duration,
        game.settings.game_duration,
    )?;

    let roster = store.list_players(&game.id).await?;
    if roster.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "no players found for game `{}`",
            game.id
        )));
    }

    let assignment = state.draw_roles(roster, game.settings.seeker_amount as usize)?;

    let update = GameUpdate {
        status: Some(GameStatus::InProgress),
        seekers: Some(uids(&assignment.seekers)),
        hiders: Some(uids(&assignment.hiders)),
        caught_hiders: Some(Vec::new()),
        start_time: Some(stamps.start),
        hide_end_time: Some(stamps.hide_end),
        game_end_time: Some(stamps.game_end),
        ..GameUpdate::default()
    };
    let updated = apply_plan(store, &plan, update).await?;

    let roles = assignment
        .seekers
        .iter()
        .map(|seeker| (seeker, PlayerRole::Seeker, PlayerStatus::AwaitingStart))
        .chain(
            assignment
                .hiders
                .iter()
                .map(|hider| (hider, PlayerRole::Hider, PlayerStatus::Active)),
        );
    for (player, role, status) in roles {
        let update = PlayerUpdate {
            role: Some(role),
            status: Some(status),
            caught_hiders: None,
        };
        if let Err(err) = store.update_player(&updated.id, &player.id, update).await {
            warn!(game_id = %updated.id, player_id = %player.id, error = %err, "failed to record player role");
        }
    }

    info!(
        game_id = %updated.id,
        plan_id = %plan.id,
        seekers = updated.seekers.len(),
        hiders = updated.hiders.len(),
        hide_minutes = updated.settings.hide_duration,
        game_minutes = updated.settings.game_duration,
        "game started"
    );

    if state.config().trigger == TriggerMode::Timers {
        let hide = minutes(updated.settings.hide_duration);
        let total = hide + minutes(updated.settings.game_duration);
        schedule_release(state, &updated.id, hide);
        schedule_finish(state, &updated.id, total);
    }

    Ok(updated)
}

/// Schedule the remaining deadlines of a running game that has none in this process.
pub fn arm_timers(state: &SharedState, game: GameEntity) -> Result<StartOutcome, ServiceError> {
    if game.status != GameStatus::InProgress {
        return Err(ServiceError::InvalidState(format!(
            "game `{}` is not in progress",
            game.id
        )));
    }
    if state.config().trigger != TriggerMode::Timers || state.scheduler().is_scheduled(&game.id) {
        return Ok(StartOutcome::AlreadyRunning(game));
    }

    let (hide_end, game_end) = deadlines_of(&game)?;
    let now = SystemTime::now();

    if game.seekers_released_at.is_none() {
        schedule_release(state, &game.id, remaining_until(hide_end, now));
    }
    schedule_finish(state, &game.id, remaining_until(game_end, now));

    info!(game_id = %game.id, "timers armed for running game");
    Ok(StartOutcome::TimersArmed(game))
}

/// End the hiding window: stamp the release, activate seekers and notify the roster.
///
/// Returns `None` when the game is not in the hiding phase.
pub async fn release_seekers(
    state: &SharedState,
    game_id: &str,
) -> Result<Option<GameEntity>, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(store.as_ref(), game_id).await?;
    let Some(plan) = plan_or_skip(&game, PhaseEvent::ReleaseSeekers) else {
        return Ok(None);
    };

    let update = GameUpdate {
        seekers_released_at: Some(SystemTime::now()),
        ..GameUpdate::default()
    };
    let updated = apply_plan(store.as_ref(), &plan, update).await?;
    info!(game_id, plan_id = %plan.id, "seekers released");

    let roster = store.list_players(game_id).await?;
    let seekers: HashSet<&str> = updated.seekers.iter().map(String::as_str).collect();
    for player in roster.iter().filter(|p| seekers.contains(p.uid.as_str())) {
        let update = PlayerUpdate {
            status: Some(PlayerStatus::Active),
            caught_hiders: Some(Vec::new()),
            role: None,
        };
        if let Err(err) = store.update_player(game_id, &player.id, update).await {
            warn!(game_id, player_id = %player.id, error = %err, "failed to activate seeker");
        }
    }

    notify(state, game_id, &state.config().messages.seekers_released, &roster).await;
    Ok(Some(updated))
}

/// Finish a running game whose duration elapsed; hiders win.
pub async fn finish_by_timeout(
    state: &SharedState,
    game_id: &str,
) -> Result<Option<GameEntity>, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(store.as_ref(), game_id).await?;
    let Some(plan) = plan_or_skip(&game, PhaseEvent::TimeExpired) else {
        return Ok(None);
    };

    let updated = apply_plan(store.as_ref(), &plan, finish_update(Winner::Hider)).await?;
    info!(game_id, plan_id = %plan.id, "game finished by timeout");

    let roster = store.list_players(game_id).await?;
    notify(state, game_id, &state.config().messages.hiders_win, &roster).await;

    state.scheduler().cancel(game_id);
    Ok(Some(updated))
}

/// React to a write on a running game: finish it once every hider is caught.
pub async fn on_capture_update(
    state: &SharedState,
    game: &GameEntity,
) -> Result<Option<GameEntity>, ServiceError> {
    if !all_hiders_caught(game) {
        return Ok(None);
    }
    let Some(plan) = plan_or_skip(game, PhaseEvent::AllHidersCaught) else {
        return Ok(None);
    };

    let store = state.require_game_store().await?;
    let updated = apply_plan(store.as_ref(), &plan, finish_update(Winner::Seeker)).await?;
    state.scheduler().cancel(&game.id);
    info!(game_id = %game.id, plan_id = %plan.id, "all hiders caught; seekers win");

    let roster = store.list_players(&game.id).await?;
    notify(state, &game.id, &state.config().messages.seekers_win, &roster).await;
    Ok(Some(updated))
}

/// Apply whichever deadline of the game is due at `now`.
///
/// Returns the event that was applied, if any.
pub async fn evaluate_deadlines(
    state: &SharedState,
    game_id: &str,
    now: SystemTime,
) -> Result<Option<PhaseEvent>, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(store.as_ref(), game_id).await?;
    if game.status != GameStatus::InProgress {
        return Ok(None);
    }

    let (hide_end, game_end) = deadlines_of(&game)?;
    if now >= game_end {
        let applied = finish_by_timeout(state, game_id).await?;
        return Ok(applied.map(|_| PhaseEvent::TimeExpired));
    }
    if now >= hide_end && game.seekers_released_at.is_none() {
        let applied = release_seekers(state, game_id).await?;
        return Ok(applied.map(|_| PhaseEvent::ReleaseSeekers));
    }

    Ok(None)
}

/// Current record of a game.
pub async fn get_game(state: &SharedState, game_id: &str) -> Result<GameEntity, ServiceError> {
    let store = state.require_game_store().await?;
    load_game(store.as_ref(), game_id).await
}

pub(crate) fn ensure_supported_mode(game: &GameEntity) -> Result<(), ServiceError> {
    if game.game_mode == CLASSIC_GAME_MODE {
        Ok(())
    } else {
        Err(ServiceError::UnsupportedGameMode(game.game_mode.clone()))
    }
}

async fn load_game(store: &dyn GameStore, game_id: &str) -> Result<GameEntity, ServiceError> {
    store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game with ID {game_id} not found")))
}

fn plan_or_skip(game: &GameEntity, event: PhaseEvent) -> Option<Plan> {
    match plan(game, event) {
        Ok(plan) => Some(plan),
        Err(invalid) => {
            debug!(game_id = %game.id, error = %invalid, "transition skipped");
            None
        }
    }
}

async fn apply_plan(
    store: &dyn GameStore,
    plan: &Plan,
    update: GameUpdate,
) -> Result<GameEntity, ServiceError> {
    let updated = store
        .update_game(&plan.game_id, Some(plan.expected_version), update)
        .await?;
    debug!(
        game_id = %plan.game_id,
        plan_id = %plan.id,
        from = ?plan.from,
        to = ?GamePhase::of(&updated),
        elapsed_ms = plan.pending_since.elapsed().as_millis() as u64,
        "transition applied"
    );
    Ok(updated)
}

fn finish_update(winner: Winner) -> GameUpdate {
    GameUpdate {
        status: Some(GameStatus::Finished),
        winner: Some(winner),
        finished_at: Some(SystemTime::now()),
        ..GameUpdate::default()
    }
}

fn deadlines_of(game: &GameEntity) -> Result<(SystemTime, SystemTime), ServiceError> {
    if let (Some(hide_end), Some(game_end)) = (game.hide_end_time, game.game_end_time) {
        return Ok((hide_end, game_end));
    }

    let start = game.start_time.ok_or_else(|| {
        ServiceError::InvalidState(format!("game `{}` has no start time", game.id))
    })?;
    let stamps = compute_phase_timestamps(
        start,
        game.settings.hide_duration,
        game.settings.game_duration,
    )?;
    Ok((stamps.hide_end, stamps.game_end))
}

fn schedule_release(state: &SharedState, game_id: &str, delay: std::time::Duration) {
    let task_state = Arc::clone(state);
    let id = game_id.to_owned();
    state
        .scheduler()
        .schedule(game_id, Deadline::Release, delay, async move {
            if let Err(err) = release_seekers(&task_state, &id).await {
                warn!(game_id = %id, error = %err, "failed to release seekers");
            }
            task_state.scheduler().forget(&id, Deadline::Release);
        });
}

fn schedule_finish(state: &SharedState, game_id: &str, delay: std::time::Duration) {
    let task_state = Arc::clone(state);
    let id = game_id.to_owned();
    state
        .scheduler()
        .schedule(game_id, Deadline::Finish, delay, async move {
            if let Err(err) = finish_by_timeout(&task_state, &id).await {
                warn!(game_id = %id, error = %err, "failed to finish game");
            }
            task_state.scheduler().forget(&id, Deadline::Finish);
        });
}

async fn notify(
    state: &SharedState,
    game_id: &str,
    message: &MessageTemplate,
    roster: &[PlayerEntity],
) {
    let notification = Notification::to_players(&message.title, &message.body, roster);
    send_and_log(state.notifier(), game_id, notification).await;
}

fn uids(players: &[PlayerEntity]) -> Vec<String> {
    players.iter().map(|player| player.uid.clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};
    use tokio::time::sleep;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{game_store::memory::MemoryGameStore, models::GameSettingsEntity},
        push::recording::RecordingNotifier,
        state::AppState,
    };

    struct Harness {
        state: SharedState,
        store: MemoryGameStore,
        notifier: RecordingNotifier,
    }

    async fn harness(config: AppConfig) -> Harness {
        harness_with(config, RecordingNotifier::new()).await
    }

    async fn harness_with(config: AppConfig, notifier: RecordingNotifier) -> Harness {
        let store = MemoryGameStore::new();
        let state = AppState::with_rng(
            config,
            Arc::new(notifier.clone()),
            StdRng::seed_from_u64(11),
        );
        state.set_game_store(Arc::new(store.clone())).await;
        Harness {
            state,
            store,
            notifier,
        }
    }

    fn settings(seekers: u32) -> GameSettingsEntity {
        GameSettingsEntity {
            seeker_amount: seekers,
            hide_duration: 5,
            game_duration: 10,
        }
    }

    async fn seed_game(store: &MemoryGameStore, id: &str, players: usize, seekers: u32) -> GameEntity {
        let game = GameEntity::new_starting(id, CLASSIC_GAME_MODE, settings(seekers));
        store.save_game(game.clone()).await.unwrap();
        for i in 0..players {
            let player = PlayerEntity::new(
                format!("p{i}"),
                format!("uid-{i}"),
                format!("Player {i}"),
                Some(format!("token-{i}")),
            );
            store.save_player(id, player).await.unwrap();
        }
        game
    }

    async fn reload(store: &MemoryGameStore, id: &str) -> GameEntity {
        store.find_game(id).await.unwrap().unwrap()
    }

    async fn assert_roles_match(store: &MemoryGameStore, game: &GameEntity) {
        for player in store.list_players(&game.id).await.unwrap() {
            let expected = if game.seekers.contains(&player.uid) {
                PlayerRole::Seeker
            } else {
                assert!(game.hiders.contains(&player.uid), "{} has no side", player.uid);
                PlayerRole::Hider
            };
            assert_eq!(player.role, Some(expected), "role of {}", player.uid);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_scenario_ends_with_hiders_winning() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 3, 1).await;
        for id in ["p0", "p1", "p2"] {
            let leftover = PlayerUpdate {
                caught_hiders: Some(vec!["uid-from-last-round".into()]),
                ..PlayerUpdate::default()
            };
            h.store.update_player("g1", id, leftover).await.unwrap();
        }

        let outcome = trigger_start(&h.state, "g1").await.unwrap();
        let started = match outcome {
            StartOutcome::Started(game) => game,
            other => panic!("expected a fresh start, got {other:?}"),
        };
        assert_eq!(started.status, GameStatus::InProgress);
        assert_eq!(started.seekers.len(), 1);
        assert_eq!(started.hiders.len(), 2);
        assert_eq!(
            started.hide_end_time.unwrap(),
            started.start_time.unwrap() + Duration::from_secs(300)
        );
        assert_eq!(
            started.game_end_time.unwrap(),
            started.start_time.unwrap() + Duration::from_secs(900)
        );

        let seeker_uid = started.seekers[0].clone();
        for player in h.store.list_players("g1").await.unwrap() {
            if player.uid == seeker_uid {
                assert_eq!(player.role, Some(PlayerRole::Seeker));
                assert_eq!(player.status, Some(PlayerStatus::AwaitingStart));
            } else {
                assert_eq!(player.role, Some(PlayerRole::Hider));
                assert_eq!(player.status, Some(PlayerStatus::Active));
            }
        }
        assert!(h.notifier.sent().is_empty());

        sleep(minutes(5) + Duration::from_secs(1)).await;
        let game = reload(&h.store, "g1").await;
        assert!(game.seekers_released_at.is_some());
        assert_eq!(game.status, GameStatus::InProgress);
        let seeker = h
            .store
            .list_players("g1")
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.uid == seeker_uid)
            .unwrap();
        assert_eq!(seeker.status, Some(PlayerStatus::Active));
        assert!(seeker.caught_hiders.is_empty());
        assert_eq!(h.notifier.titles(), vec!["Seekers Released"]);
        assert_eq!(h.notifier.sent()[0].tokens.len(), 3);

        sleep(minutes(10)).await;
        let game = reload(&h.store, "g1").await;
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(game.winner, Some(Winner::Hider));
        assert!(game.finished_at.is_some());
        assert_eq!(h.notifier.titles(), vec!["Seekers Released", "Game Finished"]);
        assert_eq!(h.notifier.sent()[1].body, "The game has ended. Hiders win!");
        assert!(!h.state.scheduler().is_scheduled("g1"));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_before_deadline_cancels_timeout() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 3, 1).await;
        let started = trigger_start(&h.state, "g1").await.unwrap().game().clone();

        sleep(minutes(7)).await;
        let caught = h
            .store
            .update_game(
                "g1",
                None,
                GameUpdate {
                    caught_hiders: Some(started.hiders.clone()),
                    ..GameUpdate::default()
                },
            )
            .await
            .unwrap();

        let finished = on_capture_update(&h.state, &caught).await.unwrap().unwrap();
        assert_eq!(finished.status, GameStatus::Finished);
        assert_eq!(finished.winner, Some(Winner::Seeker));
        assert!(!h.state.scheduler().is_scheduled("g1"));

        sleep(minutes(10)).await;
        let game = reload(&h.store, "g1").await;
        assert_eq!(game.winner, Some(Winner::Seeker));
        assert_eq!(game.version, finished.version);
        assert_eq!(h.notifier.titles(), vec!["Seekers Released", "Game Finished"]);
        assert_eq!(
            h.notifier.sent()[1].body,
            "All hiders have been caught. Seekers win!"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn partial_capture_is_a_no_op() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 4, 1).await;
        let started = trigger_start(&h.state, "g1").await.unwrap().game().clone();

        let partial = h
            .store
            .update_game(
                "g1",
                None,
                GameUpdate {
                    caught_hiders: Some(vec![started.hiders[0].clone()]),
                    ..GameUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(on_capture_update(&h.state, &partial).await.unwrap().is_none());
        assert_eq!(reload(&h.store, "g1").await.status, GameStatus::InProgress);
        assert!(h.state.scheduler().is_scheduled("g1"));
    }

    #[tokio::test]
    async fn finished_game_ignores_deadlines() {
        let h = harness(AppConfig::default()).await;
        let mut game = GameEntity::new_starting("g1", CLASSIC_GAME_MODE, settings(1));
        game.status = GameStatus::Finished;
        game.winner = Some(Winner::Seeker);
        game.hiders = vec!["uid-1".into()];
        game.caught_hiders = vec!["uid-1".into()];
        h.store.save_game(game.clone()).await.unwrap();

        assert!(release_seekers(&h.state, "g1").await.unwrap().is_none());
        assert!(finish_by_timeout(&h.state, "g1").await.unwrap().is_none());
        assert!(on_capture_update(&h.state, &game).await.unwrap().is_none());

        assert_eq!(reload(&h.store, "g1").await, game);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn single_player_cannot_start() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 1, 1).await;

        let err = trigger_start(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientPlayers { got: 1 }));

        let game = reload(&h.store, "g1").await;
        assert_eq!(game.status, GameStatus::Starting);
        assert_eq!(game.version, 0);
        let player = h.store.find_player("g1", "p0").await.unwrap().unwrap();
        assert_eq!(player.role, None);
        assert!(!h.state.scheduler().is_scheduled("g1"));
    }

    #[tokio::test]
    async fn seeker_amount_covering_roster_is_rejected() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 3, 3).await;

        let err = trigger_start(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSettings(_)));
        assert_eq!(reload(&h.store, "g1").await.status, GameStatus::Starting);
    }

    #[tokio::test]
    async fn zero_durations_are_rejected() {
        let h = harness(AppConfig::default()).await;
        let mut game = GameEntity::new_starting("g1", CLASSIC_GAME_MODE, settings(1));
        game.settings.hide_duration = 0;
        h.store.save_game(game).await.unwrap();

        let err = trigger_start(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn unknown_game_mode_and_missing_game() {
        let h = harness(AppConfig::default()).await;
        h.store
            .save_game(GameEntity::new_starting("g1", "infection", settings(1)))
            .await
            .unwrap();

        let err = trigger_start(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedGameMode(mode) if mode == "infection"));

        let err = trigger_start(&h.state, "missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_roster_is_not_found() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 0, 1).await;

        let err = trigger_start(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn starting_twice_from_the_change_path_is_rejected() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 4, 1).await;

        let started = start_game(&h.state, "g1").await.unwrap();
        let err = start_game(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        assert_eq!(reload(&h.store, "g1").await, started);
        assert_roles_match(&h.store, &started).await;
    }

    #[tokio::test]
    async fn start_losing_the_version_race_leaves_roles_untouched() {
        let h = harness(AppConfig {
            trigger: TriggerMode::Events,
            ..AppConfig::default()
        })
        .await;
        let stale = seed_game(&h.store, "g1", 4, 1).await;

        let started = start_game(&h.state, "g1").await.unwrap();
        for _ in 0..3 {
            let err = begin_game(&h.state, &h.store, stale.clone()).await.unwrap_err();
            assert!(matches!(err, ServiceError::Conflict(_)));
        }

        assert_eq!(reload(&h.store, "g1").await, started);
        assert_roles_match(&h.store, &started).await;
    }

    #[tokio::test]
    async fn failed_deliveries_do_not_undo_transitions() {
        let config = AppConfig {
            trigger: TriggerMode::Events,
            ..AppConfig::default()
        };
        let h = harness_with(config, RecordingNotifier::failing()).await;
        seed_game(&h.store, "g1", 3, 1).await;
        trigger_start(&h.state, "g1").await.unwrap();

        let released = release_seekers(&h.state, "g1").await.unwrap();
        assert!(released.is_some());

        let finished = finish_by_timeout(&h.state, "g1").await.unwrap().unwrap();
        assert_eq!(finished.status, GameStatus::Finished);
        assert_eq!(reload(&h.store, "g1").await.winner, Some(Winner::Hider));
        assert_eq!(h.notifier.titles(), vec!["Seekers Released", "Game Finished"]);
    }

    #[tokio::test]
    async fn start_trigger_on_finished_game_is_rejected() {
        let h = harness(AppConfig::default()).await;
        let mut game = GameEntity::new_starting("g1", CLASSIC_GAME_MODE, settings(1));
        game.status = GameStatus::Finished;
        h.store.save_game(game).await.unwrap();

        let err = trigger_start(&h.state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn running_game_gets_timers_armed_once() {
        let h = harness(AppConfig::default()).await;
        seed_game(&h.store, "g1", 3, 1).await;
        let now = SystemTime::now();
        h.store
            .update_game(
                "g1",
                None,
                GameUpdate {
                    status: Some(GameStatus::InProgress),
                    seekers: Some(vec!["uid-0".into()]),
                    hiders: Some(vec!["uid-1".into(), "uid-2".into()]),
                    start_time: Some(now),
                    hide_end_time: Some(now + Duration::from_secs(60)),
                    game_end_time: Some(now + Duration::from_secs(120)),
                    ..GameUpdate::default()
                },
            )
            .await
            .unwrap();

        let outcome = trigger_start(&h.state, "g1").await.unwrap();
        assert!(matches!(outcome, StartOutcome::TimersArmed(_)));
        assert!(h.state.scheduler().is_scheduled("g1"));

        let outcome = trigger_start(&h.state, "g1").await.unwrap();
        assert!(matches!(outcome, StartOutcome::AlreadyRunning(_)));

        sleep(Duration::from_secs(61)).await;
        assert!(reload(&h.store, "g1").await.seekers_released_at.is_some());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(reload(&h.store, "g1").await.winner, Some(Winner::Hider));
    }

    #[tokio::test]
    async fn event_mode_advances_through_deadline_ticks() {
        let config = AppConfig {
            trigger: TriggerMode::Events,
            ..AppConfig::default()
        };
        let h = harness(config).await;
        seed_game(&h.store, "g1", 3, 1).await;

        let started = trigger_start(&h.state, "g1").await.unwrap().game().clone();
        assert!(!h.state.scheduler().is_scheduled("g1"));

        let start = started.start_time.unwrap();
        let early = evaluate_deadlines(&h.state, "g1", start + minutes(1))
            .await
            .unwrap();
        assert_eq!(early, None);

        let release = evaluate_deadlines(&h.state, "g1", start + minutes(5))
            .await
            .unwrap();
        assert_eq!(release, Some(PhaseEvent::ReleaseSeekers));

        let again = evaluate_deadlines(&h.state, "g1", start + minutes(6))
            .await
            .unwrap();
        assert_eq!(again, None);

        let finish = evaluate_deadlines(&h.state, "g1", start + minutes(15))
            .await
            .unwrap();
        assert_eq!(finish, Some(PhaseEvent::TimeExpired));
        assert_eq!(h.notifier.titles(), vec!["Seekers Released", "Game Finished"]);

        let after = evaluate_deadlines(&h.state, "g1", start + minutes(30))
            .await
            .unwrap();
        assert_eq!(after, None);
    }

    #[tokio::test]
    async fn stale_capture_snapshot_loses_the_race() {
        let h = harness(AppConfig {
            trigger: TriggerMode::Events,
            ..AppConfig::default()
        })
        .await;
        seed_game(&h.store, "g1", 2, 1).await;
        let started = trigger_start(&h.state, "g1").await.unwrap().game().clone();

        let mut stale = started.clone();
        stale.caught_hiders = started.hiders.clone();
        finish_by_timeout(&h.state, "g1").await.unwrap().unwrap();

        let err = on_capture_update(&h.state, &stale).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(reload(&h.store, "g1").await.winner, Some(Winner::Hider));
    }

    #[tokio::test]
    async fn degraded_state_reports_degraded() {
        let state = AppState::new(AppConfig::default(), Arc::new(RecordingNotifier::new()));
        let err = trigger_start(&state, "g1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
