//! Pure game rules: phase deadlines and capture completion.

use std::{
    collections::HashSet,
    time::{Duration, SystemTime},
};

use thiserror::Error;

use crate::dao::models::GameEntity;

const SECONDS_PER_MINUTE: u64 = 60;

/// Deadlines of a started game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimestamps {
    /// Moment roles were assigned.
    pub start: SystemTime,
    /// End of the hiding window.
    pub hide_end: SystemTime,
    /// End of the seeking window.
    pub game_end: SystemTime,
}

/// Rejected phase durations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("hide duration must be at least one minute")]
    ZeroHideDuration,
    #[error("game duration must be at least one minute")]
    ZeroGameDuration,
    #[error("phase deadline overflows the clock")]
    Overflow,
}

/// Compute the hiding and seeking deadlines from the start instant and the durations in minutes.
pub fn compute_phase_timestamps(
    start: SystemTime,
    hide_minutes: u32,
    game_minutes: u32,
) -> Result<PhaseTimestamps, TimingError> {
    if hide_minutes == 0 {
        return Err(TimingError::ZeroHideDuration);
    }
    if game_minutes == 0 {
        return Err(TimingError::ZeroGameDuration);
    }

    let hide_end = start
        .checked_add(minutes(hide_minutes))
        .ok_or(TimingError::Overflow)?;
    let game_end = hide_end
        .checked_add(minutes(game_minutes))
        .ok_or(TimingError::Overflow)?;

    Ok(PhaseTimestamps {
        start,
        hide_end,
        game_end,
    })
}

/// Duration of `count` whole minutes.
pub fn minutes(count: u32) -> Duration {
    Duration::from_secs(u64::from(count) * SECONDS_PER_MINUTE)
}

/// Whether every hider has been caught.
///
/// Compared as sets: duplicates in `caught_hiders` do not count twice and a game without
/// hiders is never considered captured.
pub fn all_hiders_caught(game: &GameEntity) -> bool {
    if game.hiders.is_empty() {
        return false;
    }

    let hiders: HashSet<&str> = game.hiders.iter().map(String::as_str).collect();
    let caught: HashSet<&str> = game.caught_hiders.iter().map(String::as_str).collect();
    hiders == caught
}

/// Time left until `deadline`, zero once it has passed.
pub fn remaining_until(deadline: SystemTime, now: SystemTime) -> Duration {
    deadline.duration_since(now).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::dao::models::GameSettingsEntity;

    fn game_with(hiders: &[&str], caught: &[&str]) -> GameEntity {
        let mut game = GameEntity::new_starting(
            "g1",
            "classic",
            GameSettingsEntity {
                seeker_amount: 1,
                hide_duration: 5,
                game_duration: 10,
            },
        );
        game.hiders = hiders.iter().map(|s| s.to_string()).collect();
        game.caught_hiders = caught.iter().map(|s| s.to_string()).collect();
        game
    }

    #[test]
    fn deadlines_follow_start_time() {
        let start = UNIX_EPOCH + Duration::from_secs(1_000);
        let stamps = compute_phase_timestamps(start, 5, 10).unwrap();

        assert_eq!(stamps.start, start);
        assert_eq!(stamps.hide_end, start + Duration::from_secs(300));
        assert_eq!(stamps.game_end, start + Duration::from_secs(900));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let start = SystemTime::now();
        assert_eq!(
            compute_phase_timestamps(start, 0, 10),
            Err(TimingError::ZeroHideDuration)
        );
        assert_eq!(
            compute_phase_timestamps(start, 5, 0),
            Err(TimingError::ZeroGameDuration)
        );
    }

    #[test]
    fn capture_requires_the_exact_hider_set() {
        assert!(all_hiders_caught(&game_with(&["a", "b"], &["b", "a"])));
        assert!(!all_hiders_caught(&game_with(&["a", "b"], &["a"])));
        assert!(!all_hiders_caught(&game_with(&["a", "b"], &[])));
        assert!(all_hiders_caught(&game_with(&["a"], &["a", "a"])));
    }

    #[test]
    fn capture_of_a_stranger_does_not_finish() {
        assert!(!all_hiders_caught(&game_with(&["a", "b"], &["a", "z"])));
        assert!(!all_hiders_caught(&game_with(&[], &[])));
    }

    #[test]
    fn remaining_time_saturates_at_zero() {
        let now = UNIX_EPOCH + Duration::from_secs(100);
        assert_eq!(
            remaining_until(now + Duration::from_secs(30), now),
            Duration::from_secs(30)
        );
        assert_eq!(remaining_until(UNIX_EPOCH, now), Duration::ZERO);
    }
}
