//! Random partition of a roster into seekers and hiders.

use rand::{Rng, seq::SliceRandom};
use thiserror::Error;

/// Minimum roster size for a game to start.
pub const MIN_PLAYERS: usize = 2;

/// Outcome of a role draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment<T> {
    /// Players that seek.
    pub seekers: Vec<T>,
    /// Everyone else.
    pub hiders: Vec<T>,
}

/// Reasons a roster cannot be partitioned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    /// Fewer than [`MIN_PLAYERS`] players.
    #[error("not enough players to start (got {got}, need at least {MIN_PLAYERS})")]
    InsufficientPlayers { got: usize },
    #[error("seeker amount must be at least one")]
    /// Zero seekers requested.
    NoSeekers,
    #[error("{seekers} seekers leave no hider among {players} players")]
    /// Nobody would be left to hide.
    TooManySeekers { seekers: usize, players: usize },
}

/// Shuffle `roster` and split it: the first `seeker_count` become seekers, the rest hiders.
pub fn assign_roles<T, R>(
    mut roster: Vec<T>,
    seeker_count: usize,
    rng: &mut R,
) -> Result<RoleAssignment<T>, RoleError>
where
    R: Rng + ?Sized,
{
    let players = roster.len();
    if players < MIN_PLAYERS {
        return Err(RoleError::InsufficientPlayers { got: players });
    }
    if seeker_count == 0 {
        return Err(RoleError::NoSeekers);
    }
    if seeker_count >= players {
        return Err(RoleError::TooManySeekers {
            seekers: seeker_count,
            players,
        });
    }

    roster.shuffle(rng);
    let hiders = roster.split_off(seeker_count);

    Ok(RoleAssignment {
        seekers: roster,
        hiders,
    })
}
