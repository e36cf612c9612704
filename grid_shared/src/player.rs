//! Seat identifiers.
//!
//! Seats are numbered from 1 like the lobby screen shows them. Per-seat
//! tables inside the engine are plain `Vec`s indexed through
//! [`PlayerId::index`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest seat count a match supports.
pub const MAX_PLAYERS: u8 = 4;

/// 1-based seat number, stable for the life of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl PlayerId {
    pub const fn new(seat: u8) -> Self {
        PlayerId(seat)
    }

    /// 0-based index into per-seat tables.
    pub const fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    pub const fn seat(self) -> u8 {
        self.0
    }

    /// Whether this seat exists in a match of `player_count` seats.
    pub fn is_valid_for(self, player_count: u8) -> bool {
        self.0 >= 1 && self.0 <= player_count
    }

    /// All seats of a match, in seat order.
    pub fn all(player_count: u8) -> impl Iterator<Item = PlayerId> {
        (1..=player_count).map(PlayerId)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player{}", self.0)
    }
}
