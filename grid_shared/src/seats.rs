//! Seat assignment.
//!
//! # Seat Lifecycle
//! 1. A connection joins and takes the lowest free seat.
//! 2. Once every seat is taken, further joins are refused.
//! 3. On disconnect the seat is released immediately.
//! 4. The next connection takes over the released seat, including its
//!    position in a running match.

use std::collections::BTreeMap;

use crate::player::PlayerId;

/// Seat operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatError {
    /// Every seat is occupied.
    Full,
    /// This connection already holds a seat.
    AlreadySeated,
    /// This connection holds no seat.
    NotSeated,
}

impl std::fmt::Display for SeatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeatError::Full => f.write_str("game is full"),
            SeatError::AlreadySeated => f.write_str("already seated"),
            SeatError::NotSeated => f.write_str("not seated"),
        }
    }
}

impl std::error::Error for SeatError {}

/// Maps connection keys to seats.
#[derive(Debug, Clone)]
pub struct SeatTable<K> {
    capacity: u8,
    seats: BTreeMap<PlayerId, K>,
}

impl<K: Copy + Eq> SeatTable<K> {
    pub fn new(capacity: u8) -> Self {
        Self {
            capacity,
            seats: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    pub fn occupied(&self) -> usize {
        self.seats.len()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.capacity as usize
    }

    /// Seats `key` in the lowest free seat.
    pub fn join(&mut self, key: K) -> Result<PlayerId, SeatError> {
        if self.seat_of(key).is_some() {
            return Err(SeatError::AlreadySeated);
        }
        let seat = PlayerId::all(self.capacity)
            .find(|s| !self.seats.contains_key(s))
            .ok_or(SeatError::Full)?;
        self.seats.insert(seat, key);
        Ok(seat)
    }

    /// Frees the seat held by `key`.
    pub fn leave(&mut self, key: K) -> Result<PlayerId, SeatError> {
        let seat = self.seat_of(key).ok_or(SeatError::NotSeated)?;
        self.seats.remove(&seat);
        Ok(seat)
    }

    pub fn seat_of(&self, key: K) -> Option<PlayerId> {
        self.seats
            .iter()
            .find_map(|(seat, k)| (*k == key).then_some(*seat))
    }

    pub fn holder(&self, seat: PlayerId) -> Option<K> {
        self.seats.get(&seat).copied()
    }

    /// Occupied seats in seat order.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, K)> + '_ {
        self.seats.iter().map(|(s, k)| (*s, *k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seats_fill_in_connection_order() {
        let mut table = SeatTable::new(4);
        assert_eq!(table.join(10u32), Ok(PlayerId::new(1)));
        assert_eq!(table.join(11), Ok(PlayerId::new(2)));
        assert_eq!(table.join(12), Ok(PlayerId::new(3)));
        assert_eq!(table.join(13), Ok(PlayerId::new(4)));
        assert!(table.is_full());
    }

    #[test]
    fn fifth_connection_is_refused() {
        let mut table = SeatTable::new(4);
        for key in 0u32..4 {
            table.join(key).unwrap();
        }
        assert_eq!(table.join(99), Err(SeatError::Full));
        assert_eq!(SeatError::Full.to_string(), "game is full");
    }

    #[test]
    fn released_seat_is_reused_first() {
        let mut table = SeatTable::new(4);
        for key in 0u32..3 {
            table.join(key).unwrap();
        }
        assert_eq!(table.leave(1), Ok(PlayerId::new(2)));
        assert_eq!(table.holder(PlayerId::new(2)), None);
        assert_eq!(table.join(7), Ok(PlayerId::new(2)));
        assert_eq!(table.seat_of(7), Some(PlayerId::new(2)));
    }

    #[test]
    fn double_join_and_unknown_leave_fail() {
        let mut table = SeatTable::new(2);
        table.join(1u32).unwrap();
        assert_eq!(table.join(1), Err(SeatError::AlreadySeated));
        assert_eq!(table.leave(5), Err(SeatError::NotSeated));
        assert_eq!(table.occupied(), 1);
    }
}
