//! Random sources for the engine.
//!
//! The engine draws two kinds of randomness: the kind of each placed monster
//! and the tie-break between players with equally few monsters when a round
//! starts. Both go through [`RandomSource`] so tests can script them.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform index picker.
pub trait RandomSource: Send {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Seedable ChaCha8 generator used for real matches.
#[derive(Clone, Debug)]
pub struct GameRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl GameRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seeds from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for GameRng {
    fn pick(&mut self, len: usize) -> usize {
        self.inner.gen_range(0..len)
    }
}

/// Replays a fixed list of picks, then falls back to `0`.
///
/// Each scripted value is reduced modulo the requested range.
#[derive(Clone, Debug, Default)]
pub struct SequenceRng {
    picks: VecDeque<usize>,
}

impl SequenceRng {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.picks.len()
    }
}

impl RandomSource for SequenceRng {
    fn pick(&mut self, len: usize) -> usize {
        self.picks.pop_front().map_or(0, |p| p % len)
    }
}
