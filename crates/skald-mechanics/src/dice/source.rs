//! Where die faces come from.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of single die results.
pub trait DieSource: Send {
    /// Produce one result in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Uniform dice from a seeded `StdRng`; the same seed replays a session.
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    /// Create a source from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a source seeded by the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl DieSource for SeededDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides)
    }
}

/// A scripted sequence of faces, cycled when exhausted.
///
/// Values are clamped into the rolled die's range.
#[derive(Debug, Clone)]
pub struct FixedDice {
    values: Vec<u32>,
    next: usize,
}

impl FixedDice {
    /// Script the given faces.
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, next: 0 }
    }
}

impl DieSource for FixedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if self.values.is_empty() {
            return 1;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value.clamp(1, sides)
    }
}
