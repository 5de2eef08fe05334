use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of fresh 128-bit session identifiers.
///
/// Identifiers are drawn uniformly and never checked for collisions.
pub trait IdSource: Send + Sync + std::fmt::Debug {
    fn next_id(&self) -> u128;
}

/// Identifiers from a `StdRng` owned by this source.
#[derive(Debug)]
pub struct RandomIds {
    rng: Mutex<StdRng>,
}

impl RandomIds {
    /// Seeded from the operating system's entropy source.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible sequence, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for RandomIds {
    fn next_id(&self) -> u128 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random::<u128>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_is_reproducible() {
        let a = RandomIds::seeded(7);
        let b = RandomIds::seeded(7);
        let first: Vec<u128> = (0..4).map(|_| a.next_id()).collect();
        let second: Vec<u128> = (0..4).map(|_| b.next_id()).collect();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_os_seeded_ids_differ() {
        let ids = RandomIds::new();
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
