//! Seeded random streams keyed by scope.
//!
//! Each `(scope, iteration)` pair maps to its own stream through a BLAKE3
//! hash of the master seed. No stream depends on which others were drawn
//! before it, so the factory, the synthetic market and the search all stay
//! reproducible under any thread count.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a sub-seed for `(scope, iteration)`.
    ///
    /// Scopes name the consumer ("factory", "market/BTCUSDT", ...).
    pub fn sub_seed(&self, scope: &str, iteration: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&iteration.to_le_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    pub fn rng_for(&self, scope: &str, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, iteration))
    }
}
