// src/rng.rs
//! Random Number Generation for Multilevel Monte Carlo
//!
//! # Stream Layout
//!
//! Every simulate call of the estimator draws from its own generator. The seed
//! of that generator is a deterministic function of:
//! 1. the base seed of the run,
//! 2. the outer iteration,
//! 3. the level,
//! 4. the batch index inside the level (pilot batch = 0, top-up chunks 1, 2, ...).
//!
//! The coordinates are folded through a splitmix64 finalizer, so neighbouring
//! coordinates land on unrelated `StdRng` seeds:
//! ```text
//! z = seed ⊕ (key * 0x9e3779b97f4a7c15)
//! z = (z ⊕ (z >> 30)) * 0xbf58476d1ce4e5b9
//! z = (z ⊕ (z >> 27)) * 0x94d049bb133111eb
//! output = z ⊕ (z >> 31)
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

fn splitmix64(seed: u64, key: u64) -> u64 {
    let mut z = seed ^ key.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9u64);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111ebu64);
    z ^ (z >> 31)
}

/// Coordinates of one simulation batch inside an estimator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId {
    pub iteration: u64,
    pub level: u64,
    pub batch: u64,
}

impl StreamId {
    pub fn new(iteration: usize, level: usize, batch: usize) -> Self {
        Self {
            iteration: iteration as u64,
            level: level as u64,
            batch: batch as u64,
        }
    }
}

/// RNG factory handing out disjoint, reproducible streams
#[derive(Debug, Clone, Copy)]
pub struct RngFactory {
    base_seed: u64,
}

impl RngFactory {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Seed of the stream identified by `id`
    pub fn stream_seed(&self, id: StreamId) -> u64 {
        let z = splitmix64(self.base_seed, id.iteration);
        let z = splitmix64(z, id.level);
        splitmix64(z, id.batch)
    }

    /// Create the generator for one simulation batch
    pub fn create_stream(&self, id: StreamId) -> StdRng {
        StdRng::seed_from_u64(self.stream_seed(id))
    }
}

pub fn seed_rng_from_u64(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn get_normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}
