//! Seedable standard-normal sources for path generation.
//!
//! Each path draws from its own stream, keyed by path index, so paths are
//! independent and the result does not depend on how paths are scheduled
//! across threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub trait NormalStream {
    fn next_normal(&mut self) -> f64;
}

pub trait VariateSource: Send + Sync {
    type Stream: NormalStream;

    fn stream(&self, path_index: usize) -> Self::Stream;
}

/// SplitMix64 finalizer over `(base_seed, path_index)`.
#[inline]
pub fn path_seed(base_seed: u64, path_index: usize) -> u64 {
    let mut z = base_seed ^ (path_index as u64)
        .wrapping_add(1)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// `StdRng` streams derived from one base seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededNormals {
    base_seed: u64,
}

impl SeededNormals {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Base seed drawn from the thread-local generator. Record
    /// [`SeededNormals::base_seed`] to replay the run.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }
}

pub struct RngStream {
    rng: StdRng,
}

impl NormalStream for RngStream {
    #[inline]
    fn next_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

impl VariateSource for SeededNormals {
    type Stream = RngStream;

    fn stream(&self, path_index: usize) -> RngStream {
        RngStream {
            rng: StdRng::seed_from_u64(path_seed(self.base_seed, path_index)),
        }
    }
}

/// Every draw is zero: paths follow the drift alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroShocks;

impl NormalStream for ZeroShocks {
    fn next_normal(&mut self) -> f64 {
        0.0
    }
}

impl VariateSource for ZeroShocks {
    type Stream = ZeroShocks;

    fn stream(&self, _path_index: usize) -> ZeroShocks {
        ZeroShocks
    }
}
