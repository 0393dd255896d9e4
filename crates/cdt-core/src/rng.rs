//! Deterministic RNG wrapper, random-source trait and seed-derivation helpers.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Source of randomness consumed by the acceptance engine and pass driver.
pub trait RandomSource {
    /// Returns a uniform draw in `[0, 1)`.
    fn uniform01(&mut self) -> f64;

    /// Returns a uniform integer in the inclusive range `[lo, hi]`.
    ///
    /// Implementations must return `lo` when `hi <= lo`.
    fn uniform_int(&mut self, lo: u64, hi: u64) -> u64;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn uniform01(&mut self) -> f64 {
        (**self).uniform01()
    }

    fn uniform_int(&mut self, lo: u64, hi: u64) -> u64 {
        (**self).uniform_int(lo, hi)
    }
}

/// Deterministic RNG handle exposed to CDT consumers.
///
/// The handle is a thin wrapper around `StdRng` that documents the seeding
/// policy used throughout the project. A master `seed: u64` must be provided by
/// the caller. Substreams are derived by hashing `(master_seed, substream_id)`
/// with SipHash-1-3 configured with fixed zero keys, so the acceptance draws and
/// the executor's element choices never share a stream.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates the handle for a derived substream of `master_seed`.
    pub fn substream(master_seed: u64, substream: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, substream))
    }
}

impl RandomSource for RngHandle {
    fn uniform01(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn uniform_int(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
