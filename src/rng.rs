//! Random number utilities.
//!
//! Every randomized routine in this crate takes `&mut impl Rng`, and each
//! island owns a [`StdRng`] seeded from the configured base seed plus the
//! island id, so parallel runs are reproducible: two workers never share a
//! generator stream.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Creates a seeded random number generator.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Flips a biased coin: returns `true` with probability `p`.
///
/// `p` is clamped to `[0, 1]`.
pub fn flip_coin<R: Rng>(rng: &mut R, p: f64) -> bool {
    rng.random_bool(p.clamp(0.0, 1.0))
}

/// Partitions `pool` into equal-sized groups by random shuffle.
///
/// Shuffles `pool` in place and copies it row-major into `groups`. Every
/// group must have the same length and the group sizes must sum to
/// `pool.len()`.
pub fn random_groups<R: Rng>(groups: &mut [Vec<usize>], pool: &mut [usize], rng: &mut R) {
    pool.shuffle(rng);
    let mut k = 0;
    for group in groups.iter_mut() {
        for slot in group.iter_mut() {
            *slot = pool[k];
            k += 1;
        }
    }
}

/// Draws `count` distinct values from `lo..hi`, returned sorted ascending.
///
/// Used for crossover cut positions. If `count >= hi - lo` the full range
/// is returned.
pub fn distinct_in_range<R: Rng>(rng: &mut R, count: usize, lo: usize, hi: usize) -> Vec<usize> {
    let span = hi.saturating_sub(lo);
    if count >= span {
        return (lo..hi).collect();
    }
    let mut candidates: Vec<usize> = (lo..hi).collect();
    candidates.partial_shuffle(rng, count);
    let mut picked: Vec<usize> = candidates[..count].to_vec();
    picked.sort_unstable();
    picked
}
