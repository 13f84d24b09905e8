//! Value pools for drawing new gene values.
//!
//! A [`Bingo`] bundles the admissible values for every gene kind: an
//! integer range, per-gene float ranges, and explicit pools for strings,
//! keys, byte-strings and function tags. Population generators and the
//! pool-backed mutations draw from it; the evolutionary loop itself never
//! touches the pool.

use crate::individual::GeneFunc;
use rand::Rng;

/// Pool of admissible gene values.
#[derive(Debug, Clone, Default)]
pub struct Bingo {
    int_lo: i64,
    int_hi: i64,
    flt_ranges: Vec<(f64, f64)>,
    strings: Vec<String>,
    keys: Vec<u8>,
    bytes: Vec<Vec<u8>>,
    funcs: Vec<GeneFunc>,
}

impl Bingo {
    /// Builds a pool whose float ranges mirror the engine's `range_flt`.
    pub fn with_float_ranges(ranges: &[(f64, f64)]) -> Self {
        Self {
            flt_ranges: ranges.to_vec(),
            ..Self::default()
        }
    }

    /// Sets the inclusive integer range.
    pub fn with_int_range(mut self, lo: i64, hi: i64) -> Self {
        self.int_lo = lo;
        self.int_hi = hi;
        self
    }

    /// Sets the string pool.
    pub fn with_strings(mut self, pool: &[&str]) -> Self {
        self.strings = pool.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Sets the key pool.
    pub fn with_keys(mut self, pool: &[u8]) -> Self {
        self.keys = pool.to_vec();
        self
    }

    /// Sets the byte-string pool.
    pub fn with_bytes(mut self, pool: &[&[u8]]) -> Self {
        self.bytes = pool.iter().map(|b| b.to_vec()).collect();
        self
    }

    /// Sets the function-tag pool.
    pub fn with_funcs(mut self, pool: &[GeneFunc]) -> Self {
        self.funcs = pool.to_vec();
        self
    }

    /// Whether an integer range has been configured.
    pub fn has_int_pool(&self) -> bool {
        self.int_hi > self.int_lo
    }

    /// Draws an integer from the configured range (inclusive).
    pub fn draw_int<R: Rng>(&self, rng: &mut R) -> i64 {
        if !self.has_int_pool() {
            return self.int_lo;
        }
        rng.random_range(self.int_lo..=self.int_hi)
    }

    /// Draws a float for gene `g` from its configured range.
    ///
    /// Falls back to `[0, 1)` when no range is configured for `g`.
    pub fn draw_float<R: Rng>(&self, g: usize, rng: &mut R) -> f64 {
        match self.flt_ranges.get(g) {
            Some(&(lo, hi)) if hi > lo => rng.random_range(lo..hi),
            Some(&(lo, _)) => lo,
            None => rng.random_range(0.0..1.0),
        }
    }

    /// Draws a string from the pool, `None` when the pool is empty.
    pub fn draw_string<R: Rng>(&self, rng: &mut R) -> Option<String> {
        pick(&self.strings, rng).cloned()
    }

    /// Draws a key from the pool, `None` when the pool is empty.
    pub fn draw_key<R: Rng>(&self, rng: &mut R) -> Option<u8> {
        pick(&self.keys, rng).copied()
    }

    /// Draws a byte-string from the pool, `None` when the pool is empty.
    pub fn draw_bytes<R: Rng>(&self, rng: &mut R) -> Option<Vec<u8>> {
        pick(&self.bytes, rng).cloned()
    }

    /// Draws a function tag from the pool, `None` when the pool is empty.
    pub fn draw_func<R: Rng>(&self, rng: &mut R) -> Option<GeneFunc> {
        pick(&self.funcs, rng).copied()
    }
}

fn pick<'a, T, R: Rng>(pool: &'a [T], rng: &mut R) -> Option<&'a T> {
    if pool.is_empty() {
        None
    } else {
        Some(&pool[rng.random_range(0..pool.len())])
    }
}
