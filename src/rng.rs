//! # Random Number Generation
//!
//! `RandomNumberGenerator` wraps the `rand` crate's `StdRng` and exposes the
//! draws the breeding operators need: uniform, bounded integer, Bernoulli and
//! Gaussian.
//!
//! `RandomStreams` holds one generator per stream identifier. Callers pick a
//! stream explicitly (typically a worker index), and every stream yields an
//! independent, reproducible sequence derived from a single base seed.
//!
//! ## Example
//!
//! ```rust
//! use vecgen::rng::{RandomNumberGenerator, RandomStreams};
//!
//! let mut rng = RandomNumberGenerator::from_seed(7);
//! let x = rng.uniform();
//! assert!((0.0..1.0).contains(&x));
//!
//! let mut streams = RandomStreams::from_seed(7, 4);
//! let coin = streams.stream(2).next_bool();
//! # let _ = coin;
//! ```

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// A wrapper around the `rand` crate's `StdRng`.
#[derive(Clone, Debug)]
pub struct RandomNumberGenerator {
    pub rng: StdRng,
}

impl RandomNumberGenerator {
    /// Creates a new `RandomNumberGenerator` instance seeded from the system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a new `RandomNumberGenerator` instance with a specific seed.
    ///
    /// This is useful for reproducible tests and benchmarks.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw from `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform index from `0..n`. `n` must be positive.
    pub fn below(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    /// Fair coin.
    pub fn next_bool(&mut self) -> bool {
        self.rng.gen::<bool>()
    }

    /// Bernoulli trial that succeeds with probability `p`.
    ///
    /// Probabilities outside `[0, 1]` saturate instead of panicking.
    pub fn next_bool_with(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.rng.gen_bool(p)
        }
    }

    /// Standard normal draw.
    pub fn gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Uniform integer from the closed interval `[min, max]`.
    ///
    /// When `max - min` does not fit in an `i64`, full-range draws are
    /// rejected until one lands inside the interval.
    pub fn closed_interval(&mut self, min: i64, max: i64) -> i64 {
        debug_assert!(min <= max);
        match max.checked_sub(min) {
            Some(diff) => min + self.rng.gen_range(0..=diff),
            None => loop {
                let value = self.rng.gen::<i64>();
                if value >= min && value <= max {
                    return value;
                }
            },
        }
    }

    /// Raw 64 bits, used to seed derived generators.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen::<u64>()
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// One independent generator per stream identifier.
#[derive(Clone, Debug)]
pub struct RandomStreams {
    streams: Vec<RandomNumberGenerator>,
}

impl RandomStreams {
    /// Creates `count` streams, each seeded deterministically from `seed`.
    pub fn from_seed(seed: u64, count: usize) -> Self {
        let mut root = RandomNumberGenerator::from_seed(seed);
        let streams = (0..count.max(1))
            .map(|_| RandomNumberGenerator::from_seed(root.next_u64()))
            .collect();
        Self { streams }
    }

    /// Creates `count` streams seeded from system entropy.
    pub fn new(count: usize) -> Self {
        Self::from_seed(RandomNumberGenerator::new().next_u64(), count)
    }

    /// Number of streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// The generator for stream `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a configured stream.
    pub fn stream(&mut self, id: usize) -> &mut RandomNumberGenerator {
        &mut self.streams[id]
    }

    /// Mutable access to the first `n` streams, for handing out to workers.
    pub(crate) fn streams_mut(&mut self, n: usize) -> &mut [RandomNumberGenerator] {
        let n = n.min(self.streams.len());
        &mut self.streams[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_in_unit_interval() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        for _ in 0..1000 {
            let x = rng.uniform();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_closed_interval_includes_endpoints() {
        let mut rng = RandomNumberGenerator::from_seed(2);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..1000 {
            let v = rng.closed_interval(-1, 1);
            assert!((-1..=1).contains(&v));
            seen_min |= v == -1;
            seen_max |= v == 1;
        }
        assert!(seen_min && seen_max);
    }

    #[test]
    fn test_closed_interval_overflowing_range() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        for _ in 0..100 {
            let v = rng.closed_interval(i64::MIN, i64::MAX / 2);
            assert!(v <= i64::MAX / 2);
        }
        assert_eq!(rng.closed_interval(i64::MAX, i64::MAX), i64::MAX);
    }

    #[test]
    fn test_next_bool_with_saturates() {
        let mut rng = RandomNumberGenerator::from_seed(4);
        assert!(!rng.next_bool_with(0.0));
        assert!(!rng.next_bool_with(-1.0));
        assert!(rng.next_bool_with(1.0));
        assert!(rng.next_bool_with(2.0));
    }

    #[test]
    fn test_clone() {
        let mut rng1 = RandomNumberGenerator::from_seed(42);
        let mut rng2 = rng1.clone();
        let a: Vec<f64> = (0..5).map(|_| rng1.uniform()).collect();
        let b: Vec<f64> = (0..5).map(|_| rng2.uniform()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_streams_are_reproducible_and_independent() {
        let mut s1 = RandomStreams::from_seed(9, 3);
        let mut s2 = RandomStreams::from_seed(9, 3);
        let a: Vec<u64> = (0..4).map(|_| s1.stream(1).next_u64()).collect();
        let b: Vec<u64> = (0..4).map(|_| s2.stream(1).next_u64()).collect();
        assert_eq!(a, b);

        let c: Vec<u64> = (0..4).map(|_| s1.stream(2).next_u64()).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_streams_at_least_one() {
        let streams = RandomStreams::from_seed(0, 0);
        assert_eq!(streams.len(), 1);
    }
}
