//! Uniform number source for drill rounds.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::Range;

/// Produces a uniformly distributed integer inside an inclusive range.
///
/// An inverted range cannot reach an implementation: `Range::new` rejects it at
/// the input boundary, so `next` has no failure case.
pub trait RandomNumberSource {
    fn next(&mut self, range: Range) -> i64;
}

/// Thread-local generator for the running application.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomNumberSource for ThreadRandom {
    fn next(&mut self, range: Range) -> i64 {
        rand::rng().random_range(range.min()..=range.max())
    }
}

/// Seeded generator, reproducible across runs.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    inner: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomNumberSource for SeededRandom {
    fn next(&mut self, range: Range) -> i64 {
        self.inner.random_range(range.min()..=range.max())
    }
}

impl<R: RandomNumberSource + ?Sized> RandomNumberSource for Box<R> {
    fn next(&mut self, range: Range) -> i64 {
        (**self).next(range)
    }
}
