//! Named pseudo-random streams for reproducible channel realizations.
//!
//! Every stochastic step of the model draws from one of six fixed-purpose
//! ChaCha streams. Streams are seeded once per simulation run from a base
//! stream number plus a fixed per-stream offset, so a realization depends
//! only on the assigned base and the sequence of draws within each family,
//! never on the interleaving between families or on call order elsewhere in
//! the host simulator.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution, Exp, Gamma, Normal, Poisson};

/// The fixed-purpose random streams of the channel model.
pub struct RandomStreams {
    uniform: ChaCha8Rng,
    normal: ChaCha8Rng,
    exponential: ChaCha8Rng,
    gamma: ChaCha8Rng,
    poisson: ChaCha8Rng,
    bernoulli: ChaCha8Rng,
}

impl RandomStreams {
    /// Number of stream seeds consumed by `assign`.
    pub const STREAMS_CONSUMED: u64 = 6;

    /// Deterministically seed all streams starting at `stream`.
    ///
    /// The next free stream number for other components is
    /// `stream + Self::STREAMS_CONSUMED`.
    pub fn assign(stream: u64) -> Self {
        Self {
            uniform: ChaCha8Rng::seed_from_u64(stream),
            normal: ChaCha8Rng::seed_from_u64(stream + 1),
            exponential: ChaCha8Rng::seed_from_u64(stream + 2),
            gamma: ChaCha8Rng::seed_from_u64(stream + 3),
            poisson: ChaCha8Rng::seed_from_u64(stream + 4),
            bernoulli: ChaCha8Rng::seed_from_u64(stream + 5),
        }
    }

    /// Uniform draw in [0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.uniform.gen()
    }

    /// Uniform draw in [low, high).
    pub fn uniform_range(&mut self, low: f64, high: f64) -> f64 {
        self.uniform.gen_range(low..high)
    }

    /// Uniform integer draw in [low, high], inclusive on both ends.
    pub fn discrete_uniform(&mut self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        self.uniform.gen_range(low..=high)
    }

    /// Standard normal draw, N(0, 1).
    pub fn standard_normal(&mut self) -> f64 {
        Normal::new(0.0, 1.0).unwrap().sample(&mut self.normal)
    }

    /// Exponential draw with the given mean.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        assert!(mean > 0.0, "exponential mean must be positive, got {mean}");
        Exp::new(1.0 / mean).unwrap().sample(&mut self.exponential)
    }

    /// Gamma draw with the given shape and scale.
    pub fn gamma(&mut self, shape: f64, scale: f64) -> f64 {
        Gamma::new(shape, scale).unwrap().sample(&mut self.gamma)
    }

    /// Poisson draw with the given rate.
    pub fn poisson(&mut self, lambda: f64) -> u32 {
        let value: f64 = Poisson::new(lambda).unwrap().sample(&mut self.poisson);
        value as u32
    }

    /// Bernoulli draw with success probability `p`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        Bernoulli::new(p.clamp(0.0, 1.0))
            .unwrap()
            .sample(&mut self.bernoulli)
    }
}
