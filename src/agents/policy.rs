use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ChargeError, Result};

/// Source of unconstrained actions, typically a learned actor network.
///
/// Proposals need not be feasible; [`super::SafetyProjector`] maps them onto
/// the feasible set before they reach the lot.
pub trait Policy {
    /// One proposed action per stall for the given observation.
    fn propose(&mut self, observation: &[f64]) -> Vec<f64>;
}

/// Draws every stall's action uniformly from `[low, high)`.
///
/// This is the exploration policy used before a learner has collected enough
/// experience, and a convenient stand-in for one in simulations.
#[derive(Debug, Clone)]
pub struct UniformRandomPolicy {
    stalls: usize,
    low: f64,
    high: f64,
    rng: StdRng,
}

impl UniformRandomPolicy {
    pub fn new(stalls: usize, low: f64, high: f64, seed: u64) -> Result<Self> {
        if !(high > low) {
            return Err(ChargeError::Configuration(format!(
                "empty policy action range [{low}, {high})"
            )));
        }
        Ok(Self {
            stalls,
            low,
            high,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Policy for UniformRandomPolicy {
    fn propose(&mut self, _observation: &[f64]) -> Vec<f64> {
        (0..self.stalls)
            .map(|_| self.rng.gen_range(self.low..self.high))
            .collect()
    }
}
