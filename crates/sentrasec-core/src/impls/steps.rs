//! Step sources: random increments for the console, scripted ones for tests.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ports::StepSource;

/// `uniform(0, max_step)` increments.
pub struct RandomSteps {
    rng: StdRng,
}

impl RandomSteps {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence, for demos and property-style tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSteps {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSource for RandomSteps {
    fn next_step(&mut self, max_step: f64) -> f64 {
        if max_step.is_nan() || max_step <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(0.0..=max_step)
    }
}

/// Scripted increments; once the script runs out every step is `fallback`.
///
/// Steps are capped at the task's `max_step`, like a real draw would be.
pub struct FixedSteps {
    script: VecDeque<f64>,
    fallback: f64,
}

impl FixedSteps {
    pub fn new(script: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: 0.0,
        }
    }

    pub fn constant(step: f64) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: step,
        }
    }

    pub fn then(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }
}

impl StepSource for FixedSteps {
    fn next_step(&mut self, max_step: f64) -> f64 {
        let step = self.script.pop_front().unwrap_or(self.fallback);
        step.clamp(0.0, max_step.max(0.0))
    }
}
