//! Optimization configuration

use serde::{Deserialize, Serialize};
use super::SamplerType;

/// Direction of optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Whether `candidate` is strictly better than `incumbent`
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => candidate < incumbent,
            OptimizeDirection::Maximize => candidate > incumbent,
        }
    }

    /// Map a score onto a loss where lower is always better
    pub fn to_loss(&self, value: f64) -> f64 {
        match self {
            OptimizeDirection::Minimize => value,
            OptimizeDirection::Maximize => -value,
        }
    }
}

/// Configuration for the hyperparameter search loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Optimization direction
    pub direction: OptimizeDirection,

    /// Sampler type
    pub sampler: SamplerType,

    /// Number of initial random samples before TPE guidance kicks in
    pub n_startup_trials: usize,

    /// Number of trials evaluated concurrently
    pub n_jobs: usize,

    /// Random seed
    pub random_state: Option<u64>,

    /// Fraction of the history treated as "good" by TPE
    pub gamma: f64,

    /// Candidates drawn per parameter when maximizing expected improvement
    pub n_ei_candidates: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_trials: 5,
            direction: OptimizeDirection::Maximize,
            sampler: SamplerType::TPE,
            n_startup_trials: 3,
            n_jobs: 1,
            random_state: Some(42),
            gamma: 0.25,
            n_ei_candidates: 24,
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set direction
    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builder method to set the number of random startup trials
    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Builder method to enable parallel trial evaluation
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n.max(1);
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }
}
