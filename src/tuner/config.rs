//! Tuning invocation configuration

use crate::error::{Result, TuneError};
use crate::optimizer::OptimizationConfig;
use serde::{Deserialize, Serialize};

/// Chooses the number of cross-validation folds from the row count:
/// `clamp(n_rows / min_rows_per_fold, min_folds, max_folds)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldPolicy {
    pub min_rows_per_fold: usize,
    pub min_folds: usize,
    pub max_folds: usize,
}

impl Default for FoldPolicy {
    fn default() -> Self {
        Self {
            min_rows_per_fold: 10,
            min_folds: 2,
            max_folds: 5,
        }
    }
}

impl FoldPolicy {
    /// Fold count for a dataset of `n_rows` rows
    pub fn n_folds(&self, n_rows: usize) -> Result<usize> {
        self.validate()?;
        if n_rows < self.min_folds {
            return Err(TuneError::DataError(format!(
                "{} rows cannot be split into {} folds",
                n_rows, self.min_folds
            )));
        }
        Ok((n_rows / self.min_rows_per_fold).clamp(self.min_folds, self.max_folds))
    }

    fn validate(&self) -> Result<()> {
        if self.min_rows_per_fold == 0 {
            return Err(TuneError::ConfigError("min_rows_per_fold must be at least 1".to_string()));
        }
        if self.min_folds < 2 || self.max_folds < self.min_folds {
            return Err(TuneError::ConfigError(format!(
                "fold bounds must satisfy 2 <= min_folds ({}) <= max_folds ({})",
                self.min_folds, self.max_folds
            )));
        }
        Ok(())
    }
}

/// Configuration for one tuning invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Search loop settings (budget, sampler, seed, concurrency)
    pub optimization: OptimizationConfig,
    pub fold_policy: FoldPolicy,
    /// Seed for the fold assignment
    pub cv_seed: u64,
    /// Evaluate the folds of one trial in parallel
    pub parallel_folds: bool,
    /// Held-out fraction for the metrics report
    pub test_size: f64,
    /// Seed for the metrics split
    pub split_seed: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            optimization: OptimizationConfig::default(),
            fold_policy: FoldPolicy::default(),
            cv_seed: 42,
            parallel_folds: true,
            test_size: 0.2,
            split_seed: 123,
        }
    }
}

impl TunerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optimization(mut self, optimization: OptimizationConfig) -> Self {
        self.optimization = optimization;
        self
    }

    /// Set the trial budget
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.optimization.n_trials = n;
        self
    }

    /// Set how many trials run concurrently
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.optimization.n_jobs = n.max(1);
        self
    }

    /// Seed the sampler
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.optimization.random_state = seed;
        self
    }

    pub fn with_fold_policy(mut self, policy: FoldPolicy) -> Self {
        self.fold_policy = policy;
        self
    }

    pub fn with_cv_seed(mut self, seed: u64) -> Self {
        self.cv_seed = seed;
        self
    }

    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    /// Check settings that would otherwise fail midway through a run
    pub fn validate(&self) -> Result<()> {
        if self.optimization.n_trials == 0 {
            return Err(TuneError::ConfigError("n_trials must be at least 1".to_string()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TuneError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        self.fold_policy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_policy_examples() {
        let policy = FoldPolicy::default();
        assert_eq!(policy.n_folds(100).unwrap(), 5);
        assert_eq!(policy.n_folds(60).unwrap(), 5);
        assert_eq!(policy.n_folds(25).unwrap(), 2);
        assert_eq!(policy.n_folds(35).unwrap(), 3);
        assert_eq!(policy.n_folds(2).unwrap(), 2);
        assert!(matches!(policy.n_folds(1), Err(TuneError::DataError(_))));
    }

    #[test]
    fn test_fold_policy_validation() {
        let policy = FoldPolicy {
            min_rows_per_fold: 10,
            min_folds: 4,
            max_folds: 3,
        };
        assert!(policy.n_folds(100).unwrap_err().is_config_error());
    }

    #[test]
    fn test_defaults() {
        let config = TunerConfig::default();
        assert_eq!(config.optimization.n_trials, 5);
        assert_eq!(config.cv_seed, 42);
        assert_eq!(config.split_seed, 123);
        assert!((config.test_size - 0.2).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = TunerConfig::new().with_n_trials(0);
        assert!(config.validate().unwrap_err().is_config_error());

        let config = TunerConfig::new().with_n_jobs(0).with_test_size(0.3);
        assert_eq!(config.optimization.n_jobs, 1);
        assert!(config.validate().is_ok());
        assert!(TunerConfig::new().with_test_size(0.0).validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = TunerConfig::new().with_n_trials(9).with_cv_seed(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: TunerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.optimization.n_trials, 9);
        assert_eq!(back.cv_seed, 7);
    }
}
