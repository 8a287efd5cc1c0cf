//! Bounded-budget search loop

use crate::error::{Result, TuneError};
use super::{
    config::OptimizationConfig,
    samplers::{create_sampler, Sampler},
    search_space::{SearchSpace, TrialParams},
    study::{Study, Trial},
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Runs exactly `n_trials` trials against an objective and tracks the best one.
///
/// Trials are dispatched in batches of `n_jobs`. Every assignment in a batch is
/// drawn before any of them is evaluated, so a batch only sees the history of
/// earlier batches. With `n_jobs == 1` and a fixed seed the run is fully
/// reproducible; with more jobs it is reproducible for that job count only.
pub struct SearchLoop {
    config: OptimizationConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
}

impl SearchLoop {
    /// Create a search loop with the sampler named by the config
    pub fn new(config: OptimizationConfig, search_space: SearchSpace) -> Self {
        let sampler = create_sampler(
            &config.sampler,
            config.random_state,
            config.n_startup_trials,
            config.gamma,
            config.n_ei_candidates,
        );
        Self {
            config,
            search_space,
            sampler,
        }
    }

    /// Replace the sampler
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// Run the search. The first failing trial aborts the run.
    pub fn run<F>(&mut self, objective: F) -> Result<Study>
    where
        F: Fn(&TrialParams) -> Result<f64> + Sync,
    {
        let n_trials = self.config.n_trials;
        if n_trials == 0 {
            return Err(TuneError::ConfigError("n_trials must be at least 1".to_string()));
        }

        let start = Instant::now();
        let direction = self.config.direction.clone();
        let n_jobs = self.config.n_jobs.max(1);

        let mut study = Study::new(direction.clone());
        let mut history: Vec<(TrialParams, f64)> = Vec::with_capacity(n_trials);

        let evaluate = |(trial_id, params): (usize, TrialParams)| -> Result<Trial> {
            let trial_start = Instant::now();
            let value = objective(&params).map_err(|e| TuneError::TrialFailed {
                trial_id,
                source: Box::new(e),
            })?;
            if !value.is_finite() {
                return Err(TuneError::TrialFailed {
                    trial_id,
                    source: Box::new(TuneError::ComputationError(format!(
                        "objective returned non-finite score {}",
                        value
                    ))),
                });
            }
            Ok(Trial {
                trial_id,
                params,
                value,
                duration_secs: trial_start.elapsed().as_secs_f64(),
            })
        };

        let mut next_id = 0;
        while next_id < n_trials {
            let batch_size = n_jobs.min(n_trials - next_id);
            let batch: Vec<(usize, TrialParams)> = (next_id..next_id + batch_size)
                .map(|id| (id, self.sampler.sample(&self.search_space, &history)))
                .collect();
            debug_assert!(batch.iter().all(|(_, p)| self.search_space.contains(p)));

            let results: Vec<Result<Trial>> = if batch_size > 1 {
                batch.into_par_iter().map(&evaluate).collect()
            } else {
                batch.into_iter().map(&evaluate).collect()
            };

            // Single writer: results are folded in trial-id order
            for result in results {
                let trial = result?;
                history.push((trial.params.clone(), direction.to_loss(trial.value)));
                let (trial_id, value, duration_secs) = (trial.trial_id, trial.value, trial.duration_secs);
                study.add_trial(trial);
                debug!(
                    trial = trial_id,
                    value = value,
                    best = ?study.best_value(),
                    duration_secs = duration_secs,
                    "Trial complete"
                );
            }

            next_id += batch_size;
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();
        debug!(
            trials = study.len(),
            best = study.best_value(),
            elapsed_secs = study.total_duration_secs,
            "Search finished"
        );

        Ok(study)
    }
}
