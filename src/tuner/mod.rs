//! Tuning orchestration
//!
//! Ties the pieces of one tuning invocation together: feature/target split,
//! fold assignment, cross-validated search over the family's parameter space,
//! hold-out metrics and the final fit on the full data.

mod config;

pub use config::{FoldPolicy, TunerConfig};

use crate::data::split_features_target;
use crate::error::{Result, TuneError};
use crate::metrics::{MetricResult, MetricsReporter, MetricsStrategy};
use crate::optimizer::{SearchLoop, SearchSpace, Trial, TrialParams};
use crate::training::{CrossValidatedObjective, CrossValidator, Estimator, ModelCatalog, TaskType};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

/// Result of a successful tuning invocation
#[derive(Debug)]
pub struct TuningOutcome {
    /// Catalog key of the tuned family
    pub model_key: String,
    pub task: TaskType,
    /// Estimator built from the best parameters and fitted on the full data
    pub model: Box<dyn Estimator>,
    pub best_params: TrialParams,
    /// Mean cross-validated score of the best trial
    pub best_score: f64,
    /// Hold-out metrics of the best configuration
    pub metrics: MetricResult,
    pub n_folds: usize,
    /// Every trial in evaluation order
    pub trials: Vec<Trial>,
    pub elapsed_secs: f64,
}

impl TuningOutcome {
    /// Serializable summary of the outcome
    pub fn report(&self) -> TuningReport {
        TuningReport {
            model_key: self.model_key.clone(),
            task: self.task,
            best_params: self.best_params.clone(),
            best_score: self.best_score,
            metrics: self.metrics.clone(),
            n_folds: self.n_folds,
            n_trials: self.trials.len(),
            trials: self.trials.clone(),
            elapsed_secs: self.elapsed_secs,
        }
    }
}

/// Serializable summary of a tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningReport {
    pub model_key: String,
    pub task: TaskType,
    pub best_params: TrialParams,
    pub best_score: f64,
    pub metrics: MetricResult,
    pub n_folds: usize,
    pub n_trials: usize,
    pub trials: Vec<Trial>,
    pub elapsed_secs: f64,
}

impl TuningReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Runs tuning invocations with a fixed configuration.
///
/// The orchestrator holds no per-run state, so one instance may serve
/// concurrent invocations.
#[derive(Debug, Clone, Default)]
pub struct TuningOrchestrator {
    config: TunerConfig,
}

impl TuningOrchestrator {
    pub fn new(config: TunerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Tune `model_key`, returning `None` when no result could be produced.
    /// The cause is logged once here.
    pub fn tune(
        &self,
        df: &DataFrame,
        target: &str,
        model_key: &str,
        catalog: &ModelCatalog,
        task: TaskType,
    ) -> Option<TuningOutcome> {
        match self.try_tune(df, target, model_key, catalog, task) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    error = %e,
                    model = model_key,
                    target = target,
                    task = %task,
                    "Tuning produced no result"
                );
                None
            }
        }
    }

    /// Tune the first family of `shortlist` that yields a result
    pub fn tune_shortlist(
        &self,
        df: &DataFrame,
        target: &str,
        shortlist: &[&str],
        catalog: &ModelCatalog,
        task: TaskType,
    ) -> Option<TuningOutcome> {
        shortlist
            .iter()
            .find_map(|key| self.tune(df, target, key, catalog, task))
    }

    /// Tune `model_key`, propagating the first error
    pub fn try_tune(
        &self,
        df: &DataFrame,
        target: &str,
        model_key: &str,
        catalog: &ModelCatalog,
        task: TaskType,
    ) -> Result<TuningOutcome> {
        let start = Instant::now();
        self.config.validate()?;

        let family = catalog.get(model_key)?;
        if family.task_type() != task {
            return Err(TuneError::ConfigError(format!(
                "model family '{}' solves {} but the task is {}",
                model_key,
                family.task_type(),
                task
            )));
        }
        let search_space = SearchSpace::from_spec(&family.spec)?;

        let (x, y) = split_features_target(df, target)?;
        let n_folds = self.config.fold_policy.n_folds(x.nrows())?;
        let folds = CrossValidator::k_fold(x.nrows(), n_folds, self.config.cv_seed)?;

        info!(
            model = model_key,
            task = %task,
            rows = x.nrows(),
            features = x.ncols(),
            folds = n_folds,
            trials = self.config.optimization.n_trials,
            "Tuning started"
        );

        let objective = CrossValidatedObjective::new(family.factory.as_ref(), &x, &y, &folds)
            .with_parallel_folds(self.config.parallel_folds);

        let study = SearchLoop::new(self.config.optimization.clone(), search_space)
            .run(|params| objective.evaluate(params))?;

        let best = study
            .best_trial()
            .ok_or_else(|| TuneError::ComputationError("search finished without a best trial".to_string()))?;
        let best_params = best.params.clone();
        let best_score = best.value;

        let strategy = <dyn MetricsStrategy>::for_task(task);
        let reporter = MetricsReporter::new(strategy, self.config.test_size, self.config.split_seed);
        let mut model = family.factory.build(&best_params)?;
        let metrics = reporter.report(model.as_ref(), &x, &y)?;
        model.fit(&x, &y)?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            model = model_key,
            best_score = best_score,
            elapsed_secs = elapsed_secs,
            "Tuning finished"
        );

        Ok(TuningOutcome {
            model_key: model_key.to_string(),
            task,
            model,
            best_params,
            best_score,
            metrics,
            n_folds,
            trials: study.trials,
            elapsed_secs,
        })
    }
}

/// Tune `model_key` with the default configuration
pub fn tune(
    df: &DataFrame,
    target: &str,
    model_key: &str,
    catalog: &ModelCatalog,
    task: TaskType,
) -> Option<TuningOutcome> {
    TuningOrchestrator::default().tune(df, target, model_key, catalog, task)
}
