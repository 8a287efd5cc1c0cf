//! Kolosal Tuner - cross-validated hyperparameter tuning for tabular models
//!
//! Given a cleaned dataset, a target column and a model family with a
//! declarative parameter space, the tuner runs a bounded budget of
//! cross-validated trials guided by a Tree-structured Parzen Estimator, fits
//! the best configuration on the full data and reports hold-out metrics.
//!
//! # Modules
//!
//! - [`optimizer`] - Parameter spaces, samplers and the search loop
//! - [`training`] - Estimators, cross-validation and the model catalog
//! - [`metrics`] - Task-specific hold-out metrics
//! - [`tuner`] - Orchestration of a tuning invocation
//! - [`data`] - DataFrame loading and conversion
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use kolosal_tuner::prelude::*;
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//! let catalog = ModelCatalog::builtin();
//! if let Some(outcome) = tune(&df, "price", "RidgeRegression", &catalog, TaskType::Regression) {
//!     println!("best {:?} scored {:.3}", outcome.best_params, outcome.best_score);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod data;
pub mod optimizer;
pub mod training;
pub mod metrics;
pub mod tuner;
pub mod cli;

pub use error::{Result, TuneError};
pub use tuner::tune;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Result, TuneError};
    pub use crate::metrics::{MetricResult, MetricsReporter, MetricsStrategy};
    pub use crate::optimizer::{OptimizationConfig, ParameterSpec, ParameterValue, SamplerType, SearchSpace, TrialParams};
    pub use crate::training::{Estimator, ModelCatalog, ModelFactory, ModelFamily, TaskType};
    pub use crate::tuner::{tune, FoldPolicy, TunerConfig, TuningOrchestrator, TuningOutcome, TuningReport};
}
