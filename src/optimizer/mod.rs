//! Hyperparameter optimization module
//!
//! Provides:
//! - Declarative parameter specifications and typed search spaces
//! - Tree-structured Parzen Estimator (TPE) and random samplers
//! - A bounded-budget search loop with batched parallel trial evaluation

mod config;
mod search_space;
mod samplers;
mod study;
mod search;

pub use config::{OptimizationConfig, OptimizeDirection};
pub use search_space::{ParamDecl, ParamDomain, Parameter, ParameterSpec, ParameterValue, SearchSpace, TrialParams};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler};
pub use study::{Study, Trial};
pub use search::SearchLoop;
