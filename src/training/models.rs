//! Estimator trait and task types

use crate::error::{Result, TuneError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of supervised learning task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Binary or multi-class classification
    Classification,
    /// Regression
    Regression,
}

impl FromStr for TaskType {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classification" | "Classification" => Ok(TaskType::Classification),
            "regression" | "Regression" => Ok(TaskType::Regression),
            other => Err(TuneError::UnknownTaskType(other.to_string())),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Classification => write!(f, "Classification"),
            TaskType::Regression => write!(f, "Regression"),
        }
    }
}

/// A supervised model that can be fit, used for prediction and scored.
///
/// `score` follows the native convention of the task: accuracy for
/// classifiers, R² for regressors.
pub trait Estimator: Send + Sync + fmt::Debug {
    /// Fit the model to training data, replacing any previous fit
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Task this estimator solves
    fn task_type(&self) -> TaskType;

    /// Short model name
    fn name(&self) -> &'static str;

    /// Clone into a new box
    fn clone_box(&self) -> Box<dyn Estimator>;

    /// Native score on held-out data
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(match self.task_type() {
            TaskType::Classification => accuracy_score(y, &y_pred),
            TaskType::Regression => r2_score(y, &y_pred),
        })
    }
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Fraction of exact label matches
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Coefficient of determination
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let y_mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TuneError::shape_mismatch(x.nrows(), y.len()));
    }
    if x.nrows() == 0 {
        return Err(TuneError::TrainingError("cannot fit on an empty dataset".to_string()));
    }
    Ok(())
}

/// Sorted distinct labels
pub(crate) fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().map(|v| v.round()).collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}
