//! Hold-out evaluation of a tuned estimator
//!
//! A [`MetricsStrategy`] is chosen once per task type and computes a fixed set
//! of named metrics; [`MetricsReporter`] fits a copy of the estimator on a
//! seeded 80/20 split and applies the strategy to the held-out part.

mod classification;
mod regression;

pub use classification::ClassificationMetrics;
pub use regression::RegressionMetrics;

use crate::error::{Result, TuneError};
use crate::training::{Estimator, TaskType};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Named metric values
pub type MetricResult = BTreeMap<String, f64>;

/// Computes the metrics reported for one task type
pub trait MetricsStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Keys always present in the result
    fn keys(&self) -> &'static [&'static str];

    /// Compute every metric from true and predicted targets
    fn compute(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> MetricResult;
}

impl dyn MetricsStrategy {
    /// Strategy for a task type
    pub fn for_task(task: TaskType) -> Box<dyn MetricsStrategy> {
        match task {
            TaskType::Classification => Box::new(ClassificationMetrics),
            TaskType::Regression => Box::new(RegressionMetrics),
        }
    }
}

/// Seeded shuffled split into `(x_train, x_test, y_train, y_test)`.
///
/// The test part holds `ceil(n * test_size)` rows, kept within `[1, n - 1]`.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>)> {
    let n = x.nrows();
    if n != y.len() {
        return Err(TuneError::shape_mismatch(n, y.len()));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TuneError::ConfigError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n < 2 {
        return Err(TuneError::DataError(format!(
            "need at least 2 rows to split, got {}",
            n
        )));
    }

    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok((
        x.select(Axis(0), train_idx),
        x.select(Axis(0), test_idx),
        y.select(Axis(0), train_idx),
        y.select(Axis(0), test_idx),
    ))
}

/// Reports hold-out metrics for an estimator
pub struct MetricsReporter {
    strategy: Box<dyn MetricsStrategy>,
    test_size: f64,
    seed: u64,
}

impl MetricsReporter {
    pub fn new(strategy: Box<dyn MetricsStrategy>, test_size: f64, seed: u64) -> Self {
        Self {
            strategy,
            test_size,
            seed,
        }
    }

    /// Reporter for `task` with the default 80/20 split seeded with 123
    pub fn for_task(task: TaskType) -> Self {
        Self::new(<dyn MetricsStrategy>::for_task(task), 0.2, 123)
    }

    pub fn strategy(&self) -> &dyn MetricsStrategy {
        self.strategy.as_ref()
    }

    /// Fit a fresh copy of `estimator` on the training part and score the held-out part.
    /// The given estimator is left untouched.
    pub fn report(&self, estimator: &dyn Estimator, x: &Array2<f64>, y: &Array1<f64>) -> Result<MetricResult> {
        let (x_train, x_test, y_train, y_test) = train_test_split(x, y, self.test_size, self.seed)?;

        let mut model = estimator.clone_box();
        model.fit(&x_train, &y_train)?;
        let y_pred = model.predict(&x_test)?;

        Ok(self.strategy.compute(&y_test, &y_pred))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::RidgeRegression;

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = x.column(0).to_owned() * 2.0 + 1.0;
        (x, y)
    }

    #[test]
    fn test_split_sizes() {
        let (x, y) = data(10);
        let (x_train, x_test, y_train, y_test) = train_test_split(&x, &y, 0.2, 123).unwrap();
        assert_eq!(x_train.nrows(), 8);
        assert_eq!(x_test.nrows(), 2);
        assert_eq!(y_train.len(), 8);
        assert_eq!(y_test.len(), 2);

        // sklearn rounds the test part up
        let (_, x_test, _, _) = train_test_split(&data(11).0, &data(11).1, 0.2, 123).unwrap();
        assert_eq!(x_test.nrows(), 3);
    }

    #[test]
    fn test_split_keeps_rows_paired() {
        let (x, y) = data(25);
        let (x_train, _, y_train, _) = train_test_split(&x, &y, 0.2, 5).unwrap();
        for (row, target) in x_train.rows().into_iter().zip(y_train.iter()) {
            assert_eq!(row[0] * 2.0 + 1.0, *target);
        }
    }

    #[test]
    fn test_split_is_seeded() {
        let (x, y) = data(30);
        let a = train_test_split(&x, &y, 0.2, 123).unwrap();
        let b = train_test_split(&x, &y, 0.2, 123).unwrap();
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_split_rejects_tiny_input() {
        let (x, y) = data(1);
        assert!(matches!(train_test_split(&x, &y, 0.2, 0), Err(TuneError::DataError(_))));
        let (x, y) = data(10);
        assert!(train_test_split(&x, &y, 1.0, 0).unwrap_err().is_config_error());
    }

    #[test]
    fn test_reporter_leaves_estimator_unfitted() {
        let (x, y) = data(20);
        let model = RidgeRegression::new(0.0);
        let reporter = MetricsReporter::for_task(TaskType::Regression);
        let metrics = reporter.report(&model, &x, &y).unwrap();
        assert!(metrics["R2"] > 0.999);
        assert!(model.coefficients.is_none());
    }
}
