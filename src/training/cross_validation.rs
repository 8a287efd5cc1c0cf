//! K-fold splitting and the cross-validated trial objective

use crate::error::{Result, TuneError};
use crate::optimizer::TrialParams;
use super::catalog::ModelFactory;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Shuffled k-fold splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_splits: usize,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new splitter with `n_splits` folds
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Seeded k-fold assignment over `n_samples` rows
    pub fn k_fold(n_samples: usize, k: usize, seed: u64) -> Result<Vec<CVSplit>> {
        Self::new(k).with_random_state(seed).split(n_samples)
    }

    /// Generate train/test splits.
    ///
    /// Rows are shuffled, then cut into contiguous groups whose sizes differ
    /// by at most one. The first `n % k` folds get the extra row.
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(TuneError::ValidationError(
                "n_splits must be at least 2".to_string()
            ));
        }
        if n_samples < n_splits {
            return Err(TuneError::DataError(
                format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        indices.shuffle(&mut rng);

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores (summed in fold order)
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Scores one parameter assignment by k-fold cross-validation.
///
/// Everything is borrowed from the tuning invocation that created it, so
/// independent invocations never share state. Each fold gets a freshly built
/// estimator; the result is the mean of the estimators' native scores
/// (accuracy for classifiers, R² for regressors).
pub struct CrossValidatedObjective<'a> {
    factory: &'a dyn ModelFactory,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    folds: &'a [CVSplit],
    parallel_folds: bool,
}

impl<'a> CrossValidatedObjective<'a> {
    pub fn new(
        factory: &'a dyn ModelFactory,
        x: &'a Array2<f64>,
        y: &'a Array1<f64>,
        folds: &'a [CVSplit],
    ) -> Self {
        Self {
            factory,
            x,
            y,
            folds,
            parallel_folds: true,
        }
    }

    /// Evaluate folds on the rayon pool (default: true)
    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    /// Mean fold score for `params`. The first failing fold's error is returned unchanged.
    pub fn evaluate(&self, params: &TrialParams) -> Result<f64> {
        if self.folds.is_empty() {
            return Err(TuneError::ValidationError("no folds to evaluate".to_string()));
        }

        let scores: Vec<f64> = if self.parallel_folds {
            self.folds
                .par_iter()
                .map(|split| self.score_fold(params, split))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.folds
                .iter()
                .map(|split| self.score_fold(params, split))
                .collect::<Result<Vec<_>>>()?
        };

        let results = CVResults::from_scores(scores);
        debug!(
            folds = results.n_folds,
            mean = results.mean_score,
            std = results.std_score,
            "Cross-validation complete"
        );
        Ok(results.mean_score)
    }

    fn score_fold(&self, params: &TrialParams, split: &CVSplit) -> Result<f64> {
        let x_train = self.x.select(Axis(0), &split.train_indices);
        let y_train = self.y.select(Axis(0), &split.train_indices);
        let x_test = self.x.select(Axis(0), &split.test_indices);
        let y_test = self.y.select(Axis(0), &split.test_indices);

        let mut model = self.factory.build(params)?;
        model.fit(&x_train, &y_train)?;
        model.score(&x_test, &y_test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;
    use crate::training::catalog::FnFactory;
    use crate::training::linear_models::RidgeRegression;
    use crate::training::models::{Estimator, TaskType};

    #[test]
    fn test_k_fold_covers_every_row_once() {
        let splits = CrossValidator::k_fold(23, 5, 42).unwrap();
        assert_eq!(splits.len(), 5);

        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..23).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        }
    }

    #[test]
    fn test_k_fold_is_seeded() {
        let a = CrossValidator::k_fold(50, 4, 7).unwrap();
        let b = CrossValidator::k_fold(50, 4, 7).unwrap();
        let c = CrossValidator::k_fold(50, 4, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_k_fold_rejects_bad_counts() {
        assert!(CrossValidator::k_fold(10, 1, 0).is_err());
        assert!(matches!(CrossValidator::k_fold(3, 5, 0), Err(TuneError::DataError(_))));
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.5, 0.7, 0.9]);
        assert!((results.mean_score - 0.7).abs() < 1e-12);
        assert_eq!(results.n_folds, 3);
        assert!(results.std_score > 0.0);
    }

    fn ridge_factory() -> FnFactory {
        FnFactory::new(TaskType::Regression, |params: &TrialParams| {
            let alpha = params.get("alpha").and_then(ParameterValue::as_float).unwrap_or(1.0);
            Ok(Box::new(RidgeRegression::new(alpha)) as Box<dyn Estimator>)
        })
    }

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * 7 + j * 3) % 13) as f64);
        let y = x.column(0).mapv(|v| 3.0 * v) - &x.column(1) + 0.5;
        (x, y)
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let (x, y) = linear_data();
        let folds = CrossValidator::k_fold(x.nrows(), 4, 42).unwrap();
        let factory = ridge_factory();
        let mut params = TrialParams::new();
        params.insert("alpha".to_string(), ParameterValue::Float(0.3));

        let parallel = CrossValidatedObjective::new(&factory, &x, &y, &folds);
        let sequential = CrossValidatedObjective::new(&factory, &x, &y, &folds)
            .with_parallel_folds(false);

        let a = parallel.evaluate(&params).unwrap();
        let b = sequential.evaluate(&params).unwrap();
        assert_eq!(a, b);
        assert!(a > 0.99);
    }

    #[test]
    fn test_sequential_five_fold_is_repeatable() {
        let (x, y) = linear_data();
        let factory = ridge_factory();
        let mut params = TrialParams::new();
        params.insert("alpha".to_string(), ParameterValue::Float(0.7));

        let folds = CrossValidator::k_fold(x.nrows(), 5, 42).unwrap();
        let objective = CrossValidatedObjective::new(&factory, &x, &y, &folds).with_parallel_folds(false);
        assert_eq!(objective.n_folds(), 5);
        let first = objective.evaluate(&params).unwrap();
        assert_eq!(objective.evaluate(&params).unwrap(), first);

        let refolded = CrossValidator::k_fold(x.nrows(), 5, 42).unwrap();
        let fresh = CrossValidatedObjective::new(&factory, &x, &y, &refolded).with_parallel_folds(false);
        assert_eq!(fresh.evaluate(&params).unwrap(), first);
    }

    #[test]
    fn test_construction_error_propagates() {
        let (x, y) = linear_data();
        let folds = CrossValidator::k_fold(x.nrows(), 3, 42).unwrap();
        let factory = FnFactory::new(TaskType::Regression, |_: &TrialParams| {
            Err(TuneError::InvalidParameter {
                name: "alpha".to_string(),
                value: "x".to_string(),
                reason: "bad".to_string(),
            })
        });
        let objective = CrossValidatedObjective::new(&factory, &x, &y, &folds);
        assert!(matches!(
            objective.evaluate(&TrialParams::new()),
            Err(TuneError::InvalidParameter { .. })
        ));
    }
}
