//! K-Nearest Neighbors implementation
//!
//! KNN classifier and regressor over a stored training set. Prediction is
//! parallelized over query rows with rayon.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::str::FromStr;

use crate::error::{Result, TuneError};
use super::models::{check_shapes, Estimator, TaskType};

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl FromStr for WeightScheme {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(WeightScheme::Uniform),
            "distance" => Ok(WeightScheme::Distance),
            other => Err(TuneError::InvalidParameter {
                name: "weights".to_string(),
                value: other.to_string(),
                reason: "expected uniform or distance".to_string(),
            }),
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: WeightScheme::Uniform,
        }
    }
}

impl KNNConfig {
    fn validate(&self) -> Result<()> {
        if self.n_neighbors == 0 {
            return Err(TuneError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Stored training set shared by both KNN estimators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TrainingSet {
    x: Option<Array2<f64>>,
    y: Option<Array1<f64>>,
}

impl TrainingSet {
    fn store(&mut self, config: &KNNConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        config.validate()?;
        self.x = Some(x.clone());
        self.y = Some(y.clone());
        Ok(())
    }

    /// Neighbors of every query row, as `(distance, label)` pairs
    fn query(&self, config: &KNNConfig, x: &Array2<f64>) -> Result<Vec<Vec<(f64, f64)>>> {
        let (x_train, y_train) = match (&self.x, &self.y) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(TuneError::ModelNotFitted),
        };
        if x.ncols() != x_train.ncols() {
            return Err(TuneError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let k = config.n_neighbors.min(x_train.nrows());
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| find_k_nearest(x.row(i), x_train, y_train, k))
            .collect())
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    train: TrainingSet,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            train: TrainingSet::default(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }
}

impl Estimator for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.train.store(&self.config, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let neighbors = self.train.query(&self.config, x)?;
        Ok(neighbors
            .iter()
            .map(|n| vote_classify(n, self.config.weights))
            .collect())
    }

    fn task_type(&self) -> TaskType {
        TaskType::Classification
    }

    fn name(&self) -> &'static str {
        "KNeighborsClassifier"
    }

    fn clone_box(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    train: TrainingSet,
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            train: TrainingSet::default(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }
}

impl Estimator for KNNRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.train.store(&self.config, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let neighbors = self.train.query(&self.config, x)?;
        Ok(neighbors
            .iter()
            .map(|n| weighted_mean_from(n, self.config.weights))
            .collect())
    }

    fn task_type(&self) -> TaskType {
        TaskType::Regression
    }

    fn name(&self) -> &'static str {
        "KNeighborsRegressor"
    }

    fn clone_box(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k).
/// Equidistant rows keep the earlier training row.
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = euclidean_distance(point, row);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_sorted_vec().into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(ai, bi)| (ai - bi) * (ai - bi))
        .sum::<f64>()
        .sqrt()
}

fn neighbor_weight(dist: f64, weights: WeightScheme) -> f64 {
    match weights {
        WeightScheme::Uniform => 1.0,
        WeightScheme::Distance => 1.0 / (dist + 1e-10),
    }
}

/// Weighted majority vote, smallest label on ties
fn vote_classify(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let mut votes: BTreeMap<i64, f64> = BTreeMap::new();
    for &(dist, label) in neighbors {
        *votes.entry(label.round() as i64).or_insert(0.0) += neighbor_weight(dist, weights);
    }
    votes
        .into_iter()
        .fold(None, |best: Option<(i64, f64)>, (label, w)| match best {
            Some(b) if b.1 >= w => Some(b),
            _ => Some((label, w)),
        })
        .map(|(label, _)| label as f64)
        .unwrap_or(0.0)
}

fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let (weighted_sum, weight_total) = neighbors.iter().fold((0.0, 0.0), |(s, t), &(dist, y)| {
        let w = neighbor_weight(dist, weights);
        (s + w * y, t + w)
    });
    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((20, 2), vec![
            // Class 0 (low values)
            1.0, 1.0, 1.5, 1.5, 2.0, 2.0, 2.5, 2.5, 1.0, 2.0,
            1.5, 2.5, 2.0, 1.5, 2.5, 1.0, 1.2, 1.8, 1.8, 1.2,
            // Class 1 (high values)
            8.0, 8.0, 8.5, 8.5, 9.0, 9.0, 9.5, 9.5, 8.0, 9.0,
            8.5, 9.5, 9.0, 8.5, 9.5, 8.0, 8.2, 8.8, 8.8, 8.2,
        ]).unwrap();

        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
        ]);

        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_knn_regressor() {
        let x = Array2::from_shape_vec((10, 2), (0..20).map(|i| i as f64).collect()).unwrap();
        let y: Array1<f64> = x.rows().into_iter().map(|row| row[0] + row[1]).collect();

        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();
        let predictions = knn.predict(&x).unwrap();
        let mse: f64 = y.iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| (yi - pi).powi(2))
            .sum::<f64>() / y.len() as f64;
        assert!(mse < 10.0, "MSE ({}) should be low", mse);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert!((euclidean_distance(a.view(), b.view()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weighting_exact_match() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![10.0, 20.0, 30.0];
        let mut knn = KNNRegressor::new(KNNConfig {
            n_neighbors: 3,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(50);
        knn.fit(&x, &y).unwrap();
        // All 20 rows vote; equal counts resolve to the smaller label
        assert!(knn.predict(&x).unwrap().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(0);
        assert!(matches!(knn.fit(&x, &y), Err(TuneError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KNNRegressor::with_k(3);
        assert!(matches!(knn.predict(&array![[1.0]]), Err(TuneError::ModelNotFitted)));
    }

    #[test]
    fn test_weight_scheme_parsing() {
        assert_eq!("distance".parse::<WeightScheme>().unwrap(), WeightScheme::Distance);
        assert!("cosine".parse::<WeightScheme>().is_err());
    }
}
