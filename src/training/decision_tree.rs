//! Decision tree implementation

use crate::error::{Result, TuneError};
use super::models::{check_shapes, unique_classes, Estimator, TaskType};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl FromStr for Criterion {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            "mse" | "squared_error" => Ok(Criterion::MSE),
            other => Err(TuneError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected one of gini, entropy, mse".to_string(),
            }),
        }
    }
}

/// Running statistics for one side of a candidate split
#[derive(Debug, Clone)]
struct NodeStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl NodeStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn add(&mut self, y: f64, class: Option<usize>) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        if let Some(c) = class {
            self.class_counts[c] += 1;
        }
    }

    fn remove(&mut self, y: f64, class: Option<usize>) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if let Some(c) = class {
            self.class_counts[c] -= 1;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self.class_counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
            }
            Criterion::Entropy => -self
                .class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            // Var = E[X²] - E[X]²
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// CART decision tree for classification or regression.
///
/// Splits are chosen by exhaustive threshold search over sorted feature values.
/// Ties between equally good splits resolve to the lowest feature index, and
/// ties between equally frequent classes in a leaf resolve to the smallest
/// label, so fitting is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Features considered at each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature subsampling
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Consider a random subset of `n` features at each split
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == Some(0) {
            return Err(TuneError::InvalidParameter {
                name: "max_depth".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(TuneError::InvalidParameter {
                name: "min_samples_split".to_string(),
                value: self.min_samples_split.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.is_classification == (self.criterion == Criterion::MSE) {
            return Err(TuneError::InvalidParameter {
                name: "criterion".to_string(),
                value: format!("{:?}", self.criterion),
                reason: "criterion does not match the task".to_string(),
            });
        }
        Ok(())
    }

    fn class_of(&self, y: f64) -> Option<usize> {
        if self.is_classification {
            self.classes.binary_search_by(|c| c.total_cmp(&y.round())).ok()
        } else {
            None
        }
    }

    fn node_stats(&self, y: &Array1<f64>, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::new(self.classes.len());
        for &i in indices {
            stats.add(y[i], self.class_of(y[i]));
        }
        stats
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(y, indices);
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.leaf(&stats);
        }

        let features: Vec<usize> = match self.max_features {
            Some(m) if m < self.n_features => {
                let mut chosen = sample(rng, self.n_features, m.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        };

        let Some((feature_idx, threshold, _)) = self.find_best_split(x, y, indices, &features, &stats) else {
            return self.leaf(&stats);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Best `(feature, threshold, gain)` over the candidate features
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent: &NodeStats,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;
        let parent_impurity = parent.impurity(self.criterion);

        // Each feature finds its own best split in one sorted sweep
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut left = NodeStats::new(self.classes.len());
                let mut right = parent.clone();
                let mut best: Option<(f64, f64)> = None;

                for w in 0..order.len() - 1 {
                    let idx = order[w];
                    let class = self.class_of(y[idx]);
                    left.add(y[idx], class);
                    right.remove(y[idx], class);

                    let here = x[[idx, feature_idx]];
                    let next = x[[order[w + 1], feature_idx]];
                    if next <= here {
                        continue;
                    }
                    let weighted = (left.count as f64 * left.impurity(self.criterion)
                        + right.count as f64 * right.impurity(self.criterion))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > best.map_or(1e-12, |(g, _)| g) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, cand| match best {
                Some(b) if b.2 >= cand.2 => Some(b),
                _ => Some(cand),
            })
    }

    fn leaf(&self, stats: &NodeStats) -> TreeNode {
        let value = if self.is_classification {
            // Mode, smallest label on ties
            let mut best = 0;
            for (c, &count) in stats.class_counts.iter().enumerate() {
                if count > stats.class_counts[best] {
                    best = c;
                }
            }
            self.classes.get(best).copied().unwrap_or(0.0)
        } else if stats.count > 0 {
            stats.sum / stats.count as f64
        } else {
            0.0
        };
        TreeNode::Leaf {
            value,
            n_samples: stats.count,
        }
    }

    fn predict_sample(&self, node: &TreeNode, sample: ndarray::ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    self.predict_sample(left, sample)
                } else {
                    self.predict_sample(right, sample)
                }
            }
        }
    }
}

impl Estimator for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.validate()?;

        self.n_features = x.ncols();
        self.classes = if self.is_classification { unique_classes(y) } else { Vec::new() };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TuneError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(TuneError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| self.predict_sample(root, row)).collect())
    }

    fn task_type(&self) -> TaskType {
        if self.is_classification {
            TaskType::Classification
        } else {
            TaskType::Regression
        }
    }

    fn name(&self) -> &'static str {
        if self.is_classification {
            "DecisionTreeClassifier"
        } else {
            "DecisionTreeRegressor"
        }
    }

    fn clone_box(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}
