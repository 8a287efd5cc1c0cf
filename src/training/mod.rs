//! Model training module
//!
//! Provides the estimators that can be tuned and the machinery to score them:
//! - Linear models (Ridge, Lasso, Logistic)
//! - Decision trees and Random Forests
//! - K-Nearest Neighbors
//! - K-fold cross-validation and the cross-validated trial objective
//! - A catalog of model families keyed by name

mod models;
pub mod catalog;
pub mod cross_validation;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod knn;

pub use models::{accuracy_score, r2_score, Estimator, TaskType};
pub use catalog::{FnFactory, ModelCatalog, ModelFactory, ModelFamily};
pub use cross_validation::{CrossValidatedObjective, CrossValidator, CVResults, CVSplit};
pub use linear_models::{LassoRegression, LogisticRegression, RidgeRegression};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};
pub use knn::{KNNClassifier, KNNConfig, KNNRegressor, WeightScheme};
