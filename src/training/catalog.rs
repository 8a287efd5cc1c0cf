//! Model families: estimator factories paired with their parameter specifications

use crate::error::{Result, TuneError};
use crate::optimizer::{ParameterSpec, ParameterValue, TrialParams};
use super::decision_tree::{Criterion, DecisionTree};
use super::knn::{KNNClassifier, KNNConfig, KNNRegressor, WeightScheme};
use super::linear_models::{LassoRegression, LogisticRegression, RidgeRegression};
use super::models::{Estimator, TaskType};
use super::random_forest::RandomForest;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds an unfitted estimator from one parameter assignment.
///
/// Implementations must be safe to call concurrently; the search loop may
/// build several estimators at once.
pub trait ModelFactory: Send + Sync {
    /// Construct a fresh estimator. Unknown or ill-typed parameters are an error.
    fn build(&self, params: &TrialParams) -> Result<Box<dyn Estimator>>;

    /// Task the built estimators solve
    fn task_type(&self) -> TaskType;
}

type BuildFn = dyn Fn(&TrialParams) -> Result<Box<dyn Estimator>> + Send + Sync;

/// Factory backed by a closure
pub struct FnFactory {
    task: TaskType,
    build: Box<BuildFn>,
}

impl FnFactory {
    pub fn new<F>(task: TaskType, build: F) -> Self
    where
        F: Fn(&TrialParams) -> Result<Box<dyn Estimator>> + Send + Sync + 'static,
    {
        Self {
            task,
            build: Box::new(build),
        }
    }
}

impl ModelFactory for FnFactory {
    fn build(&self, params: &TrialParams) -> Result<Box<dyn Estimator>> {
        (self.build)(params)
    }

    fn task_type(&self) -> TaskType {
        self.task
    }
}

/// An estimator factory and the parameter space it is tuned over
#[derive(Clone)]
pub struct ModelFamily {
    pub factory: Arc<dyn ModelFactory>,
    pub spec: ParameterSpec,
}

impl ModelFamily {
    pub fn new(factory: Arc<dyn ModelFactory>, spec: ParameterSpec) -> Self {
        Self { factory, spec }
    }

    pub fn task_type(&self) -> TaskType {
        self.factory.task_type()
    }
}

impl fmt::Debug for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFamily")
            .field("task", &self.task_type())
            .field("spec", &self.spec)
            .finish()
    }
}

/// Registry of model families by key
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    families: BTreeMap<String, ModelFamily>,
}

impl ModelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the native estimators with their default search spaces
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for model in BuiltinModel::ALL {
            catalog.register(model.key(), ModelFamily::new(Arc::new(model), model.default_spec()));
        }
        catalog
    }

    /// Add or replace a family
    pub fn register(&mut self, key: impl Into<String>, family: ModelFamily) -> &mut Self {
        self.families.insert(key.into(), family);
        self
    }

    /// Register a closure-backed family
    pub fn register_fn<F>(&mut self, key: impl Into<String>, task: TaskType, spec: ParameterSpec, build: F) -> &mut Self
    where
        F: Fn(&TrialParams) -> Result<Box<dyn Estimator>> + Send + Sync + 'static,
    {
        self.register(key, ModelFamily::new(Arc::new(FnFactory::new(task, build)), spec))
    }

    /// Replace the parameter space of an existing family
    pub fn with_spec(mut self, key: &str, spec: ParameterSpec) -> Result<Self> {
        let family = self
            .families
            .get_mut(key)
            .ok_or_else(|| TuneError::UnknownModelFamily(key.to_string()))?;
        family.spec = spec;
        Ok(self)
    }

    /// Look up a family
    pub fn get(&self, key: &str) -> Result<&ModelFamily> {
        self.families
            .get(key)
            .ok_or_else(|| TuneError::UnknownModelFamily(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.families.contains_key(key)
    }

    /// Family keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelFamily)> {
        self.families.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys of the families solving `task`
    pub fn keys_for_task(&self, task: TaskType) -> Vec<&str> {
        self.iter()
            .filter(|(_, family)| family.task_type() == task)
            .map(|(key, _)| key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Typed access to a trial's parameters for one estimator
struct ParamReader<'a> {
    params: &'a TrialParams,
}

impl<'a> ParamReader<'a> {
    /// Reject any parameter the estimator does not accept
    fn new(params: &'a TrialParams, accepted: &[&str]) -> Result<Self> {
        if let Some(name) = params.keys().find(|name| !accepted.contains(&name.as_str())) {
            return Err(TuneError::InvalidParameter {
                name: name.clone(),
                value: params[name].to_string(),
                reason: format!("unexpected parameter; accepted: {}", accepted.join(", ")),
            });
        }
        Ok(Self { params })
    }

    fn typed<T>(&self, name: &str, default: T, expected: &str, get: impl Fn(&ParameterValue) -> Option<T>) -> Result<T> {
        match self.params.get(name) {
            None => Ok(default),
            Some(value) => get(value).ok_or_else(|| TuneError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: format!("expected {}", expected),
            }),
        }
    }

    fn float(&self, name: &str, default: f64) -> Result<f64> {
        self.typed(name, default, "a number", ParameterValue::as_float)
    }

    /// Integer parameter constrained to `>= min`
    fn count(&self, name: &str, default: usize, min: usize) -> Result<usize> {
        let value = self.typed(name, default as i64, "an integer", ParameterValue::as_int)?;
        if value < min as i64 {
            return Err(TuneError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: format!("must be at least {}", min),
            });
        }
        Ok(value as usize)
    }

    fn boolean(&self, name: &str, default: bool) -> Result<bool> {
        self.typed(name, default, "a boolean", ParameterValue::as_bool)
    }

    fn string(&self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.params.get(name) {
            None => Ok(default),
            Some(value) => value.as_str().ok_or_else(|| TuneError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: "expected a string".to_string(),
            }),
        }
    }
}

/// The estimators shipped with the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinModel {
    Ridge,
    Lasso,
    Logistic,
    TreeClassifier,
    TreeRegressor,
    ForestClassifier,
    ForestRegressor,
    KnnClassifier,
    KnnRegressor,
}

impl BuiltinModel {
    const ALL: [BuiltinModel; 9] = [
        BuiltinModel::Ridge,
        BuiltinModel::Lasso,
        BuiltinModel::Logistic,
        BuiltinModel::TreeClassifier,
        BuiltinModel::TreeRegressor,
        BuiltinModel::ForestClassifier,
        BuiltinModel::ForestRegressor,
        BuiltinModel::KnnClassifier,
        BuiltinModel::KnnRegressor,
    ];

    fn key(self) -> &'static str {
        match self {
            BuiltinModel::Ridge => "RidgeRegression",
            BuiltinModel::Lasso => "LassoRegression",
            BuiltinModel::Logistic => "LogisticRegression",
            BuiltinModel::TreeClassifier => "DecisionTreeClassifier",
            BuiltinModel::TreeRegressor => "DecisionTreeRegressor",
            BuiltinModel::ForestClassifier => "RandomForestClassifier",
            BuiltinModel::ForestRegressor => "RandomForestRegressor",
            BuiltinModel::KnnClassifier => "KNeighborsClassifier",
            BuiltinModel::KnnRegressor => "KNeighborsRegressor",
        }
    }

    fn default_spec(self) -> ParameterSpec {
        match self {
            BuiltinModel::Ridge => ParameterSpec::new()
                .float("alpha", 0.0, 1.0)
                .boolean("fit_intercept"),
            BuiltinModel::Lasso => ParameterSpec::new()
                .float("alpha", 0.0001, 1.0)
                .int("max_iter", 100, 2000),
            BuiltinModel::Logistic => ParameterSpec::new()
                .float("alpha", 0.0, 0.1)
                .float("learning_rate", 0.01, 0.5)
                .int("max_iter", 100, 1000),
            BuiltinModel::TreeClassifier => ParameterSpec::new()
                .int("max_depth", 1, 10)
                .int("min_samples_split", 2, 10)
                .categorical("criterion", vec!["gini", "entropy"]),
            BuiltinModel::TreeRegressor => ParameterSpec::new()
                .int("max_depth", 1, 10)
                .int("min_samples_split", 2, 10),
            BuiltinModel::ForestClassifier | BuiltinModel::ForestRegressor => ParameterSpec::new()
                .int("n_estimators", 10, 100)
                .int("max_depth", 2, 12)
                .boolean("bootstrap"),
            BuiltinModel::KnnClassifier | BuiltinModel::KnnRegressor => ParameterSpec::new()
                .int("n_neighbors", 1, 15)
                .categorical("weights", vec!["uniform", "distance"]),
        }
    }
}

impl ModelFactory for BuiltinModel {
    fn build(&self, params: &TrialParams) -> Result<Box<dyn Estimator>> {
        let model: Box<dyn Estimator> = match self {
            BuiltinModel::Ridge => {
                let p = ParamReader::new(params, &["alpha", "fit_intercept"])?;
                Box::new(
                    RidgeRegression::new(p.float("alpha", 1.0)?)
                        .with_fit_intercept(p.boolean("fit_intercept", true)?),
                )
            }
            BuiltinModel::Lasso => {
                let p = ParamReader::new(params, &["alpha", "max_iter"])?;
                Box::new(
                    LassoRegression::new(p.float("alpha", 1.0)?)
                        .with_max_iter(p.count("max_iter", 1000, 1)?),
                )
            }
            BuiltinModel::Logistic => {
                let p = ParamReader::new(params, &["alpha", "learning_rate", "max_iter"])?;
                Box::new(
                    LogisticRegression::new()
                        .with_alpha(p.float("alpha", 0.01)?)
                        .with_learning_rate(p.float("learning_rate", 0.1)?)
                        .with_max_iter(p.count("max_iter", 1000, 1)?),
                )
            }
            BuiltinModel::TreeClassifier => {
                let p = ParamReader::new(params, &["max_depth", "min_samples_split", "criterion"])?;
                let criterion: Criterion = p.string("criterion", "gini")?.parse()?;
                if criterion == Criterion::MSE {
                    return Err(TuneError::InvalidParameter {
                        name: "criterion".to_string(),
                        value: "mse".to_string(),
                        reason: "not a classification criterion".to_string(),
                    });
                }
                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_split(p.count("min_samples_split", 2, 2)?)
                    .with_criterion(criterion);
                if params.contains_key("max_depth") {
                    tree = tree.with_max_depth(p.count("max_depth", 1, 1)?);
                }
                Box::new(tree)
            }
            BuiltinModel::TreeRegressor => {
                let p = ParamReader::new(params, &["max_depth", "min_samples_split"])?;
                let mut tree = DecisionTree::new_regressor()
                    .with_min_samples_split(p.count("min_samples_split", 2, 2)?);
                if params.contains_key("max_depth") {
                    tree = tree.with_max_depth(p.count("max_depth", 1, 1)?);
                }
                Box::new(tree)
            }
            BuiltinModel::ForestClassifier | BuiltinModel::ForestRegressor => {
                let p = ParamReader::new(params, &["n_estimators", "max_depth", "bootstrap"])?;
                let n_estimators = p.count("n_estimators", 100, 1)?;
                let mut forest = if *self == BuiltinModel::ForestClassifier {
                    RandomForest::new_classifier(n_estimators)
                } else {
                    RandomForest::new_regressor(n_estimators)
                };
                forest = forest.with_bootstrap(p.boolean("bootstrap", true)?);
                if params.contains_key("max_depth") {
                    forest = forest.with_max_depth(p.count("max_depth", 1, 1)?);
                }
                Box::new(forest)
            }
            BuiltinModel::KnnClassifier | BuiltinModel::KnnRegressor => {
                let p = ParamReader::new(params, &["n_neighbors", "weights"])?;
                let config = KNNConfig {
                    n_neighbors: p.count("n_neighbors", 5, 1)?,
                    weights: p.string("weights", "uniform")?.parse::<WeightScheme>()?,
                };
                if *self == BuiltinModel::KnnClassifier {
                    Box::new(KNNClassifier::new(config))
                } else {
                    Box::new(KNNRegressor::new(config))
                }
            }
        };
        Ok(model)
    }

    fn task_type(&self) -> TaskType {
        match self {
            BuiltinModel::Ridge
            | BuiltinModel::Lasso
            | BuiltinModel::TreeRegressor
            | BuiltinModel::ForestRegressor
            | BuiltinModel::KnnRegressor => TaskType::Regression,
            BuiltinModel::Logistic
            | BuiltinModel::TreeClassifier
            | BuiltinModel::ForestClassifier
            | BuiltinModel::KnnClassifier => TaskType::Classification,
        }
    }
}
