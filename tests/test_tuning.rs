//! Integration test: tuning invocations end-to-end

use kolosal_tuner::optimizer::ParameterSpec;
use kolosal_tuner::training::{ModelCatalog, TaskType};
use kolosal_tuner::tuner::{FoldPolicy, TunerConfig, TuningOrchestrator};
use kolosal_tuner::tune;
use polars::prelude::*;

fn regression_df(n: usize) -> DataFrame {
    let x1: Vec<f64> = (0..n).map(|i| (i % 13) as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 * 0.5).collect();
    let x3: Vec<f64> = (0..n).map(|i| ((i * 3) % 5) as f64 - 2.0).collect();
    let target: Vec<f64> = (0..n)
        .map(|i| 3.0 * x1[i] - 2.0 * x2[i] + 0.5 * x3[i] + 4.0)
        .collect();
    df!(
        "x1" => x1,
        "x2" => x2,
        "x3" => x3,
        "target" => target
    )
    .unwrap()
}

/// Three well separated clusters of 20 rows each
fn classification_df() -> DataFrame {
    let mut f1 = Vec::new();
    let mut f2 = Vec::new();
    let mut f3 = Vec::new();
    let mut label = Vec::new();
    for class in 0..3 {
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.1;
            f1.push(class as f64 * 10.0 + jitter);
            f2.push(-(class as f64) * 5.0 + jitter * 2.0);
            f3.push((i % 4) as f64);
            label.push(class as f64);
        }
    }
    df!(
        "f1" => f1,
        "f2" => f2,
        "f3" => f3,
        "label" => label
    )
    .unwrap()
}

#[test]
fn test_tune_regression_end_to_end() {
    let catalog = ModelCatalog::builtin()
        .with_spec("RidgeRegression", ParameterSpec::new().float("alpha", 0.0, 1.0))
        .unwrap();

    let outcome = tune(&regression_df(100), "target", "RidgeRegression", &catalog, TaskType::Regression)
        .expect("tuning should produce a result");

    assert_eq!(outcome.trials.len(), 5);
    assert_eq!(outcome.n_folds, 5);
    assert_eq!(outcome.model_key, "RidgeRegression");
    assert_eq!(outcome.best_params.len(), 1);

    let alpha = outcome.best_params["alpha"].as_float().unwrap();
    assert!((0.0..=1.0).contains(&alpha));

    let keys: Vec<&str> = outcome.metrics.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["MAE", "MSE", "R2", "RMSE"]);
    assert!(outcome.metrics["R2"] > 0.95);
    assert!((outcome.metrics["RMSE"].powi(2) - outcome.metrics["MSE"]).abs() < 1e-9);

    let best = outcome.trials.iter().map(|t| t.value).fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(outcome.best_score, best);
}

#[test]
fn test_tune_classification_end_to_end() {
    let catalog = ModelCatalog::builtin()
        .with_spec("DecisionTreeClassifier", ParameterSpec::new().int("max_depth", 1, 10))
        .unwrap();

    let outcome = tune(&classification_df(), "label", "DecisionTreeClassifier", &catalog, TaskType::Classification)
        .expect("tuning should produce a result");

    assert_eq!(outcome.n_folds, 5);
    assert_eq!(outcome.trials.len(), 5);
    let depth = outcome.best_params["max_depth"].as_int().unwrap();
    assert!((1..=10).contains(&depth));

    let keys: Vec<&str> = outcome.metrics.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["F1-Score", "precision", "recall"]);
    for value in outcome.metrics.values() {
        assert!((0.0..=1.0).contains(value));
    }
    assert_eq!(outcome.model.name(), "DecisionTreeClassifier");
}

#[test]
fn test_small_dataset_uses_two_folds() {
    let outcome = TuningOrchestrator::new(TunerConfig::new().with_n_trials(2))
        .tune(&regression_df(25), "target", "RidgeRegression", &ModelCatalog::builtin(), TaskType::Regression)
        .unwrap();
    assert_eq!(outcome.n_folds, 2);
}

#[test]
fn test_custom_fold_policy() {
    let policy = FoldPolicy {
        min_rows_per_fold: 5,
        min_folds: 3,
        max_folds: 8,
    };
    let outcome = TuningOrchestrator::new(TunerConfig::new().with_n_trials(1).with_fold_policy(policy))
        .tune(&regression_df(60), "target", "RidgeRegression", &ModelCatalog::builtin(), TaskType::Regression)
        .unwrap();
    assert_eq!(outcome.n_folds, 8);
}

#[test]
fn test_unknown_family_yields_none() {
    let result = tune(&regression_df(40), "target", "SupportVectorMachine", &ModelCatalog::builtin(), TaskType::Regression);
    assert!(result.is_none());
}

#[test]
fn test_unsupported_parameter_kind_yields_none() {
    let catalog = ModelCatalog::builtin()
        .with_spec(
            "RidgeRegression",
            ParameterSpec::new().with("alpha", "unsupported_kind", serde_json::json!([0.001, 1.0])),
        )
        .unwrap();
    let result = tune(&regression_df(40), "target", "RidgeRegression", &catalog, TaskType::Regression);
    assert!(result.is_none());
}

#[test]
fn test_unsampleable_real_range_yields_none() {
    let catalog = ModelCatalog::builtin()
        .with_spec("RidgeRegression", ParameterSpec::new().float("alpha", -1e308, 1e308))
        .unwrap();
    let result = tune(&regression_df(40), "target", "RidgeRegression", &catalog, TaskType::Regression);
    assert!(result.is_none());
}

#[test]
fn test_failing_trial_yields_none() {
    // Negative alpha is rejected when the estimator is fitted
    let catalog = ModelCatalog::builtin()
        .with_spec("RidgeRegression", ParameterSpec::new().float("alpha", -2.0, -1.0))
        .unwrap();
    let result = tune(&regression_df(40), "target", "RidgeRegression", &catalog, TaskType::Regression);
    assert!(result.is_none());
}

#[test]
fn test_non_numeric_feature_yields_none() {
    let df = df!(
        "city" => &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
        "target" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]
    )
    .unwrap();
    let result = tune(&df, "target", "RidgeRegression", &ModelCatalog::builtin(), TaskType::Regression);
    assert!(result.is_none());
}

#[test]
fn test_shortlist_falls_back_to_next_family() {
    let catalog = ModelCatalog::builtin()
        .with_spec("RidgeRegression", ParameterSpec::new().float("alpha", -2.0, -1.0))
        .unwrap();
    let orchestrator = TuningOrchestrator::new(TunerConfig::new().with_n_trials(2));

    let outcome = orchestrator
        .tune_shortlist(
            &regression_df(50),
            "target",
            &["RidgeRegression", "DecisionTreeRegressor"],
            &catalog,
            TaskType::Regression,
        )
        .expect("second family should succeed");
    assert_eq!(outcome.model_key, "DecisionTreeRegressor");

    let none = orchestrator.tune_shortlist(&regression_df(50), "target", &["RidgeRegression"], &catalog, TaskType::Regression);
    assert!(none.is_none());
}

#[test]
fn test_fixed_seed_is_reproducible() {
    let df = classification_df();
    let catalog = ModelCatalog::builtin();
    let orchestrator = TuningOrchestrator::new(TunerConfig::new().with_n_trials(4).with_random_state(Some(7)));

    let a = orchestrator.tune(&df, "label", "KNeighborsClassifier", &catalog, TaskType::Classification).unwrap();
    let b = orchestrator.tune(&df, "label", "KNeighborsClassifier", &catalog, TaskType::Classification).unwrap();

    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.best_score, b.best_score);
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn test_concurrent_invocations_are_independent() {
    let df = regression_df(60);
    let catalog = ModelCatalog::builtin();
    let orchestrator = TuningOrchestrator::new(TunerConfig::new().with_n_trials(3).with_random_state(Some(11)));

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                scope.spawn(|| {
                    orchestrator
                        .tune(&df, "target", "DecisionTreeRegressor", &catalog, TaskType::Regression)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for outcome in &outcomes[1..] {
        assert_eq!(outcome.best_params, outcomes[0].best_params);
        assert_eq!(outcome.best_score, outcomes[0].best_score);
        assert_eq!(outcome.metrics, outcomes[0].metrics);
    }
}

#[test]
fn test_parallel_trials_respect_budget() {
    let outcome = TuningOrchestrator::new(TunerConfig::new().with_n_trials(7).with_n_jobs(3))
        .tune(&regression_df(50), "target", "LassoRegression", &ModelCatalog::builtin(), TaskType::Regression)
        .unwrap();
    assert_eq!(outcome.trials.len(), 7);
    let ids: Vec<usize> = outcome.trials.iter().map(|t| t.trial_id).collect();
    assert_eq!(ids, (0..7).collect::<Vec<_>>());
}
