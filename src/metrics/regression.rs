use super::{MetricResult, MetricsStrategy};
use crate::training::r2_score;
use ndarray::Array1;

/// R², mean absolute error, mean squared error and its root
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionMetrics;

impl RegressionMetrics {
    pub const KEYS: [&'static str; 4] = ["R2", "MAE", "MSE", "RMSE"];
}

impl MetricsStrategy for RegressionMetrics {
    fn name(&self) -> &'static str {
        "regression"
    }

    fn keys(&self) -> &'static [&'static str] {
        &Self::KEYS
    }

    fn compute(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> MetricResult {
        let n = y_true.len().max(1) as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        MetricResult::from([
            ("R2".to_string(), r2_score(y_true, y_pred)),
            ("MAE".to_string(), mae),
            ("MSE".to_string(), mse),
            ("RMSE".to_string(), mse.sqrt()),
        ])
    }
}
