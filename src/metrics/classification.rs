use super::{MetricResult, MetricsStrategy};
use ndarray::Array1;
use std::collections::BTreeMap;

/// Support-weighted F1, precision and recall.
///
/// Averages run over the classes present in `y_true`. A class that is never
/// predicted has precision 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationMetrics;

#[derive(Default)]
struct ClassCounts {
    support: usize,
    predicted: usize,
    true_positive: usize,
}

impl ClassificationMetrics {
    pub const KEYS: [&'static str; 3] = ["F1-Score", "precision", "recall"];

    fn class_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> BTreeMap<i64, ClassCounts> {
        let mut counts: BTreeMap<i64, ClassCounts> = BTreeMap::new();
        for &t in y_true {
            counts.entry(t.round() as i64).or_default().support += 1;
        }
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let (t, p) = (t.round() as i64, p.round() as i64);
            // Predictions of classes absent from y_true do not enter the average
            if let Some(c) = counts.get_mut(&p) {
                c.predicted += 1;
                if t == p {
                    c.true_positive += 1;
                }
            }
        }
        counts
    }
}

impl MetricsStrategy for ClassificationMetrics {
    fn name(&self) -> &'static str {
        "classification"
    }

    fn keys(&self) -> &'static [&'static str] {
        &Self::KEYS
    }

    fn compute(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> MetricResult {
        let counts = Self::class_counts(y_true, y_pred);
        let total = y_true.len() as f64;

        let (mut f1, mut precision, mut recall) = (0.0, 0.0, 0.0);
        if total > 0.0 {
            for c in counts.values() {
                let p = if c.predicted > 0 {
                    c.true_positive as f64 / c.predicted as f64
                } else {
                    0.0
                };
                let r = c.true_positive as f64 / c.support as f64;
                let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

                let weight = c.support as f64 / total;
                precision += weight * p;
                recall += weight * r;
                f1 += weight * f;
            }
        }

        MetricResult::from([
            ("F1-Score".to_string(), f1),
            ("precision".to_string(), precision),
            ("recall".to_string(), recall),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction() {
        let y = array![0.0, 1.0, 2.0, 1.0];
        let m = ClassificationMetrics.compute(&y, &y);
        for key in ClassificationMetrics::KEYS {
            assert_eq!(m[key], 1.0);
        }
    }

    #[test]
    fn test_weighted_binary() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let m = ClassificationMetrics.compute(&y_true, &y_pred);
        // Both classes: 3 of 4 recovered, 3 of 4 predictions right
        assert!((m["precision"] - 0.75).abs() < 1e-12);
        assert!((m["recall"] - 0.75).abs() < 1e-12);
        assert!((m["F1-Score"] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_never_predicted_class() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0, 0.0];
        let m = ClassificationMetrics.compute(&y_true, &y_pred);
        // class 0: p = 0.5, r = 1; class 1: p = 0, r = 0
        assert!((m["precision"] - 0.25).abs() < 1e-12);
        assert!((m["recall"] - 0.5).abs() < 1e-12);
        assert!((m["F1-Score"] - 0.5 * (2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_values_in_unit_interval() {
        let y_true = array![0.0, 1.0, 2.0, 2.0, 1.0, 0.0, 2.0];
        let y_pred = array![2.0, 1.0, 0.0, 2.0, 5.0, 0.0, 1.0];
        let m = ClassificationMetrics.compute(&y_true, &y_pred);
        assert_eq!(m.len(), 3);
        assert!(m.values().all(|v| (0.0..=1.0).contains(v)));
    }
}
