//! Linear model implementations

use crate::error::{Result, TuneError};
use super::models::{check_shapes, unique_classes, Estimator, TaskType};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `a * x = b` by Cholesky decomposition.
/// A near-singular matrix gets a small diagonal jitter before giving up.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    cholesky_factor(a).or_else(|| {
        let jitter = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += jitter.max(1e-12);
        }
        cholesky_factor(&a_reg)
    })
    .map(|l| {
        // Forward substitution: L * z = b
        let mut z = Array1::zeros(n);
        for i in 0..n {
            let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
            z[i] = (b[i] - sum) / l[[i, i]];
        }
        // Backward substitution: L^T * x = z
        let mut x = Array1::zeros(n);
        for i in (0..n).rev() {
            let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
            x[i] = (z[i] - sum) / l[[i, i]];
        }
        x
    })
}

fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Gauss-Jordan elimination with partial pivoting (fallback for non-PD systems)
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| aug[[r1, col]].abs().total_cmp(&aug[[r2, col]].abs()))?;
        if aug[[pivot_row, col]].abs() < 1e-10 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }
        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..=n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Center `x` and `y` column-wise when fitting an intercept
fn center(
    x: &Array2<f64>,
    y: &Array1<f64>,
    fit_intercept: bool,
) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    if fit_intercept {
        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let y_mean = y.mean().unwrap_or(0.0);
        (x - &x_mean.clone().insert_axis(Axis(0)), y - y_mean, x_mean, y_mean)
    } else {
        (x.clone(), y.clone(), Array1::zeros(x.ncols()), 0.0)
    }
}

/// Ridge Regression (L2-regularized least squares; `alpha = 0` is OLS)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Estimator for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.alpha < 0.0 {
            return Err(TuneError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        let (x_c, y_c, x_mean, y_mean) = center(x, y, self.fit_intercept);
        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..x.ncols() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = cholesky_solve(&xtx, &xty)
            .or_else(|| gauss_jordan_solve(&xtx, &xty))
            .ok_or_else(|| TuneError::ComputationError("Singular matrix".to_string()))?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(TuneError::ModelNotFitted)?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn task_type(&self) -> TaskType {
        TaskType::Regression
    }

    fn name(&self) -> &'static str {
        "RidgeRegression"
    }

    fn clone_box(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// Lasso Regression (L1-regularized via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }
}

impl Estimator for LassoRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let (x_c, y_c, x_mean, y_mean) = center(x, y, true);
        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = Array1::<f64>::zeros(n_features);
        let mut r = y_c.clone();
        let lambda = self.alpha * n_samples as f64;

        for _ in 0..self.max_iter {
            let mut max_delta = 0.0f64;
            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    continue;
                }
                let old = w[j];
                let rho = x_c.column(j).dot(&r) + col_norms[j] * old;
                w[j] = Self::soft_threshold(rho, lambda) / col_norms[j];
                let delta = old - w[j];
                if delta != 0.0 {
                    r.scaled_add(delta, &x_c.column(j));
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if max_delta < self.tol {
                break;
            }
        }

        self.intercept = y_mean - w.dot(&x_mean);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(TuneError::ModelNotFitted)?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn task_type(&self) -> TaskType {
        TaskType::Regression
    }

    fn name(&self) -> &'static str {
        "LassoRegression"
    }

    fn clone_box(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// Logistic regression trained by gradient descent.
///
/// Two classes fit a single sigmoid; more classes fit one-vs-rest and predict
/// the class with the highest probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// One `(weights, bias)` pair per fitted sigmoid
    pub coefficients: Vec<(Array1<f64>, f64)>,
    pub classes: Vec<f64>,
    /// L2 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
    /// Feature means and scales learned during fit
    scaling: Option<(Array1<f64>, Array1<f64>)>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: Vec::new(),
            classes: Vec::new(),
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            scaling: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn fit_binary(&self, x: &Array2<f64>, target: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = x.nrows() as f64;
        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let p = Self::sigmoid(&(x.dot(&w) + b));
            let err = &p - target;
            let grad_w = x.t().dot(&err) / n + &w * self.alpha;
            let grad_b = err.sum() / n;

            w.scaled_add(-self.learning_rate, &grad_w);
            b -= self.learning_rate * grad_b;

            let step = grad_w.mapv(f64::abs).sum() + grad_b.abs();
            if step * self.learning_rate < self.tol {
                break;
            }
        }
        (w, b)
    }

    fn scale(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, std) = self.scaling.as_ref().ok_or(TuneError::ModelNotFitted)?;
        Ok((x - &mean.view().insert_axis(Axis(0))) / &std.view().insert_axis(Axis(0)))
    }

    /// Per-class probabilities, one column per fitted sigmoid
    fn decision(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.coefficients.is_empty() {
            return Err(TuneError::ModelNotFitted);
        }
        let xs = self.scale(x)?;
        let mut out = Array2::zeros((x.nrows(), self.coefficients.len()));
        for (k, (w, b)) in self.coefficients.iter().enumerate() {
            out.column_mut(k).assign(&Self::sigmoid(&(xs.dot(w) + *b)));
        }
        Ok(out)
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(TuneError::TrainingError(
                "LogisticRegression needs at least two classes".to_string(),
            ));
        }

        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        self.scaling = Some((mean, std));
        let xs = self.scale(x)?;

        let targets: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };
        self.coefficients = targets
            .iter()
            .map(|&c| {
                let t = y.mapv(|v| if v.round() == c { 1.0 } else { 0.0 });
                self.fit_binary(&xs, &t)
            })
            .collect();
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.decision(x)?;
        if self.classes.len() == 2 {
            return Ok(probs
                .column(0)
                .mapv(|p| if p >= 0.5 { self.classes[1] } else { self.classes[0] }));
        }
        Ok(probs
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(k, _)| k)
                    .unwrap_or(0);
                self.classes[best]
            })
            .collect())
    }

    fn task_type(&self) -> TaskType {
        TaskType::Classification
    }

    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn clone_box(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 3)) % 11) as f64 + i as f64 * 0.1);
        let y = x.column(0).mapv(|v| 2.0 * v) + &x.column(1).mapv(|v| -0.5 * v) + 1.0;
        (x, y)
    }

    #[test]
    fn test_ridge_recovers_ols() {
        let (x, y) = linear_data();
        let mut model = RidgeRegression::new(0.0);
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((coef[1] + 0.5).abs() < 1e-6);
        assert!((model.intercept - 1.0).abs() < 1e-6);
        assert!(model.score(&x, &y).unwrap() > 0.999);
    }

    #[test]
    fn test_ridge_shrinks() {
        let (x, y) = linear_data();
        let mut weak = RidgeRegression::new(0.0);
        let mut strong = RidgeRegression::new(1000.0);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();
        let norm = |m: &RidgeRegression| m.coefficients.as_ref().unwrap().mapv(|v| v * v).sum();
        assert!(norm(&strong) < norm(&weak));
    }

    #[test]
    fn test_ridge_rejects_negative_alpha() {
        let (x, y) = linear_data();
        let mut model = RidgeRegression::new(-1.0);
        assert!(matches!(model.fit(&x, &y), Err(TuneError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = RidgeRegression::default();
        assert!(matches!(model.predict(&array![[1.0]]), Err(TuneError::ModelNotFitted)));
    }

    #[test]
    fn test_lasso_regression() {
        let (x, y) = linear_data();
        let mut model = LassoRegression::new(0.001);
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.99);
    }

    #[test]
    fn test_logistic_binary() {
        let x = array![[1.0, 2.0], [2.0, 3.0], [3.0, 4.0], [6.0, 7.0], [7.0, 8.0], [8.0, 9.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_logistic_multiclass() {
        let x = array![[0.0], [0.2], [0.4], [5.0], [5.2], [5.4], [10.0], [10.2], [10.4]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let mut model = LogisticRegression::new().with_alpha(0.0).with_max_iter(2000).with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(pred.iter().all(|p| [0.0, 1.0, 2.0].contains(p)));
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[8], 2.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut model = LassoRegression::default();
        let err = model.fit(&array![[1.0], [2.0]], &array![1.0]).unwrap_err();
        assert!(matches!(err, TuneError::ShapeError { .. }));
    }
}
