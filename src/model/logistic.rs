//! L2-regularized binary logistic regression.
//!
//! Minimizes
//!
//! ```text
//! C · Σᵢ logloss(yᵢ, xᵢ·w + b)  +  ½‖w‖²
//! ```
//!
//! with damped Newton steps (Armijo backtracking). The intercept is not
//! penalized. Scaling the data term by `C` rather than the penalty by `1/C`
//! keeps the usual reading of `C` as inverse regularization strength.
//!
//! Recognized hyperparameters:
//!
//! | name            | type            | default |
//! |-----------------|-----------------|---------|
//! | `C`             | positive number | `1.0`   |
//! | `max_iter`      | positive int    | `100`   |
//! | `tol`           | positive number | `1e-4`  |
//! | `fit_intercept` | bool            | `true`  |
//! | `penalty`       | `"l2"`/`"none"` | `"l2"`  |
//! | `random_state`  | int (ignored)   |         |
//!
//! Any other key is rejected with `FitError::UnknownParameter`.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde_json::Value;
use tracing::{debug, warn};

use super::handle::{FitDiagnostics, ModelHandle};
use crate::error::FitError;
use crate::sweep::{Fitter, HyperparameterConfig, TrainArgs};

/// Armijo sufficient-decrease constant.
const ARMIJO_C: f64 = 1e-4;

/// Maximum step halvings per Newton iteration.
const MAX_BACKTRACKS: usize = 40;

/// Ridge added to the Hessian when the weights are unpenalized.
const UNPENALIZED_RIDGE: f64 = 1e-8;

/// Smallest pivot accepted by the linear solver.
const PIVOT_EPS: f64 = 1e-14;

/// Regularization applied to the weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    L2,
    None,
}

/// Validated solver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticParams {
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
    pub penalty: Penalty,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
            fit_intercept: true,
            penalty: Penalty::L2,
        }
    }
}

impl LogisticParams {
    /// Reads solver settings from a hyperparameter map.
    pub fn from_config(config: &HyperparameterConfig) -> Result<Self, FitError> {
        let mut params = Self::default();
        for (name, value) in config.iter() {
            match name.as_str() {
                "C" => params.c = positive_number(name, value)?,
                "max_iter" => params.max_iter = positive_integer(name, value)?,
                "tol" => params.tol = positive_number(name, value)?,
                "fit_intercept" => {
                    params.fit_intercept = value.as_bool().ok_or_else(|| invalid(name, "expected a boolean"))?
                }
                "penalty" => {
                    params.penalty = match value {
                        Value::Null => Penalty::None,
                        Value::String(s) if s.eq_ignore_ascii_case("l2") => Penalty::L2,
                        Value::String(s) if s.eq_ignore_ascii_case("none") => Penalty::None,
                        _ => return Err(invalid(name, "expected \"l2\" or \"none\"")),
                    }
                }
                "random_state" => {
                    if !value.is_null() && value.as_i64().is_none() && value.as_u64().is_none() {
                        return Err(invalid(name, "expected an integer or null"));
                    }
                }
                other => return Err(FitError::UnknownParameter(other.to_string())),
            }
        }
        Ok(params)
    }
}

fn invalid(name: &str, reason: &str) -> FitError {
    FitError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn positive_number(name: &str, value: &Value) -> Result<f64, FitError> {
    let v = value
        .as_f64()
        .ok_or_else(|| invalid(name, &format!("expected a number, got {}", value)))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid(name, &format!("must be positive and finite, got {}", v)));
    }
    Ok(v)
}

fn positive_integer(name: &str, value: &Value) -> Result<usize, FitError> {
    let v = value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        })
        .ok_or_else(|| invalid(name, &format!("expected a positive integer, got {}", value)))?;
    if v == 0 {
        return Err(invalid(name, "must be at least 1"));
    }
    Ok(v as usize)
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + eᶻ)` without overflow.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// The default fitting routine: logistic regression on all feature columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegressionFitter;

impl Fitter for LogisticRegressionFitter {
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError> {
        let params = LogisticParams::from_config(args.hyperparameters())?;
        let data = args.data();
        let (x, labels) = data.split_xy();

        let classes = data.classes();
        let classes: [i64; 2] = match classes.as_slice() {
            [neg, pos] => [*neg, *pos],
            other => return Err(FitError::DegenerateTarget(format!("{:?}", other))),
        };
        let y = labels.mapv(|label| if label == classes[1] { 1.0 } else { 0.0 });

        let solution = solve(x, &y, &params)?;
        if !solution.converged {
            warn!(
                index = args.index(),
                max_iter = params.max_iter,
                "Logistic regression did not converge; consider raising max_iter"
            );
        }

        let scores = x.dot(&solution.weights) + solution.intercept;
        let correct = scores
            .iter()
            .zip(y.iter())
            .filter(|(&z, &yi)| (z > 0.0) == (yi == 1.0))
            .count();
        let accuracy = correct as f64 / data.n_rows() as f64;

        debug!(
            index = args.index(),
            n_iter = solution.n_iter,
            converged = solution.converged,
            accuracy = accuracy,
            "Fitted logistic regression"
        );
        Ok(ModelHandle::new(
            args.hyperparameters().clone(),
            classes,
            data.feature_names().to_vec(),
            solution.weights,
            solution.intercept,
            FitDiagnostics {
                n_iter: solution.n_iter,
                converged: solution.converged,
                training_accuracy: accuracy,
            },
        ))
    }
}

/// Output of the Newton solver.
#[derive(Debug, Clone)]
pub struct Solution {
    pub weights: Array1<f64>,
    pub intercept: f64,
    pub n_iter: usize,
    pub converged: bool,
}

/// Runs the damped Newton solver on a feature matrix and 0/1 targets.
pub fn solve(
    x: ArrayView2<'_, f64>,
    y: &Array1<f64>,
    params: &LogisticParams,
) -> Result<Solution, FitError> {
    let (n, p) = x.dim();
    // Augmented design: trailing column of ones for the intercept.
    let dim = if params.fit_intercept { p + 1 } else { p };
    let mut design = Array2::<f64>::ones((n, dim));
    design.slice_mut(ndarray::s![.., ..p]).assign(&x);

    let penalized = params.penalty == Penalty::L2;
    let objective = |theta: &Array1<f64>| -> f64 {
        let z = design.dot(theta);
        let data_term: f64 = z
            .iter()
            .zip(y.iter())
            .map(|(&zi, &yi)| softplus(zi) - yi * zi)
            .sum();
        let penalty = if penalized {
            0.5 * theta.slice(ndarray::s![..p]).dot(&theta.slice(ndarray::s![..p]))
        } else {
            0.0
        };
        params.c * data_term + penalty
    };

    let mut theta = Array1::<f64>::zeros(dim);
    let mut current = objective(&theta);
    let mut converged = false;
    let mut n_iter = 0;

    for iteration in 0..params.max_iter {
        let probs = design.dot(&theta).mapv(sigmoid);
        let residual = &probs - y;

        let mut gradient = design.t().dot(&residual) * params.c;
        if penalized {
            for j in 0..p {
                gradient[j] += theta[j];
            }
        }

        if gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs())) <= params.tol {
            converged = true;
            break;
        }
        n_iter = iteration + 1;

        let weights = probs.mapv(|pi| pi * (1.0 - pi) * params.c);
        let weighted = &design * &weights.insert_axis(Axis(1));
        let mut hessian = design.t().dot(&weighted);
        for j in 0..p {
            hessian[[j, j]] += if penalized { 1.0 } else { UNPENALIZED_RIDGE };
        }
        if dim > p {
            hessian[[p, p]] += UNPENALIZED_RIDGE;
        }

        let direction = solve_linear(hessian, gradient.clone())
            .ok_or(FitError::SingularSystem { iteration: n_iter })?;

        // Armijo backtracking along -direction.
        let slope = -gradient.dot(&direction);
        let mut step = 1.0;
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = &theta - &(&direction * step);
            let value = objective(&candidate);
            if value.is_finite() && value <= current + ARMIJO_C * step * slope {
                theta = candidate;
                current = value;
                accepted = true;
                break;
            }
            step *= 0.5;
        }
        if !accepted {
            // No descent possible along the Newton direction; treat as stalled.
            break;
        }
    }

    if !converged {
        // The loop may exit right after a final accepted step.
        let residual = &design.dot(&theta).mapv(sigmoid) - y;
        let mut gradient = design.t().dot(&residual) * params.c;
        if penalized {
            for j in 0..p {
                gradient[j] += theta[j];
            }
        }
        converged = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs())) <= params.tol;
    }

    let intercept = if params.fit_intercept { theta[p] } else { 0.0 };
    let weights = theta.slice(ndarray::s![..p]).to_owned();
    Ok(Solution {
        weights,
        intercept,
        n_iter,
        converged,
    })
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot falls below `PIVOT_EPS` relative to the
/// largest diagonal entry.
fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a
        .diag()
        .iter()
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| {
            a[[i, col]]
                .abs()
                .partial_cmp(&a[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[[pivot_row, col]].abs() < PIVOT_EPS * scale {
            return None;
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
            }
            b.swap(col, pivot_row);
        }

        let pivot = a[[col, col]];
        for row in (col + 1)..n {
            let factor = a[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[[row, k]] * x[k];
        }
        x[row] = sum / a[[row, row]];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, LabelBinarizer, SyntheticWineLoader};
    use ndarray::array;
    use serde_json::json;
    use std::sync::Arc;

    fn args(config: HyperparameterConfig, data: Dataset) -> TrainArgs {
        TrainArgs::new(0, config, Arc::new(data))
    }

    fn wine_binary() -> Dataset {
        let raw = SyntheticWineLoader::new(42).generate().unwrap();
        LabelBinarizer::default().apply(&raw).unwrap()
    }

    #[test]
    fn test_params_defaults_and_overrides() {
        let params = LogisticParams::from_config(&HyperparameterConfig::new()).unwrap();
        assert_eq!(params, LogisticParams::default());

        let config = HyperparameterConfig::new()
            .with("C", 0.01)
            .with("max_iter", 1000)
            .with("tol", 1e-6)
            .with("fit_intercept", false)
            .with("penalty", "none")
            .with("random_state", 0);
        let params = LogisticParams::from_config(&config).unwrap();
        assert_eq!(params.c, 0.01);
        assert_eq!(params.max_iter, 1000);
        assert!(!params.fit_intercept);
        assert_eq!(params.penalty, Penalty::None);
    }

    #[test]
    fn test_params_rejects_bad_values() {
        let bad = [
            ("C", json!(-1.0)),
            ("C", json!("big")),
            ("C", json!(0)),
            ("max_iter", json!(0)),
            ("max_iter", json!(2.5)),
            ("tol", json!(-0.1)),
            ("fit_intercept", json!("yes")),
            ("penalty", json!("l1")),
            ("random_state", json!("seed")),
        ];
        for (name, value) in bad {
            let config = HyperparameterConfig::new().with(name, value.clone());
            let err = LogisticParams::from_config(&config).unwrap_err();
            assert!(
                matches!(err, FitError::InvalidParameter { .. }),
                "{name}={value} gave {err:?}"
            );
        }

        let err = LogisticParams::from_config(&HyperparameterConfig::new().with("alpha", 1.0))
            .unwrap_err();
        assert_eq!(err, FitError::UnknownParameter("alpha".to_string()));
    }

    #[test]
    fn test_sigmoid_and_softplus_are_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0 && sigmoid(800.0) > 0.999);
        assert!(sigmoid(-800.0) >= 0.0 && sigmoid(-800.0) < 1e-300);
        assert!((softplus(0.0) - 2f64.ln()).abs() < 1e-12);
        assert!((softplus(800.0) - 800.0).abs() < 1e-9);
        assert!(softplus(-800.0).abs() < 1e-300);
    }

    #[test]
    fn test_solve_linear() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve_linear(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);

        assert!(solve_linear(array![[1.0, 2.0], [2.0, 4.0]], array![1.0, 2.0]).is_none());
    }

    #[test]
    fn test_fit_separates_simple_data() {
        let data = Dataset::new(
            vec!["x".to_string()],
            array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]],
            "target",
            vec![0, 0, 0, 1, 1, 1],
        )
        .unwrap();
        let model = LogisticRegressionFitter
            .fit(&args(HyperparameterConfig::new(), data.clone()))
            .unwrap();

        assert!(model.diagnostics().converged);
        assert!(model.coefficients()[0] > 0.0);
        assert_eq!(model.score(&data), 1.0);
        assert_eq!(model.classes(), [0, 1]);
    }

    #[test]
    fn test_stronger_regularization_shrinks_weights() {
        let data = wine_binary();
        let norm = |c: f64| {
            let config = HyperparameterConfig::new().with("C", c).with("max_iter", 1000);
            let model = LogisticRegressionFitter.fit(&args(config, data.clone())).unwrap();
            model.coefficients().dot(model.coefficients()).sqrt()
        };

        let loose = norm(0.1);
        let tight = norm(0.001);
        assert!(tight < loose, "expected {tight} < {loose}");
    }

    #[test]
    fn test_fit_on_wine_is_accurate_and_deterministic() {
        let data = wine_binary();
        let config = HyperparameterConfig::new().with("max_iter", 1000);

        let a = LogisticRegressionFitter
            .fit(&args(config.clone(), data.clone()))
            .unwrap();
        let b = LogisticRegressionFitter.fit(&args(config, data)).unwrap();

        assert!(a.diagnostics().training_accuracy > 0.9);
        assert!(a.same_parameters(&b));
    }

    #[test]
    fn test_fit_rejects_multiclass_target() {
        let raw = SyntheticWineLoader::new(1).generate().unwrap();
        let err = LogisticRegressionFitter
            .fit(&args(HyperparameterConfig::new(), raw))
            .unwrap_err();
        assert!(matches!(err, FitError::DegenerateTarget(_)));
    }

    #[test]
    fn test_max_iter_cap_reports_non_convergence() {
        let data = wine_binary();
        let config = HyperparameterConfig::new()
            .with("max_iter", 1)
            .with("tol", 1e-12);
        let model = LogisticRegressionFitter.fit(&args(config, data)).unwrap();

        assert_eq!(model.diagnostics().n_iter, 1);
        assert!(!model.diagnostics().converged);
    }
}
