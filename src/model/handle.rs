//! Trained model handles.

use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView2};
use serde::Serialize;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::sweep::HyperparameterConfig;

/// Solver diagnostics recorded alongside a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitDiagnostics {
    /// Newton iterations performed.
    pub n_iter: usize,
    /// Whether the gradient tolerance was reached within `max_iter`.
    pub converged: bool,
    /// Accuracy on the training data.
    pub training_accuracy: f64,
}

/// A fitted binary linear classifier.
///
/// Handles are immutable once returned. The decision function is
/// `x · coefficients + intercept`; positive scores predict `classes[1]`.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    id: Uuid,
    hyperparameters: HyperparameterConfig,
    classes: [i64; 2],
    feature_names: Vec<String>,
    coefficients: Array1<f64>,
    intercept: f64,
    diagnostics: FitDiagnostics,
    fitted_at: DateTime<Utc>,
}

impl ModelHandle {
    pub fn new(
        hyperparameters: HyperparameterConfig,
        classes: [i64; 2],
        feature_names: Vec<String>,
        coefficients: Array1<f64>,
        intercept: f64,
        diagnostics: FitDiagnostics,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hyperparameters,
            classes,
            feature_names,
            coefficients,
            intercept,
            diagnostics,
            fitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn hyperparameters(&self) -> &HyperparameterConfig {
        &self.hyperparameters
    }

    /// `[negative, positive]` class labels.
    pub fn classes(&self) -> [i64; 2] {
        self.classes
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn diagnostics(&self) -> FitDiagnostics {
        self.diagnostics
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    /// Returns whether two handles carry the same fitted parameters.
    pub fn same_parameters(&self, other: &ModelHandle) -> bool {
        self.classes == other.classes
            && self.feature_names == other.feature_names
            && self.coefficients == other.coefficients
            && self.intercept == other.intercept
    }

    /// Raw linear scores for each row.
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    /// Probability of the positive class for each row.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        self.decision_function(x).mapv(super::logistic::sigmoid)
    }

    /// Predicted class label for each row.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<i64> {
        self.decision_function(x)
            .iter()
            .map(|&z| if z > 0.0 { self.classes[1] } else { self.classes[0] })
            .collect()
    }

    /// Fraction of rows whose label is predicted correctly.
    pub fn score(&self, dataset: &Dataset) -> f64 {
        let predicted = self.predict(dataset.features());
        let correct = predicted
            .iter()
            .zip(dataset.labels())
            .filter(|(p, y)| p == y)
            .count();
        correct as f64 / dataset.n_rows() as f64
    }

    /// Serializable summary of the handle.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id,
            hyperparameters: self.hyperparameters.clone(),
            classes: self.classes,
            coefficients: self
                .feature_names
                .iter()
                .cloned()
                .zip(self.coefficients.iter().copied())
                .collect(),
            intercept: self.intercept,
            n_iter: self.diagnostics.n_iter,
            converged: self.diagnostics.converged,
            training_accuracy: self.diagnostics.training_accuracy,
            fitted_at: self.fitted_at,
        }
    }
}

/// Flat, serializable view of a model handle for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub id: Uuid,
    pub hyperparameters: HyperparameterConfig,
    pub classes: [i64; 2],
    pub coefficients: Vec<(String, f64)>,
    pub intercept: f64,
    pub n_iter: usize,
    pub converged: bool,
    pub training_accuracy: f64,
    pub fitted_at: DateTime<Utc>,
}
