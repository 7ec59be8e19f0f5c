//! Error types for sweep-forge operations.
//!
//! Defines the error types shared across subsystems:
//! - Dataset loading, schema checks and label binarization
//! - Fitting a single model from one grid entry
//! - The aggregated failure report produced after a sweep drains
//!
//! Pipeline-level errors (`SweepError`) and trainer errors (`TrainerError`)
//! live next to the components that raise them.

use serde::Serialize;
use thiserror::Error;

use crate::sweep::HyperparameterConfig;

/// Errors that can occur while loading or transforming a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Malformed dataset at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Dataset is empty")]
    Empty,

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Non-finite value in column '{column}' at row {row}")]
    NonFinite { column: String, row: usize },

    #[error("Label column '{0}' not found")]
    MissingLabelColumn(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Binarized labels must contain exactly two classes, found {found:?}")]
    DegenerateLabels { found: Vec<i64> },
}

/// Errors raised by a single fitting operation.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum FitError {
    #[error("Unknown hyperparameter '{0}'")]
    UnknownParameter(String),

    #[error("Invalid value for hyperparameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Target must contain exactly two classes, found {0}")]
    DegenerateTarget(String),

    #[error("Newton system became singular at iteration {iteration}")]
    SingularSystem { iteration: usize },

    #[error("Transient fit failure: {0}")]
    Transient(String),

    #[error("Fit panicked: {0}")]
    Panicked(String),
}

impl FitError {
    /// Returns whether re-running the same fit could succeed.
    ///
    /// Invalid hyperparameters and degenerate data fail identically on every
    /// attempt; only transient and panicking fits are worth another try.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FitError::Transient(_) | FitError::Panicked(_))
    }
}

/// One failed grid entry.
#[derive(Debug, Clone, Serialize)]
pub struct FitFailure {
    /// Index of the entry in the submitted grid.
    pub index: usize,
    /// Hyperparameters the failed fit was attempted with.
    pub hyperparameters: HyperparameterConfig,
    /// Cause of the failure.
    pub error: FitError,
}

/// Structured report of every failed fit in a sweep.
///
/// Failures are sorted by grid index regardless of the order in which they
/// settled.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Number of grid entries submitted.
    pub total: usize,
    /// Number of entries that produced a model.
    pub succeeded: usize,
    /// Every failed entry.
    pub failures: Vec<FitFailure>,
}

impl FailureReport {
    /// Builds a report, ordering failures by index.
    pub fn new(total: usize, mut failures: Vec<FitFailure>) -> Self {
        failures.sort_by_key(|f| f.index);
        Self {
            total,
            succeeded: total.saturating_sub(failures.len()),
            failures,
        }
    }

    /// Indices of the failed entries, ascending.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    /// The lowest-index failure.
    pub fn first(&self) -> Option<&FitFailure> {
        self.failures.first()
    }
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} fits failed", self.failures.len(), self.total)?;
        for failure in &self.failures {
            write!(f, "; [{}] {}", failure.index, failure.error)?;
        }
        Ok(())
    }
}
