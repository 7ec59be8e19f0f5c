//! sweep_forge: parallel hyperparameter sweeps for tabular classifiers.
//!
//! This library loads a labeled dataset, collapses its label column to a
//! binary target and fits one logistic regression per hyperparameter
//! configuration, with at most K fits in flight at once. Results come back
//! in grid order.

// Core modules
pub mod cli;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod sweep;

// Re-export commonly used types
pub use dataset::{DataLoader, Dataset, LabelBinarizer};
pub use error::{DatasetError, FailureReport, FitError, FitFailure};
pub use model::{LogisticRegressionFitter, ModelHandle};
pub use pipeline::{run_sweep, SweepConfig, SweepError, SweepPipeline, SweepRun};
pub use sweep::{BoundedTrainer, Fitter, HyperparameterConfig, TrainArgs};
