//! Model types and the default fitting routine.

pub mod handle;
pub mod logistic;

pub use handle::{FitDiagnostics, ModelHandle, ModelSummary};
pub use logistic::{sigmoid, LogisticParams, LogisticRegressionFitter, Penalty};
