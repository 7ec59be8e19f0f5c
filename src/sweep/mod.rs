//! Hyperparameter sweep machinery.
//!
//! - [`hyperparams`]: grid entries and grid expansion
//! - [`args`]: pairing grid entries with the shared dataset
//! - [`fitter`]: the `Fitter` seam
//! - [`trainer`]: bounded parallel execution of fits
//! - [`retry`] and [`cache`]: `Fitter` wrappers

pub mod args;
pub mod cache;
pub mod fitter;
pub mod hyperparams;
pub mod retry;
pub mod trainer;

pub use args::{build_train_args, TrainArgs};
pub use cache::{cache_key, CacheStats, CachingFitter, ContentHash, ModelCache};
pub use fitter::{fit_catching_panics, Fitter, FnFitter};
pub use hyperparams::{grid_product, parse_axis, HyperparameterConfig};
pub use retry::{RetryingFitter, DEFAULT_RETRIES};
pub use trainer::{BoundedTrainer, TrainerError, TrainerStats};
