//! The fitting seam between the trainer and the model code.

use std::sync::Arc;

use crate::error::FitError;
use crate::model::ModelHandle;

use super::args::TrainArgs;

/// Fits one model from one set of training arguments.
///
/// Implementations are called from blocking worker threads and must be
/// shareable across them. The trainer, the retry wrapper and the cache
/// wrapper all speak this trait, so wrappers compose freely.
pub trait Fitter: Send + Sync {
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError>;
}

impl<T: Fitter + ?Sized> Fitter for Arc<T> {
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError> {
        (**self).fit(args)
    }
}

impl<T: Fitter + ?Sized> Fitter for Box<T> {
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError> {
        (**self).fit(args)
    }
}

/// Adapts a closure into a `Fitter`.
///
/// ```ignore
/// let fitter = FnFitter::new(|args: &TrainArgs| LogisticRegressionFitter.fit(args));
/// ```
pub struct FnFitter<F>(F);

impl<F> FnFitter<F>
where
    F: Fn(&TrainArgs) -> Result<ModelHandle, FitError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Fitter for FnFitter<F>
where
    F: Fn(&TrainArgs) -> Result<ModelHandle, FitError> + Send + Sync,
{
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError> {
        (self.0)(args)
    }
}

/// Runs a fit, converting a panic into `FitError::Panicked`.
pub fn fit_catching_panics<F: Fitter + ?Sized>(
    fitter: &F,
    args: &TrainArgs,
) -> Result<ModelHandle, FitError> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fitter.fit(args)))
        .unwrap_or_else(|payload| Err(FitError::Panicked(panic_message(payload.as_ref()))))
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
