//! Retrying wrapper around a fitter.

use tracing::warn;

use super::args::TrainArgs;
use super::fitter::{fit_catching_panics, Fitter};
use crate::error::FitError;
use crate::model::ModelHandle;

/// Default number of extra attempts after the first failure.
pub const DEFAULT_RETRIES: u32 = 3;

/// Re-invokes the inner fitter when it fails with a retryable error.
///
/// A fit is attempted at most `retries + 1` times. Errors for which
/// [`FitError::is_retryable`] is false are returned immediately, since they
/// would repeat on every attempt. Panics in the inner fitter count as
/// retryable failures.
pub struct RetryingFitter<F> {
    inner: F,
    retries: u32,
}

impl<F: Fitter> RetryingFitter<F> {
    pub fn new(inner: F, retries: u32) -> Self {
        Self { inner, retries }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl<F: Fitter> Fitter for RetryingFitter<F> {
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError> {
        let mut attempt = 0;
        loop {
            match fit_catching_panics(&self.inner, args) {
                Ok(model) => return Ok(model),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        index = args.index(),
                        attempt = attempt,
                        retries = self.retries,
                        error = %e,
                        "Fit failed, retrying..."
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
