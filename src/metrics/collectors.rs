//! High-level recording helpers over the raw Prometheus metrics.
//!
//! Every method is a no-op when `init_metrics()` has not been called, so the
//! library records unconditionally and only the binary decides whether
//! metrics exist.

use super::prometheus::{CACHE_LOOKUPS_TOTAL, FITS_IN_PROGRESS, FITS_TOTAL, FIT_DURATION};

/// Outcome label for a settled fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Success,
    Failure,
    Panicked,
}

impl FitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitStatus::Success => "success",
            FitStatus::Failure => "failure",
            FitStatus::Panicked => "panicked",
        }
    }
}

/// Metrics collector for recording sweep metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a settled fit and its duration.
    pub fn record_fit(&self, status: FitStatus, duration_secs: f64) {
        if let Some(fits_total) = FITS_TOTAL.get() {
            fits_total.with_label_values(&[status.as_str()]).inc();
        }

        if let Some(fit_duration) = FIT_DURATION.get() {
            fit_duration.observe(duration_secs);
        }

        tracing::trace!(
            status = status.as_str(),
            duration_secs = duration_secs,
            "Recorded fit metric"
        );
    }

    /// Record a model cache lookup.
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        if let Some(lookups) = CACHE_LOOKUPS_TOTAL.get() {
            lookups.with_label_values(&[result]).inc();
        }
    }

    pub fn inc_fits_in_progress(&self) {
        if let Some(gauge) = FITS_IN_PROGRESS.get() {
            gauge.inc();
        }
    }

    pub fn dec_fits_in_progress(&self) {
        if let Some(gauge) = FITS_IN_PROGRESS.get() {
            gauge.dec();
        }
    }
}
