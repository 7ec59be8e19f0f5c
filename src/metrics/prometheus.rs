//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by sweep_forge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, Gauge, Histogram, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all sweep_forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total number of fits settled, labeled by status.
pub static FITS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wall-clock duration of a single fit in seconds.
pub static FIT_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Number of fits currently executing.
pub static FITS_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Model cache lookups, labeled by result (hit/miss).
pub static CACHE_LOOKUPS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Safe to call more than once; later calls leave the first registry in
/// place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let fits_total = CounterVec::new(
        Opts::new("sweep_forge_fits_total", "Total number of fits settled"),
        &["status"],
    )?;

    let fit_duration = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "sweep_forge_fit_duration_seconds",
            "Fit duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
    )?;

    let fits_in_progress = Gauge::new(
        "sweep_forge_fits_in_progress",
        "Number of fits currently executing",
    )?;

    let cache_lookups_total = CounterVec::new(
        Opts::new("sweep_forge_cache_lookups_total", "Model cache lookups"),
        &["result"],
    )?;

    registry.register(Box::new(fits_total.clone()))?;
    registry.register(Box::new(fit_duration.clone()))?;
    registry.register(Box::new(fits_in_progress.clone()))?;
    registry.register(Box::new(cache_lookups_total.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = FITS_TOTAL.set(fits_total);
    let _ = FIT_DURATION.set(fit_duration);
    let _ = FITS_IN_PROGRESS.set(fits_in_progress);
    let _ = CACHE_LOOKUPS_TOTAL.set(cache_lookups_total);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead of metrics if the registry has not been
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
