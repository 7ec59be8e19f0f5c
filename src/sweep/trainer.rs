//! Bounded parallel trainer.
//!
//! Runs one fit per `TrainArgs` with at most K fits in flight. A fixed set of
//! `min(K, N)` worker tasks pull from a shared queue; each fit runs on the
//! blocking thread pool, since fitting is CPU-bound and never yields.
//!
//! # Guarantees
//!
//! - At most K fits execute at any instant.
//! - `result[i]` is the model fitted from the i-th submitted argument,
//!   regardless of completion order.
//! - A failing or panicking fit does not stop its siblings. The call
//!   returns only after every item has settled, and reports every failure
//!   at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::args::TrainArgs;
use super::fitter::{panic_message, Fitter};
use super::hyperparams::HyperparameterConfig;
use crate::error::{FailureReport, FitError, FitFailure};
use crate::metrics::{FitStatus, MetricsCollector};
use crate::model::ModelHandle;

/// Errors that can occur in the trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("Concurrency limit must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("No training arguments submitted")]
    EmptyBatch,

    #[error("{0}")]
    FitFailures(FailureReport),
}

/// Statistics about the trainer.
#[derive(Debug, Clone, Default)]
pub struct TrainerStats {
    /// Configured concurrency limit.
    pub concurrency: usize,
    /// Fits that produced a model.
    pub completed: u64,
    /// Fits that failed or panicked.
    pub failed: u64,
    /// Highest number of fits observed executing at once.
    pub peak_in_flight: usize,
    /// Mean wall-clock time per fit.
    pub average_fit_duration: Duration,
}

impl TrainerStats {
    pub fn total_processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.completed as f64 / total as f64) * 100.0
    }
}

/// Shared state for tracking trainer statistics.
struct SharedTrainerStats {
    completed: AtomicU64,
    failed: AtomicU64,
    total_duration_us: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl SharedTrainerStats {
    fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn record(&self, success: bool, duration: Duration) {
        if success {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.total_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    fn to_trainer_stats(&self, concurrency: usize) -> TrainerStats {
        let completed = self.completed.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let total_us = self.total_duration_us.load(Ordering::SeqCst);

        let total = completed + failed;
        let average_fit_duration = if total > 0 {
            Duration::from_micros(total_us / total)
        } else {
            Duration::ZERO
        };

        TrainerStats {
            concurrency,
            completed,
            failed,
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            average_fit_duration,
        }
    }
}

type Settled = (usize, Result<ModelHandle, FitError>);

/// Trainer that fits a batch of arguments with bounded concurrency.
///
/// Statistics accumulate over every batch the trainer runs.
pub struct BoundedTrainer {
    fitter: Arc<dyn Fitter>,
    concurrency: usize,
    stats: Arc<SharedTrainerStats>,
}

impl BoundedTrainer {
    /// Creates a trainer around `fitter` with at most `concurrency` fits in
    /// flight.
    ///
    /// # Errors
    ///
    /// Returns `TrainerError::InvalidConcurrency` if `concurrency` is zero.
    pub fn new<F: Fitter + 'static>(fitter: F, concurrency: usize) -> Result<Self, TrainerError> {
        Self::with_shared(Arc::new(fitter), concurrency)
    }

    /// Creates a trainer around an already shared fitter.
    pub fn with_shared(fitter: Arc<dyn Fitter>, concurrency: usize) -> Result<Self, TrainerError> {
        if concurrency == 0 {
            return Err(TrainerError::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            fitter,
            concurrency,
            stats: Arc::new(SharedTrainerStats::new()),
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns current trainer statistics.
    pub fn stats(&self) -> TrainerStats {
        self.stats.to_trainer_stats(self.concurrency)
    }

    /// Fits every argument and returns the models in submission order.
    ///
    /// # Errors
    ///
    /// - `TrainerError::EmptyBatch` if `batch` is empty.
    /// - `TrainerError::FitFailures` if any fit failed, after all fits have
    ///   settled. The report lists every failed position.
    pub async fn train(&self, batch: Vec<TrainArgs>) -> Result<Vec<ModelHandle>, TrainerError> {
        if batch.is_empty() {
            return Err(TrainerError::EmptyBatch);
        }

        let total = batch.len();
        let hyperparameters: Vec<HyperparameterConfig> =
            batch.iter().map(|a| a.hyperparameters().clone()).collect();
        let queue: VecDeque<(usize, TrainArgs)> = batch.into_iter().enumerate().collect();
        let queue = Arc::new(Mutex::new(queue));

        let (results_tx, mut results_rx) = mpsc::channel::<Settled>(total);
        let num_workers = self.concurrency.min(total);

        info!(
            total = total,
            workers = num_workers,
            concurrency = self.concurrency,
            "Starting training batch"
        );

        let mut handles = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let worker = Worker {
                id: format!("trainer-{}", i),
                queue: Arc::clone(&queue),
                fitter: Arc::clone(&self.fitter),
                results: results_tx.clone(),
                stats: Arc::clone(&self.stats),
                metrics: MetricsCollector::new(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        // Channel closes once every worker has dropped its sender.
        drop(results_tx);

        let mut slots: Vec<Option<ModelHandle>> = (0..total).map(|_| None).collect();
        let mut failures = Vec::new();
        while let Some((position, result)) = results_rx.recv().await {
            match result {
                Ok(model) => slots[position] = Some(model),
                Err(error) => failures.push(FitFailure {
                    index: position,
                    hyperparameters: hyperparameters[position].clone(),
                    error,
                }),
            }
        }

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Trainer worker task failed");
            }
        }

        // A position with neither a model nor a failure means its worker died
        // before reporting.
        let mut models = Vec::with_capacity(total);
        for (position, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(model) => models.push(model),
                None if failures.iter().any(|f| f.index == position) => {}
                None => failures.push(FitFailure {
                    index: position,
                    hyperparameters: hyperparameters[position].clone(),
                    error: FitError::Panicked("worker exited before reporting".to_string()),
                }),
            }
        }

        if !failures.is_empty() {
            let report = FailureReport::new(total, failures);
            warn!(
                failed = report.failures.len(),
                total = total,
                indices = ?report.failed_indices(),
                "Training batch finished with failures"
            );
            return Err(TrainerError::FitFailures(report));
        }

        info!(total = total, "Training batch complete");
        Ok(models)
    }
}

/// A single worker that pulls arguments from the shared queue.
struct Worker {
    id: String,
    queue: Arc<Mutex<VecDeque<(usize, TrainArgs)>>>,
    fitter: Arc<dyn Fitter>,
    results: mpsc::Sender<Settled>,
    stats: Arc<SharedTrainerStats>,
    metrics: MetricsCollector,
}

impl Worker {
    async fn run(self) {
        debug!(worker_id = %self.id, "Worker started");

        loop {
            let next = self.queue.lock().await.pop_front();
            let Some((position, args)) = next else {
                break;
            };

            let settled = self.fit_one(args).await;
            if self.results.send((position, settled)).await.is_err() {
                // Receiver gone; nobody is waiting for more results.
                break;
            }
        }

        debug!(worker_id = %self.id, "Worker stopped");
    }

    async fn fit_one(&self, args: TrainArgs) -> Result<ModelHandle, FitError> {
        let index = args.index();
        let fitter = Arc::clone(&self.fitter);

        self.stats.enter();
        self.metrics.inc_fits_in_progress();
        let start = Instant::now();

        let joined = tokio::task::spawn_blocking(move || fitter.fit(&args)).await;

        let duration = start.elapsed();
        self.metrics.dec_fits_in_progress();
        self.stats.exit();

        let (result, status) = match joined {
            Ok(Ok(model)) => (Ok(model), FitStatus::Success),
            // Wrappers may already have caught the panic.
            Ok(Err(e @ FitError::Panicked(_))) => (Err(e), FitStatus::Panicked),
            Ok(Err(e)) => (Err(e), FitStatus::Failure),
            Err(join_error) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic().as_ref());
                (Err(FitError::Panicked(message)), FitStatus::Panicked)
            }
            Err(join_error) => (
                Err(FitError::Panicked(join_error.to_string())),
                FitStatus::Panicked,
            ),
        };

        self.stats.record(result.is_ok(), duration);
        self.metrics.record_fit(status, duration.as_secs_f64());

        match &result {
            Ok(_) => debug!(
                worker_id = %self.id,
                index = index,
                duration_ms = duration.as_millis() as u64,
                "Fit completed"
            ),
            Err(e) => warn!(
                worker_id = %self.id,
                index = index,
                error = %e,
                "Fit failed"
            ),
        }

        result
    }
}
