//! The sweep pipeline: load, binarize, build arguments, train.
//!
//! ```rust,ignore
//! use sweep_forge::pipeline::{SweepConfig, SweepPipeline};
//! use sweep_forge::sweep::HyperparameterConfig;
//!
//! let pipeline = SweepPipeline::from_config(&SweepConfig::default());
//! let grid = vec![
//!     HyperparameterConfig::new().with("C", 0.1),
//!     HyperparameterConfig::new().with("C", 0.01),
//! ];
//! let models = pipeline.run(&grid, 5).await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConfigError, SweepConfig};
use crate::dataset::{CsvLoader, DataLoader, DatasetSchema, LabelBinarizer, SyntheticWineLoader};
use crate::error::{DatasetError, FailureReport};
use crate::model::{LogisticRegressionFitter, ModelHandle};
use crate::sweep::{
    build_train_args, BoundedTrainer, CachingFitter, ContentHash, Fitter, HyperparameterConfig,
    ModelCache, RetryingFitter, TrainerError, TrainerStats,
};

/// Errors that can occur while running a sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The data source could not be read. Nothing was trained.
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    /// The grid or the concurrency limit is unusable. Nothing was loaded.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// One or more fits failed after every fit settled.
    #[error("{0}")]
    FitFailures(FailureReport),

    /// The data was loaded but is malformed or degenerate.
    #[error("Dataset error: {0}")]
    Dataset(DatasetError),

    /// Configuration could not be read.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SweepError {
    /// The failure report, if individual fits failed.
    pub fn failure_report(&self) -> Option<&FailureReport> {
        match self {
            SweepError::FitFailures(report) => Some(report),
            _ => None,
        }
    }
}

impl From<DatasetError> for SweepError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::SourceUnavailable(msg) => SweepError::SourceUnavailable(msg),
            other => SweepError::Dataset(other),
        }
    }
}

impl From<TrainerError> for SweepError {
    fn from(err: TrainerError) -> Self {
        match err {
            TrainerError::InvalidConcurrency(k) => SweepError::InvalidConfiguration(format!(
                "concurrency must be at least 1, got {}",
                k
            )),
            TrainerError::EmptyBatch => {
                SweepError::InvalidConfiguration("grid is empty".to_string())
            }
            TrainerError::FitFailures(report) => SweepError::FitFailures(report),
        }
    }
}

/// A completed sweep with its bookkeeping.
#[derive(Debug, Clone)]
pub struct SweepRun {
    /// One model per grid entry, in grid order.
    pub models: Vec<ModelHandle>,
    /// Trainer statistics for this run.
    pub stats: TrainerStats,
    /// Fingerprint of the processed dataset the models were fitted on.
    pub dataset_fingerprint: ContentHash,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
}

/// Linear composition of loader, binarizer, argument builder and trainer.
///
/// The pipeline holds no per-run state; the only thing shared across runs is
/// the optional model cache.
pub struct SweepPipeline {
    loader: Arc<dyn DataLoader>,
    schema: Option<DatasetSchema>,
    binarizer: LabelBinarizer,
    fitter: Arc<dyn Fitter>,
    cache: Option<Arc<ModelCache>>,
}

impl SweepPipeline {
    /// Creates a pipeline with the default binarizer and no schema check.
    pub fn new<L, F>(loader: L, fitter: F) -> Self
    where
        L: DataLoader + 'static,
        F: Fitter + 'static,
    {
        Self {
            loader: Arc::new(loader),
            schema: None,
            binarizer: LabelBinarizer::default(),
            fitter: Arc::new(fitter),
            cache: None,
        }
    }

    /// Builds the standard pipeline from configuration.
    ///
    /// The fitter stack is logistic regression, wrapped in a retry layer when
    /// `retries > 0`, wrapped in a cache layer when caching is enabled. The
    /// cache sits outermost so hits never pay for retries.
    pub fn from_config(config: &SweepConfig) -> Self {
        let loader: Arc<dyn DataLoader> = match &config.data_path {
            Some(path) => {
                Arc::new(CsvLoader::new(path.clone()).with_label_column(config.label_column.clone()))
            }
            None => Arc::new(
                SyntheticWineLoader::new(config.seed).with_rows(config.synthetic_rows),
            ),
        };

        let base: Arc<dyn Fitter> = if config.retries > 0 {
            Arc::new(RetryingFitter::new(LogisticRegressionFitter, config.retries))
        } else {
            Arc::new(LogisticRegressionFitter)
        };

        let (fitter, cache) = if config.cache_enabled {
            let cache = Arc::new(ModelCache::new(config.cache_max_entries));
            let fitter: Arc<dyn Fitter> = Arc::new(CachingFitter::new(
                base,
                Arc::clone(&cache),
                config.cache_version.clone(),
            ));
            (fitter, Some(cache))
        } else {
            (base, None)
        };

        Self {
            loader,
            schema: config.dataset_schema(),
            binarizer: LabelBinarizer::new(config.reference_class, config.positive_class),
            fitter,
            cache,
        }
    }

    /// Builder method to validate and reorder loaded data against a schema.
    pub fn with_schema(mut self, schema: DatasetSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Builder method to set the label binarizer.
    pub fn with_binarizer(mut self, binarizer: LabelBinarizer) -> Self {
        self.binarizer = binarizer;
        self
    }

    /// Builder method to replace the loader.
    pub fn with_loader<L: DataLoader + 'static>(mut self, loader: L) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// The model cache, when caching is enabled.
    pub fn cache(&self) -> Option<&Arc<ModelCache>> {
        self.cache.as_ref()
    }

    pub fn loader(&self) -> &dyn DataLoader {
        self.loader.as_ref()
    }

    /// Runs the sweep and returns one model per grid entry, in grid order.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` when `concurrency <= 0` or the grid is empty,
    ///   before anything is loaded.
    /// - `SourceUnavailable` when the loader cannot reach its source.
    /// - `Dataset` when the data is malformed or cannot be binarized.
    /// - `FitFailures` naming every failed grid index, after all fits settle.
    pub async fn run(
        &self,
        grid: &[HyperparameterConfig],
        concurrency: i64,
    ) -> Result<Vec<ModelHandle>, SweepError> {
        self.run_detailed(grid, concurrency).await.map(|run| run.models)
    }

    /// Like [`run`](Self::run), also returning statistics.
    pub async fn run_detailed(
        &self,
        grid: &[HyperparameterConfig],
        concurrency: i64,
    ) -> Result<SweepRun, SweepError> {
        let concurrency = validate_request(grid, concurrency)?;
        let start = Instant::now();

        info!(
            source = %self.loader.describe(),
            grid_size = grid.len(),
            concurrency = concurrency,
            "Starting sweep"
        );

        let mut dataset = self.loader.load().await?;
        if let Some(schema) = &self.schema {
            dataset = schema.conform(&dataset)?;
        }
        let dataset = self.binarizer.apply(&dataset)?;
        let fingerprint = dataset.fingerprint().clone();
        debug!(
            rows = dataset.n_rows(),
            features = dataset.n_features(),
            fingerprint = %fingerprint,
            "Prepared dataset"
        );

        let batch = build_train_args(grid, Arc::new(dataset));
        let trainer = BoundedTrainer::with_shared(Arc::clone(&self.fitter), concurrency)?;
        let models = trainer.train(batch).await?;

        let elapsed = start.elapsed();
        info!(
            models = models.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Sweep complete"
        );

        Ok(SweepRun {
            models,
            stats: trainer.stats(),
            dataset_fingerprint: fingerprint,
            elapsed,
        })
    }
}

/// Checks the grid and concurrency limit before any work starts.
fn validate_request(grid: &[HyperparameterConfig], concurrency: i64) -> Result<usize, SweepError> {
    if concurrency <= 0 {
        return Err(SweepError::InvalidConfiguration(format!(
            "concurrency must be at least 1, got {}",
            concurrency
        )));
    }
    if grid.is_empty() {
        return Err(SweepError::InvalidConfiguration("grid is empty".to_string()));
    }
    usize::try_from(concurrency).map_err(|_| {
        SweepError::InvalidConfiguration(format!("concurrency {} is too large", concurrency))
    })
}

/// Runs a sweep with the default configuration: synthetic wine data, class 0
/// against the rest, retries and caching enabled.
pub async fn run_sweep(
    grid: &[HyperparameterConfig],
    concurrency: i64,
) -> Result<Vec<ModelHandle>, SweepError> {
    SweepPipeline::from_config(&SweepConfig::default())
        .run(grid, concurrency)
        .await
}
