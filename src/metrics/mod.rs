//! Prometheus metrics for sweep runs.
//!
//! ```ignore
//! use sweep_forge::metrics::{init_metrics, export_metrics};
//!
//! init_metrics()?;
//! // ... run a sweep ...
//! print!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{FitStatus, MetricsCollector};
pub use self::prometheus::{export_metrics, init_metrics};

pub use self::prometheus::{CACHE_LOOKUPS_TOTAL, FITS_IN_PROGRESS, FITS_TOTAL, FIT_DURATION, REGISTRY};
