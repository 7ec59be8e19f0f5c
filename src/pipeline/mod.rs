//! The sweep pipeline and its configuration.
//!
//! # Pipeline Flow
//!
//! 1. **Validation**: the grid must be non-empty and the concurrency limit
//!    positive; nothing is loaded otherwise
//! 2. **Load**: the configured `DataLoader` produces a `Dataset`
//! 3. **Schema** (optional): columns are checked and put in schema order
//! 4. **Binarize**: the label column is collapsed to two classes
//! 5. **Fan out**: every grid entry is paired with the shared dataset
//! 6. **Train**: a `BoundedTrainer` fits all entries, at most K at a time
//!
//! # Configuration
//!
//! ```rust,ignore
//! // Via builder pattern
//! let config = SweepConfig::new()
//!     .with_concurrency(8)
//!     .with_retries(0)
//!     .with_cache(false);
//!
//! // Via environment variables
//! let config = SweepConfig::from_env()?;
//! ```

pub mod config;
pub mod driver;

pub use config::{
    load_grid_file, parse_grid, resolve_grid, ConfigError, SweepConfig, DEFAULT_CONCURRENCY,
};
pub use driver::{run_sweep, SweepError, SweepPipeline, SweepRun};
