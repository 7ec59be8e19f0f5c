//! Tabular datasets: loading, schema checks and label binarization.

pub mod binarize;
pub mod frame;
pub mod loader;
pub mod schema;

pub use binarize::LabelBinarizer;
pub use frame::{Dataset, DEFAULT_LABEL_COLUMN};
pub use loader::{
    normalize_column_name, CsvLoader, DataLoader, SyntheticWineLoader, DEFAULT_SEED,
    DEFAULT_SYNTHETIC_ROWS,
};
pub use schema::{DatasetSchema, WINE_FEATURES};
