//! Dataset sources.
//!
//! A `DataLoader` takes no inputs and yields a labeled `Dataset`. Loading is
//! the first stage of every sweep; any failure here is fatal to the run.
//!
//! Two sources are provided:
//!
//! - `CsvLoader`: a header-first CSV file on disk
//! - `SyntheticWineLoader`: a seeded, wine-shaped generator for offline runs
//!   and reproducible tests

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use tracing::{debug, info};

use super::frame::{Dataset, DEFAULT_LABEL_COLUMN};
use super::schema::WINE_FEATURES;
use crate::error::DatasetError;

/// A source of labeled tabular data.
#[async_trait]
pub trait DataLoader: Send + Sync {
    /// Short human-readable description of the source.
    fn describe(&self) -> String;

    /// Loads the dataset.
    ///
    /// # Errors
    ///
    /// `DatasetError::SourceUnavailable` when the source cannot be reached;
    /// other variants when it can be read but its content is invalid.
    async fn load(&self) -> Result<Dataset, DatasetError>;
}

/// Normalizes a raw header cell into a column name.
///
/// Surrounding whitespace and quotes are stripped and `/` becomes `_`, so
/// `"od280/od315_of_diluted_wines"` reads as `od280_od315_of_diluted_wines`.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().replace('/', "_")
}

/// Loads a dataset from a CSV file with a header row.
///
/// Every column other than the label column is parsed as `f64`; the label
/// column is parsed as an integer (`2` and `2.0` are both accepted). Blank
/// lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    path: PathBuf,
    label_column: String,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
        }
    }

    /// Sets the name of the label column.
    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses CSV content into a dataset.
    pub fn parse(content: &str, label_column: &str) -> Result<Dataset, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let header = reader.headers().map_err(|e| malformed(&e, 1))?.clone();
        if header.is_empty() || (header.len() == 1 && header[0].is_empty()) {
            return Err(DatasetError::Empty);
        }
        let header_line = record_line(&header, 1);

        let columns: Vec<String> = header.iter().map(normalize_column_name).collect();
        let label_idx = columns
            .iter()
            .position(|c| c == label_column)
            .ok_or_else(|| DatasetError::MissingLabelColumn(label_column.to_string()))?;
        if columns.iter().any(|c| c.is_empty()) {
            return Err(DatasetError::Malformed {
                line: header_line,
                reason: "empty column name in header".to_string(),
            });
        }

        let feature_names: Vec<String> = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_idx)
            .map(|(_, c)| c.clone())
            .collect();

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| malformed(&e, header_line + rows.len() + 1))?;
            let line_no = record_line(&record, header_line + rows.len() + 1);

            let mut row = Vec::with_capacity(feature_names.len());
            for (i, cell) in record.iter().enumerate() {
                if i == label_idx {
                    labels.push(parse_label(cell).ok_or_else(|| DatasetError::Malformed {
                        line: line_no,
                        reason: format!("invalid label '{}'", cell),
                    })?);
                } else {
                    let value = cell.parse::<f64>().map_err(|_| DatasetError::Malformed {
                        line: line_no,
                        reason: format!("invalid number '{}' in column '{}'", cell, columns[i]),
                    })?;
                    row.push(value);
                }
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        Dataset::from_rows(feature_names, rows, label_column, labels)
    }
}

/// Line a record started on, as reported by the reader.
fn record_line(record: &csv::StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map_or(fallback, |pos| pos.line() as usize)
}

fn malformed(err: &csv::Error, fallback: usize) -> DatasetError {
    let line = err
        .position()
        .map_or(fallback, |pos| pos.line() as usize);
    let reason = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {} columns, got {}", expected_len, len),
        _ => err.to_string(),
    };
    DatasetError::Malformed { line, reason }
}

fn parse_label(cell: &str) -> Option<i64> {
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    let f = cell.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

#[async_trait]
impl DataLoader for CsvLoader {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    async fn load(&self) -> Result<Dataset, DatasetError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DatasetError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let dataset = Self::parse(&content, &self.label_column)?;
        info!(
            path = %self.path.display(),
            rows = dataset.n_rows(),
            features = dataset.n_features(),
            "Loaded CSV dataset"
        );
        Ok(dataset)
    }
}

/// Per-class feature means, in `WINE_FEATURES` order.
const WINE_CLASS_MEANS: [[f64; 13]; 3] = [
    [
        13.74, 2.01, 2.46, 17.04, 106.3, 2.84, 2.98, 0.29, 1.90, 5.53, 1.06, 3.16, 1115.7,
    ],
    [
        12.28, 1.93, 2.24, 20.24, 94.5, 2.26, 2.08, 0.36, 1.63, 3.09, 1.06, 2.79, 519.5,
    ],
    [
        13.15, 3.33, 2.44, 21.42, 99.3, 1.68, 0.78, 0.45, 1.15, 7.40, 0.68, 1.68, 629.9,
    ],
];

/// Per-feature spread shared by all classes.
const WINE_FEATURE_STD: [f64; 13] = [
    0.5, 1.0, 0.25, 3.0, 14.0, 0.5, 0.7, 0.1, 0.5, 1.5, 0.2, 0.5, 200.0,
];

/// Class proportions of the reference wine data (59 / 71 / 48 of 178).
const WINE_CLASS_WEIGHTS: [usize; 3] = [59, 71, 48];

/// Default row count, matching the reference wine data.
pub const DEFAULT_SYNTHETIC_ROWS: usize = 178;

/// Default generator seed.
pub const DEFAULT_SEED: u64 = 42;

/// Generates a wine-shaped dataset from a fixed seed.
///
/// Rows are drawn per class from independent normal distributions around
/// class-specific means and clamped at zero. Rows are grouped by class
/// (all class 0, then 1, then 2). The same seed and row count always yield
/// the same table.
#[derive(Debug, Clone)]
pub struct SyntheticWineLoader {
    seed: u64,
    rows: usize,
}

impl Default for SyntheticWineLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl SyntheticWineLoader {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rows: DEFAULT_SYNTHETIC_ROWS,
        }
    }

    /// Sets the number of rows to generate (at least 3).
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    /// Number of rows per class; every class gets at least one row.
    fn class_sizes(&self) -> [usize; 3] {
        let total: usize = WINE_CLASS_WEIGHTS.iter().sum();
        let first = (self.rows * WINE_CLASS_WEIGHTS[0] / total).max(1);
        let second = (self.rows * WINE_CLASS_WEIGHTS[1] / total).max(1);
        [first, second, self.rows - first - second]
    }

    /// Generates the dataset synchronously.
    pub fn generate(&self) -> Result<Dataset, DatasetError> {
        if self.rows < 3 {
            return Err(DatasetError::ShapeMismatch(format!(
                "synthetic wine data needs at least 3 rows, got {}",
                self.rows
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let distributions = WINE_CLASS_MEANS
            .iter()
            .map(|means| {
                means
                    .iter()
                    .zip(WINE_FEATURE_STD.iter())
                    .map(|(&mean, &std_dev)| Normal::new(mean, std_dev))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatasetError::ShapeMismatch(e.to_string()))?;

        let mut rows = Vec::with_capacity(self.rows);
        let mut labels = Vec::with_capacity(self.rows);
        for (class, size) in self.class_sizes().iter().enumerate() {
            for _ in 0..*size {
                let row: Vec<f64> = distributions[class]
                    .iter()
                    .map(|normal| rng.sample(*normal).max(0.0))
                    .collect();
                rows.push(row);
                labels.push(class as i64);
            }
        }

        let names = WINE_FEATURES.iter().map(|s| s.to_string()).collect();
        Dataset::from_rows(names, rows, DEFAULT_LABEL_COLUMN, labels)
    }
}

#[async_trait]
impl DataLoader for SyntheticWineLoader {
    fn describe(&self) -> String {
        format!("synthetic-wine(seed={}, rows={})", self.seed, self.rows)
    }

    async fn load(&self) -> Result<Dataset, DatasetError> {
        let dataset = self.generate()?;
        debug!(
            seed = self.seed,
            rows = dataset.n_rows(),
            counts = ?dataset.class_counts(),
            "Generated synthetic wine dataset"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SMALL_CSV: &str = "\
alcohol,od280/od315_of_diluted_wines,target
# comment line
13.2,3.1,0

12.4,2.8,1
13.0,1.7,2.0
";

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(
            normalize_column_name(" \"od280/od315_of_diluted_wines\" "),
            "od280_od315_of_diluted_wines"
        );
        assert_eq!(normalize_column_name("alcohol"), "alcohol");
    }

    #[test]
    fn test_parse_csv() {
        let ds = CsvLoader::parse(SMALL_CSV, "target").unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.columns(), vec!["alcohol", "od280_od315_of_diluted_wines", "target"]);
        assert_eq!(ds.labels(), &[0, 1, 2]);
        assert_eq!(ds.features()[[1, 1]], 2.8);
    }

    #[test]
    fn test_parse_label_column_anywhere() {
        let ds = CsvLoader::parse("class,x\n1,0.5\n0,0.7\n", "class").unwrap();
        assert_eq!(ds.feature_names(), &["x".to_string()]);
        assert_eq!(ds.labels(), &[1, 0]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            CsvLoader::parse("", "target"),
            Err(DatasetError::Empty)
        ));
        assert!(matches!(
            CsvLoader::parse("a,b\n1,2\n", "target"),
            Err(DatasetError::MissingLabelColumn(_))
        ));
        assert!(matches!(
            CsvLoader::parse("a,target\n", "target"),
            Err(DatasetError::Empty)
        ));

        match CsvLoader::parse("a,target\n1.0,0\n2.0\n", "target") {
            Err(DatasetError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected: {other:?}"),
        }
        match CsvLoader::parse("a,target\nabc,0\n", "target") {
            Err(DatasetError::Malformed { reason, .. }) => assert!(reason.contains("abc")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            CsvLoader::parse("a,target\n1.0,0.5\n", "target"),
            Err(DatasetError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_quoted_header_with_comma() {
        let ds = CsvLoader::parse(
            "\"alcohol, pct\",hue,target\n13.2,1.0,0\n12.1,0.9,1\n",
            "target",
        )
        .unwrap();
        assert_eq!(ds.feature_names(), &["alcohol, pct".to_string(), "hue".to_string()]);
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.features()[[1, 0]], 12.1);
    }

    #[test]
    fn test_parse_quoted_cells_and_escaped_quotes() {
        let ds = CsvLoader::parse(
            "\"a \"\"b\"\" c\",target\n\"1.5\",\"1\"\n2.5,0\n",
            "target",
        )
        .unwrap();
        assert_eq!(ds.feature_names(), &["a \"b\" c".to_string()]);
        assert_eq!(ds.labels(), &[1, 0]);
        assert_eq!(ds.features()[[0, 0]], 1.5);
    }

    #[tokio::test]
    async fn test_csv_loader_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SMALL_CSV.as_bytes()).unwrap();

        let loader = CsvLoader::new(file.path());
        let ds = loader.load().await.unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert!(loader.describe().starts_with("csv:"));
    }

    #[tokio::test]
    async fn test_csv_loader_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = CsvLoader::new(dir.path().join("missing.csv"));

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, DatasetError::SourceUnavailable(_)));
    }

    #[test]
    fn test_synthetic_shape() {
        let ds = SyntheticWineLoader::default().generate().unwrap();
        assert_eq!(ds.n_rows(), 178);
        assert_eq!(ds.n_features(), 13);
        assert_eq!(ds.classes(), vec![0, 1, 2]);
        assert_eq!(ds.class_counts().get(&0), Some(&59));
        assert_eq!(ds.class_counts().get(&1), Some(&71));
        assert_eq!(ds.class_counts().get(&2), Some(&48));
        assert!(ds.features().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_synthetic_is_seeded() {
        let a = SyntheticWineLoader::new(7).generate().unwrap();
        let b = SyntheticWineLoader::new(7).generate().unwrap();
        let c = SyntheticWineLoader::new(8).generate().unwrap();

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_synthetic_small_row_counts() {
        let ds = SyntheticWineLoader::new(1).with_rows(3).generate().unwrap();
        assert_eq!(ds.classes(), vec![0, 1, 2]);

        assert!(SyntheticWineLoader::new(1).with_rows(2).generate().is_err());
    }
}
