//! In-memory labeled table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use ndarray::{Array1, Array2, ArrayView2};
use sha2::{Digest, Sha256};

use crate::error::DatasetError;
use crate::sweep::ContentHash;

/// Default name of the label column.
pub const DEFAULT_LABEL_COLUMN: &str = "target";

/// A table of numeric feature columns plus one integer label column.
///
/// Row count and column set are fixed at construction. Transformations
/// return new datasets rather than mutating in place, so a `Dataset` can be
/// shared read-only behind an `Arc` by every concurrent fit.
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Array2<f64>,
    label_column: String,
    labels: Vec<i64>,
    fingerprint: OnceLock<ContentHash>,
}

impl Dataset {
    /// Creates a dataset from a feature matrix (rows × features) and labels.
    ///
    /// # Errors
    ///
    /// - `DatasetError::Empty` if there are no rows or no feature columns
    /// - `DatasetError::ShapeMismatch` if names, matrix and labels disagree,
    ///   or the label column name collides with a feature name
    /// - `DatasetError::NonFinite` if any feature value is NaN or infinite
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        label_column: impl Into<String>,
        labels: Vec<i64>,
    ) -> Result<Self, DatasetError> {
        let label_column = label_column.into();
        let (rows, cols) = features.dim();

        if rows == 0 || cols == 0 {
            return Err(DatasetError::Empty);
        }
        if feature_names.len() != cols {
            return Err(DatasetError::ShapeMismatch(format!(
                "{} feature names for {} feature columns",
                feature_names.len(),
                cols
            )));
        }
        if labels.len() != rows {
            return Err(DatasetError::ShapeMismatch(format!(
                "{} labels for {} rows",
                labels.len(),
                rows
            )));
        }
        if feature_names.iter().any(|name| *name == label_column) {
            return Err(DatasetError::ShapeMismatch(format!(
                "label column '{}' is also a feature column",
                label_column
            )));
        }
        let unique: BTreeSet<&String> = feature_names.iter().collect();
        if unique.len() != feature_names.len() {
            return Err(DatasetError::ShapeMismatch(
                "duplicate feature column names".to_string(),
            ));
        }

        for ((row, col), value) in features.indexed_iter() {
            if !value.is_finite() {
                return Err(DatasetError::NonFinite {
                    column: feature_names[col].clone(),
                    row,
                });
            }
        }

        Ok(Self {
            feature_names,
            features,
            label_column,
            labels,
            fingerprint: OnceLock::new(),
        })
    }

    /// Creates a dataset from row-major feature vectors.
    pub fn from_rows(
        feature_names: Vec<String>,
        rows: Vec<Vec<f64>>,
        label_column: impl Into<String>,
        labels: Vec<i64>,
    ) -> Result<Self, DatasetError> {
        let n_rows = rows.len();
        let n_cols = feature_names.len();
        let mut values = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(DatasetError::ShapeMismatch(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            values.extend(row);
        }
        let features = Array2::from_shape_vec((n_rows, n_cols), values)
            .map_err(|e| DatasetError::ShapeMismatch(e.to_string()))?;
        Self::new(feature_names, features, label_column, labels)
    }

    /// Returns a copy of this dataset with its label column replaced.
    pub fn with_labels(&self, labels: Vec<i64>) -> Result<Self, DatasetError> {
        Self::new(
            self.feature_names.clone(),
            self.features.clone(),
            self.label_column.clone(),
            labels,
        )
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// All column names: features in order, then the label column.
    pub fn columns(&self) -> Vec<&str> {
        self.feature_names
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.label_column.as_str()))
            .collect()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Position of a feature column.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Distinct label values, ascending.
    pub fn classes(&self) -> Vec<i64> {
        self.labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Row count per label value.
    pub fn class_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }

    /// Splits the table into the feature matrix and the target column.
    pub fn split_xy(&self) -> (ArrayView2<'_, f64>, Array1<i64>) {
        (self.features.view(), Array1::from(self.labels.clone()))
    }

    /// Returns a dataset restricted to the named feature columns, in the
    /// given order.
    pub fn select_features(&self, names: &[String]) -> Result<Self, DatasetError> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self.feature_index(name).ok_or_else(|| {
                DatasetError::SchemaMismatch(format!("missing feature column '{}'", name))
            })?;
            indices.push(idx);
        }
        let features = self.features.select(ndarray::Axis(1), &indices);
        Self::new(
            names.to_vec(),
            features,
            self.label_column.clone(),
            self.labels.clone(),
        )
    }

    /// Content hash over column names, feature values and labels.
    ///
    /// Identical tables hash identically across runs; this is the dataset
    /// version used in cache keys. Computed once and memoized.
    pub fn fingerprint(&self) -> &ContentHash {
        self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            for name in &self.feature_names {
                hasher.update(name.as_bytes());
                hasher.update([0u8]);
            }
            hasher.update(self.label_column.as_bytes());
            hasher.update([0u8]);
            hasher.update((self.n_rows() as u64).to_le_bytes());
            for value in self.features.iter() {
                hasher.update(value.to_le_bytes());
            }
            for label in &self.labels {
                hasher.update(label.to_le_bytes());
            }
            ContentHash::from_digest(hasher.finalize().as_slice())
        })
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.feature_names == other.feature_names
            && self.label_column == other.label_column
            && self.labels == other.labels
            && self.features == other.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Dataset {
        Dataset::new(
            names(&["a", "b"]),
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
            "target",
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_new_dataset() {
        let ds = sample();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.columns(), vec!["a", "b", "target"]);
        assert_eq!(ds.classes(), vec![0, 1, 2]);
        assert_eq!(ds.class_counts().get(&1), Some(&1));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let err = Dataset::new(names(&["a"]), array![[1.0, 2.0]], "target", vec![0]).unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch(_)));

        let err = Dataset::new(names(&["a", "b"]), array![[1.0, 2.0]], "target", vec![0, 1])
            .unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch(_)));

        let err = Dataset::from_rows(
            names(&["a", "b"]),
            vec![vec![1.0, 2.0], vec![3.0]],
            "target",
            vec![0, 1],
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch(_)));
    }

    #[test]
    fn test_rejects_label_collision_and_duplicates() {
        let err = Dataset::new(names(&["target", "b"]), array![[1.0, 2.0]], "target", vec![0])
            .unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch(_)));

        let err =
            Dataset::new(names(&["a", "a"]), array![[1.0, 2.0]], "target", vec![0]).unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch(_)));
    }

    #[test]
    fn test_rejects_empty_and_non_finite() {
        let err = Dataset::from_rows(names(&["a"]), vec![], "target", vec![]).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));

        let err = Dataset::new(names(&["a", "b"]), array![[1.0, f64::NAN]], "target", vec![0])
            .unwrap_err();
        match err {
            DatasetError::NonFinite { column, row } => {
                assert_eq!(column, "b");
                assert_eq!(row, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_with_labels_keeps_features() {
        let ds = sample();
        let relabeled = ds.with_labels(vec![0, 1, 1]).unwrap();
        assert_eq!(relabeled.features(), ds.features());
        assert_eq!(relabeled.labels(), &[0, 1, 1]);
        assert_eq!(ds.labels(), &[0, 1, 2]);
        assert!(ds.with_labels(vec![0]).is_err());
    }

    #[test]
    fn test_select_features() {
        let ds = sample();
        let selected = ds.select_features(&names(&["b"])).unwrap();
        assert_eq!(selected.feature_names(), &["b".to_string()]);
        assert_eq!(selected.features(), array![[2.0], [4.0], [6.0]].view());

        let err = ds.select_features(&names(&["c"])).unwrap_err();
        assert!(matches!(err, DatasetError::SchemaMismatch(_)));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let ds = sample();
        let same = sample();
        let relabeled = ds.with_labels(vec![0, 1, 1]).unwrap();

        assert_eq!(ds.fingerprint(), same.fingerprint());
        assert_ne!(ds.fingerprint(), relabeled.fingerprint());
        assert_eq!(ds.fingerprint().as_str().len(), 64);
    }

    #[test]
    fn test_split_xy() {
        let ds = sample();
        let (x, y) = ds.split_xy();
        assert_eq!(x.dim(), (3, 2));
        assert_eq!(y.to_vec(), vec![0, 1, 2]);
    }
}
