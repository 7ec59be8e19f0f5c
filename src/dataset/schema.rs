//! Typed column schemas for tabular datasets.
//!
//! A schema names the feature columns a pipeline expects and the label
//! column. Conforming a dataset to a schema checks that every column is
//! present and returns a copy restricted to exactly those features, in
//! schema order, so downstream fits see a stable column layout whatever the
//! source file's column order was.

use super::frame::{Dataset, DEFAULT_LABEL_COLUMN};
use crate::error::DatasetError;

/// Feature columns of the wine recognition dataset, in canonical order.
pub const WINE_FEATURES: [&str; 13] = [
    "alcohol",
    "malic_acid",
    "ash",
    "alcalinity_of_ash",
    "magnesium",
    "total_phenols",
    "flavanoids",
    "nonflavanoid_phenols",
    "proanthocyanins",
    "color_intensity",
    "hue",
    "od280_od315_of_diluted_wines",
    "proline",
];

/// Expected column layout of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    /// Required numeric feature columns, in order.
    pub feature_columns: Vec<String>,
    /// Required integer label column.
    pub label_column: String,
}

impl DatasetSchema {
    pub fn new(feature_columns: Vec<String>, label_column: impl Into<String>) -> Self {
        Self {
            feature_columns,
            label_column: label_column.into(),
        }
    }

    /// Schema of the wine dataset: 13 float features and an int `target`.
    pub fn wine() -> Self {
        Self::new(
            WINE_FEATURES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_LABEL_COLUMN,
        )
    }

    /// Looks up a built-in schema by name, using `label_column` as its label.
    ///
    /// Known names: `wine`.
    pub fn named(name: &str, label_column: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "wine" => Some(Self::new(
                WINE_FEATURES.iter().map(|s| s.to_string()).collect(),
                label_column,
            )),
            _ => None,
        }
    }

    /// Checks that every schema column is present.
    ///
    /// Extra feature columns are allowed; see [`DatasetSchema::conform`].
    pub fn validate(&self, dataset: &Dataset) -> Result<(), DatasetError> {
        if dataset.label_column() != self.label_column {
            return Err(DatasetError::SchemaMismatch(format!(
                "expected label column '{}', found '{}'",
                self.label_column,
                dataset.label_column()
            )));
        }

        let missing: Vec<&str> = self
            .feature_columns
            .iter()
            .filter(|name| dataset.feature_index(name).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::SchemaMismatch(format!(
                "missing feature columns: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    /// Validates and projects the dataset onto the schema's feature columns.
    pub fn conform(&self, dataset: &Dataset) -> Result<Dataset, DatasetError> {
        self.validate(dataset)?;
        dataset.select_features(&self.feature_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dataset(features: &[&str], label: &str) -> Dataset {
        let cols = features.len();
        let values = ndarray::Array2::from_shape_fn((2, cols), |(r, c)| (r * 10 + c) as f64);
        Dataset::new(
            features.iter().map(|s| s.to_string()).collect(),
            values,
            label,
            vec![0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_wine_schema_shape() {
        let schema = DatasetSchema::wine();
        assert_eq!(schema.feature_columns.len(), 13);
        assert_eq!(schema.label_column, "target");
        assert!(schema
            .feature_columns
            .contains(&"od280_od315_of_diluted_wines".to_string()));
    }

    #[test]
    fn test_named_schema() {
        assert_eq!(DatasetSchema::named("Wine", "target"), Some(DatasetSchema::wine()));
        let custom = DatasetSchema::named("wine", "class").unwrap();
        assert_eq!(custom.label_column, "class");
        assert!(DatasetSchema::named("iris", "target").is_none());
    }

    #[test]
    fn test_conform_reorders_and_drops_extras() {
        let schema = DatasetSchema::new(vec!["b".to_string(), "a".to_string()], "target");
        let ds = dataset(&["a", "extra", "b"], "target");

        let conformed = schema.conform(&ds).unwrap();
        assert_eq!(conformed.columns(), vec!["b", "a", "target"]);
        assert_eq!(conformed.features(), array![[2.0, 0.0], [12.0, 10.0]].view());
    }

    #[test]
    fn test_missing_columns_reported() {
        let schema = DatasetSchema::new(vec!["a".to_string(), "z".to_string()], "target");
        let err = schema.validate(&dataset(&["a"], "target")).unwrap_err();
        assert!(err.to_string().contains("z"));
    }

    #[test]
    fn test_label_column_mismatch() {
        let schema = DatasetSchema::new(vec!["a".to_string()], "target");
        let err = schema.validate(&dataset(&["a"], "class")).unwrap_err();
        assert!(matches!(err, DatasetError::SchemaMismatch(_)));
    }
}
