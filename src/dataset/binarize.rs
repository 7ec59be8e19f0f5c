//! Collapses a multi-class label column into a binary indicator.

use tracing::debug;

use super::frame::Dataset;
use crate::error::DatasetError;

/// Maps every label other than a reference class onto a single second class.
///
/// With the defaults, class `0` stays `0` and every other class becomes `1`,
/// turning the three-class wine problem into "class 0 vs. the rest".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelBinarizer {
    /// Class kept as-is.
    pub reference_class: i64,
    /// Class every other label is mapped to.
    pub other_class: i64,
}

impl Default for LabelBinarizer {
    fn default() -> Self {
        Self {
            reference_class: 0,
            other_class: 1,
        }
    }
}

impl LabelBinarizer {
    pub fn new(reference_class: i64, other_class: i64) -> Self {
        Self {
            reference_class,
            other_class,
        }
    }

    /// Returns a new dataset with the binarized label column.
    ///
    /// The input is left untouched and features are carried over unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::DegenerateLabels` unless the result contains
    /// exactly two distinct label values (for example when the reference
    /// class never occurs, or is the only class present).
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset, DatasetError> {
        let labels: Vec<i64> = dataset
            .labels()
            .iter()
            .map(|&label| {
                if label == self.reference_class {
                    label
                } else {
                    self.other_class
                }
            })
            .collect();

        let binarized = dataset.with_labels(labels)?;
        let classes = binarized.classes();
        if classes.len() != 2 {
            return Err(DatasetError::DegenerateLabels { found: classes });
        }

        debug!(
            reference_class = self.reference_class,
            other_class = self.other_class,
            input_classes = ?dataset.classes(),
            counts = ?binarized.class_counts(),
            "Binarized label column"
        );

        Ok(binarized)
    }
}
