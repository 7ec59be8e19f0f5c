//! Training arguments: one grid entry paired with the shared dataset.

use std::sync::Arc;

use crate::dataset::Dataset;

use super::hyperparams::HyperparameterConfig;

/// Input to a single fit.
///
/// Every `TrainArgs` in a batch points at the same processed dataset; only
/// the hyperparameters differ. The index records the entry's position in the
/// submitted grid and is what results are correlated back by.
#[derive(Debug)]
pub struct TrainArgs {
    index: usize,
    hyperparameters: HyperparameterConfig,
    data: Arc<Dataset>,
}

impl TrainArgs {
    pub fn new(index: usize, hyperparameters: HyperparameterConfig, data: Arc<Dataset>) -> Self {
        Self {
            index,
            hyperparameters,
            data,
        }
    }

    /// Position of this entry in the grid.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn hyperparameters(&self) -> &HyperparameterConfig {
        &self.hyperparameters
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Shared handle to the dataset.
    pub fn shared_data(&self) -> &Arc<Dataset> {
        &self.data
    }
}

/// Pairs every grid entry with the processed dataset.
///
/// The output has the same length and order as `grid`; element `i` carries
/// `grid[i]` and index `i`. The dataset is shared, not copied.
pub fn build_train_args(grid: &[HyperparameterConfig], data: Arc<Dataset>) -> Vec<TrainArgs> {
    grid.iter()
        .enumerate()
        .map(|(index, hp)| TrainArgs::new(index, hp.clone(), Arc::clone(&data)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dataset() -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                vec!["x".to_string()],
                array![[1.0], [2.0]],
                "target",
                vec![0, 1],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_build_preserves_order_and_shares_data() {
        let grid = vec![
            HyperparameterConfig::new().with("C", 0.1),
            HyperparameterConfig::new().with("C", 0.01),
            HyperparameterConfig::new().with("C", 0.001),
        ];
        let data = dataset();
        let args = build_train_args(&grid, Arc::clone(&data));

        assert_eq!(args.len(), 3);
        for (i, arg) in args.iter().enumerate() {
            assert_eq!(arg.index(), i);
            assert_eq!(arg.hyperparameters(), &grid[i]);
            assert!(Arc::ptr_eq(arg.shared_data(), &data));
        }
        // three args plus the local handle
        assert_eq!(Arc::strong_count(&data), 4);
    }

    #[test]
    fn test_build_empty_grid() {
        assert!(build_train_args(&[], dataset()).is_empty());
    }
}
