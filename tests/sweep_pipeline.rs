//! End-to-end tests for the sweep pipeline.

use serde_json::json;
use sweep_forge::dataset::CsvLoader;
use sweep_forge::model::LogisticRegressionFitter;
use sweep_forge::pipeline::{parse_grid, SweepConfig, SweepError, SweepPipeline};
use sweep_forge::sweep::HyperparameterConfig;

fn c_grid(values: &[f64]) -> Vec<HyperparameterConfig> {
    values
        .iter()
        .map(|&c| HyperparameterConfig::new().with("C", c))
        .collect()
}

fn offline_config() -> SweepConfig {
    SweepConfig::new().with_seed(42).with_cache(false)
}

#[tokio::test]
async fn test_three_point_grid_returns_models_in_order() {
    let pipeline = SweepPipeline::from_config(&offline_config());
    let grid = c_grid(&[0.1, 0.01, 0.001]);

    let models = pipeline.run(&grid, 5).await.unwrap();

    assert_eq!(models.len(), 3);
    for (model, expected) in models.iter().zip([0.1, 0.01, 0.001]) {
        assert_eq!(model.hyperparameters().get("C"), Some(&json!(expected)));
        assert_eq!(model.classes(), [0, 1]);
    }
    // Stronger regularization shrinks the weights.
    let norm = |i: usize| models[i].coefficients().mapv(|w| w * w).sum();
    assert!(norm(0) > norm(2));
}

#[tokio::test]
async fn test_grid_from_json_text() {
    let grid = parse_grid(r#"[{"C": 0.1}, {"C": 0.01}, {"C": 0.001}]"#).unwrap();
    let run = SweepPipeline::from_config(&offline_config())
        .run_detailed(&grid, 2)
        .await
        .unwrap();

    assert_eq!(run.models.len(), 3);
    assert_eq!(run.stats.completed, 3);
    assert_eq!(run.stats.failed, 0);
    assert!(run.stats.peak_in_flight <= 2);
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_parameters() {
    let grid = c_grid(&[1.0, 0.05]);

    let first = SweepPipeline::from_config(&offline_config())
        .run(&grid, 2)
        .await
        .unwrap();
    let second = SweepPipeline::from_config(&offline_config())
        .run(&grid, 1)
        .await
        .unwrap();

    for (a, b) in first.iter().zip(&second) {
        assert!(a.same_parameters(b));
        assert_ne!(a.id(), b.id());
    }
}

#[tokio::test]
async fn test_singleton_grid_with_large_concurrency() {
    let models = SweepPipeline::from_config(&offline_config())
        .run(&c_grid(&[1.0]), 64)
        .await
        .unwrap();
    assert_eq!(models.len(), 1);
}

#[tokio::test]
async fn test_empty_grid_is_rejected() {
    let err = SweepPipeline::from_config(&offline_config())
        .run(&[], 5)
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_non_positive_concurrency_is_rejected() {
    let pipeline = SweepPipeline::from_config(&offline_config());
    for k in [0, -1] {
        let err = pipeline.run(&c_grid(&[0.1]), k).await.unwrap_err();
        assert!(matches!(err, SweepError::InvalidConfiguration(_)), "k = {}", k);
    }
}

#[tokio::test]
async fn test_partial_failure_reports_failed_index() {
    let grid = vec![
        HyperparameterConfig::new().with("C", 0.1),
        HyperparameterConfig::new().with("C", "not-a-number"),
        HyperparameterConfig::new().with("C", 0.001),
    ];

    let err = SweepPipeline::from_config(&offline_config())
        .run(&grid, 3)
        .await
        .unwrap_err();

    let report = err.failure_report().expect("fit failures");
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed_indices(), vec![1]);
}

#[tokio::test]
async fn test_unknown_hyperparameter_fails_that_entry() {
    let grid = vec![
        HyperparameterConfig::new().with("C", 1.0),
        HyperparameterConfig::new().with("learning_rate", 0.5),
    ];

    let err = SweepPipeline::from_config(&offline_config())
        .run(&grid, 2)
        .await
        .unwrap_err();
    assert_eq!(err.failure_report().unwrap().failed_indices(), vec![1]);
}

#[tokio::test]
async fn test_missing_csv_is_source_unavailable() {
    let config = offline_config().with_data_path("/nonexistent/wine.csv");
    let err = SweepPipeline::from_config(&config)
        .run(&c_grid(&[0.1]), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_csv_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.csv");
    let mut content = String::from("alcohol,\"od280/od315\",target\n");
    for i in 0..12 {
        let shift = i as f64 * 0.05;
        let label = i % 3;
        let (a, b) = if label == 0 {
            (14.0 + shift, 3.2 - shift)
        } else {
            (12.0 + shift, 2.0 + shift)
        };
        content.push_str(&format!("{},{},{}\n", a, b, label));
    }
    std::fs::write(&path, content).unwrap();

    let pipeline = SweepPipeline::new(CsvLoader::new(&path), LogisticRegressionFitter);
    let models = pipeline.run(&c_grid(&[10.0, 0.1]), 2).await.unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].feature_names().to_vec(), vec!["alcohol", "od280_od315"]);
    assert!(models[0].diagnostics().training_accuracy > 0.9);
}
