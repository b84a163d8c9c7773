//! YAML-driven runs through `train_from_yaml`

use sdn_grow::config::{load_spec, train_from_yaml, validate_spec};
use sdn_grow::model::SdnModel;
use sdn_grow::prune::PruneType;
use sdn_grow::train::GrowthSchedule;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn yaml_run_writes_metrics_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("metrics.json");
    let yaml = format!(
        r#"
model:
  input_dim: 5
  hidden_dim: 8
  num_classes: 3
  num_ics: 2
  flags:
    prune: true
    keep_ratio: 0.5
data:
  train_size: 32
  valid_size: 16
  test_size: 16
  batch_size: 8
optimizer:
  lr: 0.05
  momentum: 0.9
scheduler:
  name: multi_step
  milestones: [3]
  gammas: [0.1]
training:
  epochs: 4
  epoch_growth: [2, 3]
  epoch_prune: [1, 4]
  prune_batch_size: 16
  prune_type: "2"
  min_ratio: [0.5, 0.5, 0.5]
  log_interval: 0
output: {}
"#,
        output.display()
    );
    let config = write_config(&yaml);

    let spec = load_spec(config.path()).unwrap();
    assert_eq!(spec.training.prune_type, PruneType::Iterative);
    assert_eq!(spec.training.growth, GrowthSchedule::Scheduled);
    validate_spec(&spec).unwrap();

    let (model, outcome) = train_from_yaml(config.path()).unwrap();
    assert_eq!(model.num_output(), 3);
    assert_eq!(outcome.metrics.masks.len(), 2);
    assert_eq!(outcome.best().unwrap().epoch, 4);

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["valid_top1_acc"].as_array().unwrap().len(), 4);
    assert_eq!(json["growth_epochs"], serde_json::json!([2, 3]));
    assert_eq!(json["best_model_epoch"], 4);
}

#[test]
fn plateau_growth_from_yaml() {
    let yaml = r#"
model:
  input_dim: 4
  hidden_dim: 6
  num_ics: 1
data:
  train_size: 24
  valid_size: 12
  test_size: 12
  batch_size: 8
optimizer:
  lr: 0.05
training:
  epochs: 3
  growth:
    mode: on_plateau
    tolerance: 5.0
  log_interval: 0
"#;
    let config = write_config(yaml);
    let spec = load_spec(config.path()).unwrap();
    assert_eq!(spec.training.growth, GrowthSchedule::OnPlateau { tolerance: 5.0 });

    let (model, outcome) = train_from_yaml(config.path()).unwrap();
    assert_eq!(outcome.metrics.epochs(), outcome.metrics.valid_top1_acc.len());
    assert!(model.num_output() <= 2);
    assert_eq!(outcome.metrics.growth_epochs.len(), model.num_output() - 1);
    if let Ok(best) = outcome.best() {
        assert_eq!(best.accuracies.len(), best.snapshot.num_output());
        assert!(!outcome.metrics.growth_epochs.contains(&best.epoch));
    }
}

#[test]
fn invalid_yaml_is_a_config_error() {
    let config = write_config("model: [not, a, map]\noptimizer:\n  lr: 0.1\n");
    let err = load_spec(config.path()).unwrap_err();
    assert!(err.is_config_error());
}
