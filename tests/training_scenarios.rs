//! End-to-end training scenarios for the growth/prune controller
//!
//! - Two-epoch growth run on a tiny dataset
//! - Growth invariant and fatal overflow
//! - Iterative pruning across a growing model
//! - Early-exit evaluation of a trained model

use approx::assert_relative_eq;
use sdn_grow::data::{synthetic_bundle, DatasetBundle, SyntheticConfig};
use sdn_grow::eval::{sdn_test, sdn_test_early_exits};
use sdn_grow::model::{MlpSdn, MlpSdnConfig, SdnModel};
use sdn_grow::optim::{MultiStepLR, SGD};
use sdn_grow::prune::{sparsity, PruneType};
use sdn_grow::train::{SdnTrainer, SelectionPolicy, TrainParams};
use sdn_grow::Error;

// =============================================================================
// Helpers
// =============================================================================

/// 4 batches of 8 examples, 3 classes
fn tiny_data() -> DatasetBundle {
    synthetic_bundle(&SyntheticConfig {
        num_classes: 3,
        input_dim: 6,
        train_size: 32,
        valid_size: 32,
        test_size: 32,
        batch_size: 8,
        seed: 7,
        ..SyntheticConfig::default()
    })
    .unwrap()
}

fn trainer(params: TrainParams) -> SdnTrainer {
    SdnTrainer::new(
        Box::new(SGD::new(0.05, 0.9, 5e-4)),
        Box::new(MultiStepLR::new(0.05, vec![4], vec![0.1]).unwrap()),
        params.with_log_interval(0),
    )
    .unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn two_epoch_growth_run_keeps_best_summed_checkpoint() {
    let data = tiny_data();
    let mut model = MlpSdn::new(MlpSdnConfig::new(6, 8, 3, 1)).unwrap();
    assert_eq!(model.num_output(), 1);

    let params = TrainParams::default()
        .with_epochs(2)
        .with_epoch_growth(vec![1])
        .with_selection(SelectionPolicy::Sum);
    let mut trainer = trainer(params);
    let outcome = trainer.run(&mut model, &data).unwrap();
    let metrics = &outcome.metrics;

    assert_eq!(model.num_output(), 2);
    assert_eq!(metrics.epochs(), 2);
    assert_eq!(metrics.lrs.len(), 2);
    assert_eq!(metrics.train_losses.len(), 2);
    assert_eq!(metrics.valid_top1_acc.len(), 2);
    assert!(metrics.valid_top1_acc.iter().all(|accs| accs.len() == 2));
    assert_eq!(metrics.growth_epochs, vec![1]);

    let sums: Vec<f32> = metrics.valid_top1_acc.iter().map(|a| a.iter().sum()).collect();
    let expected_epoch = if sums[1] > sums[0] { 2 } else { 1 };
    let best = outcome.best().unwrap();
    assert_eq!(best.epoch, expected_epoch);
    assert_eq!(metrics.best_model_epoch, Some(expected_epoch));
    assert_eq!(best.accuracies, metrics.valid_top1_acc[expected_epoch - 1]);

    // the snapshot reproduces the accuracies it was selected for
    let mut restored = MlpSdn::from_snapshot(&best.snapshot).unwrap();
    let replay = sdn_test(&mut restored, &data.valid).unwrap();
    for (got, want) in replay.top1.iter().zip(&best.accuracies) {
        assert_relative_eq!(*got, *want, epsilon = 1e-4);
    }
    assert_eq!(metrics.test_top1_acc.len(), 2);
    assert_eq!(metrics.final_test_top1_acc.len(), 2);
}

#[test]
fn growth_adds_one_head_per_transition_until_full_depth() {
    let mut model = MlpSdn::new(MlpSdnConfig::new(6, 8, 3, 3)).unwrap();
    for k in 1..=3 {
        let new_params = model.grow().unwrap();
        assert!(!new_params.is_empty());
        assert_eq!(model.num_output(), 1 + k);
    }
    assert!(model.is_full_depth());

    let err = model.grow().unwrap_err();
    assert!(matches!(err, Error::GrowthExhausted { num_output: 4, max: 4 }));
    assert_eq!(model.num_output(), 4);
}

#[test]
fn scheduled_growth_beyond_capacity_aborts_the_run() {
    let data = tiny_data();
    let mut model = MlpSdn::new(MlpSdnConfig::new(6, 8, 3, 1)).unwrap();
    let params = TrainParams::default().with_epochs(3).with_epoch_growth(vec![1, 3]);
    let err = trainer(params).run(&mut model, &data).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn iterative_pruning_never_regrows_weights() {
    let data = tiny_data();
    let mut model = MlpSdn::new(MlpSdnConfig::new(6, 8, 3, 2).with_pruning(0.5)).unwrap();
    let params = TrainParams::default()
        .with_epochs(5)
        .with_epoch_growth(vec![2, 3])
        .with_epoch_prune(vec![1, 2, 4, 5])
        .with_prune_type(PruneType::Iterative)
        .with_min_ratio(vec![0.3, 0.4, 0.5])
        .with_prune_batch_size(16);
    let mut trainer = trainer(params);
    let outcome = trainer.run(&mut model, &data).unwrap();

    assert_eq!(outcome.metrics.masks.len(), 4);
    assert!(sparsity(&model) > 0.0);
    // the final prune closes every block at its minimum ratio
    assert!(sparsity(&model) >= 0.5 - 1e-6);
    for param in model.params() {
        if let Some(mask) = param.mask() {
            for (&m, &w) in mask.iter().zip(param.value()) {
                if m == 0.0 {
                    assert_eq!(w, 0.0);
                }
            }
        }
    }
    assert_eq!(outcome.best().unwrap().epoch, 5);
    assert_eq!(trainer.optimizer().param_groups().len(), 3);
}

#[test]
fn early_exit_report_accounts_for_every_instance() {
    let data = tiny_data();
    let mut model = MlpSdn::new(MlpSdnConfig::new(6, 8, 3, 2).full_depth()).unwrap();
    let outcome = trainer(TrainParams::default().with_epochs(2)).run(&mut model, &data).unwrap();
    assert!(outcome.has_checkpoint());

    let report = sdn_test_early_exits(&mut model, &data.test, 0.6).unwrap();
    assert_eq!(report.total(), data.test.num_examples());
    assert_eq!(report.early_counts.len(), 3);

    // only the final head answers as a fallback
    assert!(report.fallback_counts[..2].iter().all(|&c| c == 0));
    assert!((0.0..=100.0).contains(&report.top1));
    assert!(report.top3 >= report.top1);

    assert!(sdn_test_early_exits(&mut model, &data.test, 1.5).is_err());
}
