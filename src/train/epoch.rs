//! One epoch of multi-head training

use super::coeffs::{current_coeffs, max_coeffs};
use super::loss::{ic_only_loss, sdn_loss};
use super::metrics::{EpochSummary, MetricsRecord};
use crate::data::{Batch, DatasetBundle};
use crate::eval::sdn_test;
use crate::model::SdnModel;
use crate::optim::{LRScheduler, Optimizer};
use crate::{Error, Result};
use std::time::Instant;
use tracing::{debug, info};

/// Position of an epoch within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochPlan {
    /// 1-based.
    pub epoch: usize,
    pub epochs: usize,
    /// Read the augmented train/valid loaders.
    pub augment: bool,
    /// Batches between progress logs, 0 to disable.
    pub log_interval: usize,
}

/// Forward, blended loss, backward and optimizer step on one batch.
///
/// Models flagged `ic_only` train their internal heads with unit weights
/// and leave the final head out of the loss. Returns the batch loss.
pub fn sdn_training_step<M: SdnModel>(
    model: &mut M,
    optimizer: &mut dyn Optimizer,
    batch: &Batch,
    coeffs: &[f32],
) -> Result<f32> {
    let outputs = model.forward(&batch.inputs)?;
    let loss = if model.flags().ic_only {
        ic_only_loss(&outputs, &batch.labels)?
    } else {
        sdn_loss(&outputs, &batch.labels, Some(coeffs))?
    };
    model.zero_grad();
    model.backward(&loss.grads)?;
    let mut params = model.params_mut();
    optimizer.step(&mut params);
    Ok(loss.value)
}

/// Run one epoch and append its results to `metrics`.
///
/// Order: step the scheduler and push its rate into the optimizer, anneal
/// the head coefficients, train over every batch, then measure per-head
/// accuracy on the validation and training loaders. Returns the mean
/// training loss.
pub fn run_epoch<M: SdnModel>(
    model: &mut M,
    data: &DatasetBundle,
    optimizer: &mut dyn Optimizer,
    scheduler: &mut dyn LRScheduler,
    plan: &EpochPlan,
    metrics: &mut MetricsRecord,
) -> Result<f32> {
    let start = Instant::now();

    scheduler.step();
    scheduler.apply(optimizer);
    let lr = scheduler.get_lr();
    debug!(epoch = plan.epoch, state = ?scheduler.state(), "scheduler stepped");

    let coeffs = current_coeffs(plan.epoch, plan.epochs, &max_coeffs(model.num_output()));
    debug!(epoch = plan.epoch, ?coeffs, "loss coefficients");

    model.train();
    let loader = data.train_loader(plan.augment);
    if loader.is_empty() {
        return Err(Error::EmptyLoader(loader.name().to_string()));
    }
    let mut total = 0.0;
    for (i, batch) in loader.iter().enumerate() {
        total += sdn_training_step(model, optimizer, batch, &coeffs)?;
        if plan.log_interval > 0 && (i + 1) % plan.log_interval == 0 {
            debug!(
                epoch = plan.epoch,
                step = i + 1,
                loss = total / (i + 1) as f32,
                lr,
                "training"
            );
        }
    }
    let mean_loss = total / loader.len() as f32;

    let valid = sdn_test(model, data.valid_loader(plan.augment))?;
    let train = sdn_test(model, loader)?;
    let elapsed = start.elapsed();

    info!(
        epoch = plan.epoch,
        heads = model.num_output(),
        lr,
        loss = mean_loss,
        valid_top1 = ?valid.top1,
        elapsed_ms = elapsed.as_millis() as u64,
        "epoch done"
    );

    metrics.record_epoch(EpochSummary {
        epoch: plan.epoch,
        lr,
        mean_loss,
        coeffs,
        valid,
        train,
        elapsed,
    });
    Ok(mean_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{synthetic_bundle, SyntheticConfig};
    use crate::model::{MlpSdn, MlpSdnConfig, ModelFlags};
    use crate::optim::{MultiStepLR, SGD};
    use approx::assert_relative_eq;

    fn small_data() -> DatasetBundle {
        let cfg = SyntheticConfig {
            input_dim: 4,
            train_size: 32,
            valid_size: 16,
            test_size: 16,
            batch_size: 8,
            ..SyntheticConfig::default()
        };
        synthetic_bundle(&cfg).unwrap()
    }

    #[test]
    fn test_run_epoch_records_every_stream() {
        let data = small_data();
        let mut model = MlpSdn::new(MlpSdnConfig::new(4, 8, 3, 2).with_initial_heads(2)).unwrap();
        let mut opt = SGD::new(0.1, 0.9, 0.0);
        opt.add_param_group(model.trainable_params());
        let mut sched = MultiStepLR::new(0.1, vec![2], vec![0.1]).unwrap();
        let mut metrics = MetricsRecord::new();
        let plan = EpochPlan {
            epoch: 1,
            epochs: 4,
            augment: false,
            log_interval: 1,
        };

        let loss = run_epoch(&mut model, &data, &mut opt, &mut sched, &plan, &mut metrics).unwrap();

        assert!(loss.is_finite() && loss > 0.0);
        assert_eq!(metrics.epochs(), 1);
        assert_eq!(metrics.valid_top1_acc[0].len(), 2);
        assert_eq!(metrics.train_top3_acc[0].len(), 2);
        assert_eq!(metrics.coeffs[0].len(), 1);
        assert_relative_eq!(metrics.lrs[0], 0.1, epsilon = 1e-7);
        assert_relative_eq!(metrics.train_losses[0], loss, epsilon = 1e-6);
    }

    #[test]
    fn test_scheduler_steps_before_training() {
        let data = small_data();
        let mut model = MlpSdn::new(MlpSdnConfig::new(4, 8, 3, 0)).unwrap();
        let mut opt = SGD::new(0.1, 0.0, 0.0);
        opt.add_param_group(model.trainable_params());
        let mut sched = MultiStepLR::new(0.1, vec![1], vec![0.5]).unwrap();
        let mut metrics = MetricsRecord::new();
        let plan = EpochPlan {
            epoch: 1,
            epochs: 1,
            augment: false,
            log_interval: 0,
        };
        run_epoch(&mut model, &data, &mut opt, &mut sched, &plan, &mut metrics).unwrap();
        assert_relative_eq!(metrics.lrs[0], 0.05, epsilon = 1e-7);
        assert_relative_eq!(opt.lr(), 0.05, epsilon = 1e-7);

        let state = sched.state();
        assert_eq!(state.last_epoch, 1);
        assert_relative_eq!(state.lr, metrics.lrs[0], epsilon = 1e-7);
    }

    #[test]
    fn test_ic_only_step_leaves_backbone_untouched() {
        let flags = ModelFlags {
            ic_only: true,
            ..ModelFlags::default()
        };
        let mut model = MlpSdn::new(MlpSdnConfig::new(4, 8, 3, 1).full_depth().with_flags(flags)).unwrap();
        let backbone = model.block_params(0).unwrap()[0];
        let before = model.params().into_iter().find(|p| p.id() == backbone).unwrap().value().clone();

        let mut opt = SGD::new(0.5, 0.0, 0.0);
        opt.add_param_group(model.trainable_params());
        let batch = small_data().train.iter().next().unwrap().clone();
        sdn_training_step(&mut model, &mut opt, &batch, &[0.5]).unwrap();

        let after = model.params().into_iter().find(|p| p.id() == backbone).unwrap().value().clone();
        assert_eq!(before, after);
    }
}
