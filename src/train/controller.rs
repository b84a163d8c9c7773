//! Growth/prune training controller
//!
//! Per epoch, in order: grow (and register the new parameters with the
//! optimizer), prune, train one epoch, then offer the model to the
//! checkpoint selector once it has every head and pruning is over. After
//! the last epoch the best checkpoint and the live model are both evaluated
//! on the test loader.

use super::checkpoint::{BestCheckpoint, CheckpointSelector, SelectionPolicy};
use super::epoch::{run_epoch, EpochPlan};
use super::metrics::MetricsRecord;
use super::params::{GrowthSchedule, TrainParams};
use crate::data::DatasetBundle;
use crate::eval::{cnn_test, sdn_test};
use crate::model::SdnModel;
use crate::optim::{LRScheduler, Optimizer};
use crate::prune::{PruningStrategy, PruneType};
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Result of a run.
#[derive(Debug, Clone)]
pub struct TrainOutcome<S> {
    pub metrics: MetricsRecord,
    best: Option<BestCheckpoint<S>>,
}

impl<S> TrainOutcome<S> {
    /// Best checkpoint, or [`Error::NoCheckpoint`] when the model never
    /// became eligible.
    pub fn best(&self) -> Result<&BestCheckpoint<S>> {
        self.best.as_ref().ok_or_else(|| {
            Error::NoCheckpoint(format!(
                "no checkpoint captured in {} epochs",
                self.metrics.epochs()
            ))
        })
    }

    pub fn has_checkpoint(&self) -> bool {
        self.best.is_some()
    }

    pub fn into_parts(self) -> (MetricsRecord, Option<BestCheckpoint<S>>) {
        (self.metrics, self.best)
    }
}

/// Drives an [`SdnModel`] through a full run.
pub struct SdnTrainer {
    optimizer: Box<dyn Optimizer>,
    scheduler: Box<dyn LRScheduler>,
    params: TrainParams,
}

impl SdnTrainer {
    pub fn new(
        optimizer: Box<dyn Optimizer>,
        scheduler: Box<dyn LRScheduler>,
        params: TrainParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            optimizer,
            scheduler,
            params,
        })
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn scheduler(&self) -> &dyn LRScheduler {
        self.scheduler.as_ref()
    }

    /// Run with the configured growth schedule.
    ///
    /// An optimizer without parameter groups gets the model's trainable
    /// parameters registered as its first group.
    pub fn run<M: SdnModel>(&mut self, model: &mut M, data: &DatasetBundle) -> Result<TrainOutcome<M::Snapshot>> {
        match self.params.growth {
            GrowthSchedule::Scheduled => self.run_scheduled(model, data),
            GrowthSchedule::OnPlateau { tolerance } => self.run_until_plateau(model, data, tolerance),
            GrowthSchedule::Fixed => self.run_fixed(model, data),
        }
    }

    /// Grow at `epoch_growth`, prune at `epoch_prune`.
    pub fn run_scheduled<M: SdnModel>(
        &mut self,
        model: &mut M,
        data: &DatasetBundle,
    ) -> Result<TrainOutcome<M::Snapshot>> {
        self.ensure_registered(model);
        let mut strategy = self.strategy(model)?;
        let last_prune = strategy.as_ref().and_then(|_| self.params.last_prune_epoch());
        let mut selector = CheckpointSelector::new(self.params.selection.unwrap_or(SelectionPolicy::Weighted));
        let mut metrics = MetricsRecord::new();
        info!(
            epochs = self.params.epochs,
            growth = ?self.params.epoch_growth,
            prune = ?strategy.as_ref().map(|_| &self.params.epoch_prune),
            policy = %selector.policy(),
            "starting scheduled growth run"
        );

        for epoch in 1..=self.params.epochs {
            if self.params.epoch_growth.contains(&epoch) {
                self.grow(model, epoch, &mut metrics)?;
            }
            if let Some(strategy) = strategy.as_mut() {
                if self.params.epoch_prune.contains(&epoch) {
                    self.prune(model, data, strategy, epoch, &mut metrics)?;
                }
            }
            self.train_epoch(model, data, epoch, &mut metrics)?;
            let pruning_done = last_prune.is_none_or(|last| epoch >= last);
            if model.is_full_depth() && pruning_done {
                offer(model, &mut selector, &metrics, epoch)?;
            }
        }
        self.finish(model, data, selector, metrics)
    }

    /// Fixed architecture: optional one-shot global prune before the first
    /// epoch, checkpoint every epoch.
    pub fn run_fixed<M: SdnModel>(&mut self, model: &mut M, data: &DatasetBundle) -> Result<TrainOutcome<M::Snapshot>> {
        self.ensure_registered(model);
        let mut selector = CheckpointSelector::new(self.params.selection.unwrap_or(SelectionPolicy::Sum));
        let mut metrics = MetricsRecord::new();
        info!(
            epochs = self.params.epochs,
            heads = model.num_output(),
            ic_only = model.flags().ic_only,
            "starting fixed-architecture run"
        );

        if model.flags().prune {
            let mut strategy = self.params.pruning_strategy(model.flags().keep_ratio, model.num_blocks())?;
            if strategy.prune_type() != PruneType::Global {
                strategy = PruningStrategy::global(model.flags().keep_ratio);
            }
            self.prune(model, data, &mut strategy, 0, &mut metrics)?;
        }

        for epoch in 1..=self.params.epochs {
            self.train_epoch(model, data, epoch, &mut metrics)?;
            offer(model, &mut selector, &metrics, epoch)?;
        }
        self.finish(model, data, selector, metrics)
    }

    /// Grow whenever every head's validation top-1 slipped by less than
    /// `tolerance`; stop early when that happens at full depth.
    pub fn run_until_plateau<M: SdnModel>(
        &mut self,
        model: &mut M,
        data: &DatasetBundle,
        tolerance: f32,
    ) -> Result<TrainOutcome<M::Snapshot>> {
        self.ensure_registered(model);
        let mut selector = CheckpointSelector::new(self.params.selection.unwrap_or(SelectionPolicy::Sum));
        let mut metrics = MetricsRecord::new();
        info!(epochs = self.params.epochs, tolerance, "starting plateau growth run");

        for epoch in 1..=self.params.epochs {
            self.train_epoch(model, data, epoch, &mut metrics)?;
            let mut grown = false;
            if plateaued(&metrics, tolerance) {
                if model.is_full_depth() {
                    info!(epoch, "plateau at full depth, stopping");
                    break;
                }
                self.grow(model, epoch, &mut metrics)?;
                grown = true;
            }
            // accuracies of a growth epoch predate the new head
            if model.is_full_depth() && !grown {
                offer(model, &mut selector, &metrics, epoch)?;
            }
        }
        self.finish(model, data, selector, metrics)
    }

    fn ensure_registered<M: SdnModel>(&mut self, model: &M) {
        if self.optimizer.param_groups().is_empty() {
            self.optimizer.add_param_group(model.trainable_params());
        }
    }

    fn strategy<M: SdnModel>(&self, model: &M) -> Result<Option<PruningStrategy>> {
        if !model.flags().prune || self.params.epoch_prune.is_empty() {
            return Ok(None);
        }
        self.params
            .pruning_strategy(model.flags().keep_ratio, model.num_blocks())
            .map(Some)
    }

    fn grow<M: SdnModel>(&mut self, model: &mut M, epoch: usize, metrics: &mut MetricsRecord) -> Result<()> {
        let new_params = model.grow()?;
        info!(epoch, heads = model.num_output(), new_params = new_params.len(), "model grown");
        self.optimizer.add_param_group(new_params);
        metrics.growth_epochs.push(epoch);
        Ok(())
    }

    fn prune<M: SdnModel>(
        &mut self,
        model: &mut M,
        data: &DatasetBundle,
        strategy: &mut PruningStrategy,
        epoch: usize,
        metrics: &mut MetricsRecord,
    ) -> Result<()> {
        let batch = data.train_loader(false).take_examples(self.params.prune_batch_size)?;
        let masks = strategy.prune(model, &batch, epoch)?;
        metrics.masks.push(masks);
        Ok(())
    }

    fn train_epoch<M: SdnModel>(
        &mut self,
        model: &mut M,
        data: &DatasetBundle,
        epoch: usize,
        metrics: &mut MetricsRecord,
    ) -> Result<f32> {
        let plan = EpochPlan {
            epoch,
            epochs: self.params.epochs,
            augment: model.flags().augment_training,
            log_interval: self.params.log_interval,
        };
        run_epoch(
            model,
            data,
            self.optimizer.as_mut(),
            self.scheduler.as_mut(),
            &plan,
            metrics,
        )
    }

    fn finish<M: SdnModel>(
        &mut self,
        model: &mut M,
        data: &DatasetBundle,
        selector: CheckpointSelector<M::Snapshot>,
        mut metrics: MetricsRecord,
    ) -> Result<TrainOutcome<M::Snapshot>> {
        let best = selector.into_best();
        match &best {
            Some(best) => {
                let mut best_model = M::from_snapshot(&best.snapshot)?;
                metrics.set_best_test(sdn_test(&mut best_model, &data.test)?);
                metrics.best_model_epoch = Some(best.epoch);
                info!(
                    epoch = best.epoch,
                    test_top1 = ?metrics.test_top1_acc,
                    "best checkpoint evaluated"
                );
            }
            None => warn!(
                heads = model.num_output(),
                full_depth = model.num_ics() + 1,
                "no checkpoint captured; best-model test metrics left empty"
            ),
        }
        metrics.set_final_test(sdn_test(model, &data.test)?);
        if model.num_ics() == 0 {
            metrics.cnn_test = Some(cnn_test(model, &data.test)?);
        }
        info!(test_top1 = ?metrics.final_test_top1_acc, "final model evaluated");
        Ok(TrainOutcome { metrics, best })
    }
}

fn offer<M: SdnModel>(
    model: &M,
    selector: &mut CheckpointSelector<M::Snapshot>,
    metrics: &MetricsRecord,
    epoch: usize,
) -> Result<()> {
    let accuracies = metrics
        .last_valid_top1()
        .ok_or_else(|| Error::NoCheckpoint("no validation accuracy recorded".to_string()))?
        .to_vec();
    if selector.offer(model, &accuracies, epoch)? {
        debug!(epoch, ?accuracies, "new best checkpoint");
    }
    Ok(())
}

/// Every head's validation top-1 fell by a positive amount below
/// `tolerance` since the previous epoch.
fn plateaued(metrics: &MetricsRecord, tolerance: f32) -> bool {
    let n = metrics.valid_top1_acc.len();
    if n < 2 {
        return false;
    }
    let (prev, cur) = (&metrics.valid_top1_acc[n - 2], &metrics.valid_top1_acc[n - 1]);
    let mut pairs = prev.iter().zip(cur).peekable();
    pairs.peek().is_some() && pairs.all(|(p, c)| p - c > 0.0 && p - c < tolerance)
}
