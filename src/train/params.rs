//! Controller configuration

use super::checkpoint::SelectionPolicy;
use crate::prune::{IterativeSchedule, PruneType, PruningStrategy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// When the controller grows the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GrowthSchedule {
    /// Grow at every epoch listed in `epoch_growth`.
    #[default]
    Scheduled,
    /// Grow once every head's validation top-1 dropped by a positive amount
    /// below `tolerance` (percentage points) since the previous epoch.
    OnPlateau { tolerance: f32 },
    /// Never grow; train the architecture as constructed.
    Fixed,
}

/// Knobs of a growth/prune run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub epochs: usize,
    pub epoch_growth: Vec<usize>,
    pub epoch_prune: Vec<usize>,
    /// Examples in the batch used to score weights for pruning.
    pub prune_batch_size: usize,
    pub prune_type: PruneType,
    /// Redraw surviving weights after each pruning round.
    pub reinit: bool,
    /// Final keep ratio per block for iterative pruning.
    pub min_ratio: Vec<f32>,
    pub growth: GrowthSchedule,
    /// Checkpoint policy; `None` picks weighted for growing runs and sum for
    /// fixed ones.
    pub selection: Option<SelectionPolicy>,
    /// Batches between progress logs, 0 to disable.
    pub log_interval: usize,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 10,
            epoch_growth: Vec::new(),
            epoch_prune: Vec::new(),
            prune_batch_size: 128,
            prune_type: PruneType::default(),
            reinit: false,
            min_ratio: Vec::new(),
            growth: GrowthSchedule::default(),
            selection: None,
            log_interval: 10,
        }
    }
}

impl TrainParams {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_epoch_growth(mut self, epochs: Vec<usize>) -> Self {
        self.epoch_growth = epochs;
        self
    }

    pub fn with_epoch_prune(mut self, epochs: Vec<usize>) -> Self {
        self.epoch_prune = epochs;
        self
    }

    pub fn with_prune_batch_size(mut self, size: usize) -> Self {
        self.prune_batch_size = size;
        self
    }

    pub fn with_prune_type(mut self, prune_type: PruneType) -> Self {
        self.prune_type = prune_type;
        self
    }

    pub fn with_reinit(mut self, reinit: bool) -> Self {
        self.reinit = reinit;
        self
    }

    pub fn with_min_ratio(mut self, min_ratio: Vec<f32>) -> Self {
        self.min_ratio = min_ratio;
        self
    }

    pub fn with_growth(mut self, growth: GrowthSchedule) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_selection(mut self, policy: SelectionPolicy) -> Self {
        self.selection = Some(policy);
        self
    }

    pub fn with_log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }

    /// Last scheduled prune epoch, if any.
    pub fn last_prune_epoch(&self) -> Option<usize> {
        self.epoch_prune.iter().copied().max()
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::config("epochs must be at least 1"));
        }
        check_epochs("epoch_growth", &self.epoch_growth, self.epochs)?;
        check_epochs("epoch_prune", &self.epoch_prune, self.epochs)?;
        if self.prune_batch_size == 0 {
            return Err(Error::config("prune_batch_size must be at least 1"));
        }
        if let Some(bad) = self.min_ratio.iter().find(|r| !(**r > 0.0 && **r <= 1.0)) {
            return Err(Error::config(format!("min_ratio entries must be in (0, 1], got {bad}")));
        }
        if self.prune_type == PruneType::Iterative && !self.epoch_prune.is_empty() && self.min_ratio.is_empty() {
            return Err(Error::config("iterative pruning needs min_ratio"));
        }
        if let GrowthSchedule::OnPlateau { tolerance } = self.growth {
            if !(tolerance > 0.0) {
                return Err(Error::config(format!("plateau tolerance must be positive, got {tolerance}")));
            }
        }
        Ok(())
    }

    /// Strategy for the configured prune type. `initial_blocks` is the
    /// number of prunable blocks the model starts with.
    pub fn pruning_strategy(&self, keep_ratio: f32, initial_blocks: usize) -> Result<PruningStrategy> {
        if !(keep_ratio > 0.0 && keep_ratio <= 1.0) {
            return Err(Error::config(format!("keep_ratio must be in (0, 1], got {keep_ratio}")));
        }
        Ok(match self.prune_type {
            PruneType::SingleBlock => PruningStrategy::single_block(keep_ratio, self.reinit),
            PruneType::Global => PruningStrategy::global(keep_ratio),
            PruneType::Iterative => PruningStrategy::iterative(
                IterativeSchedule::new(
                    self.min_ratio.clone(),
                    initial_blocks,
                    &self.epoch_growth,
                    &self.epoch_prune,
                ),
                self.reinit,
            ),
        })
    }
}

fn check_epochs(name: &str, epochs: &[usize], total: usize) -> Result<()> {
    if let Some(bad) = epochs.iter().find(|&&e| e == 0 || e > total) {
        return Err(Error::config(format!("{name} entry {bad} outside 1..={total}")));
    }
    if epochs.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::config(format!("{name} must be strictly increasing")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> TrainParams {
        TrainParams::default()
            .with_epochs(10)
            .with_epoch_growth(vec![2, 4, 6])
            .with_epoch_prune(vec![1, 3, 5, 7, 8])
            .with_prune_type(PruneType::Iterative)
            .with_min_ratio(vec![0.5, 0.4, 0.3, 0.2])
    }

    #[test]
    fn test_reference_schedule_is_valid() {
        reference().validate().unwrap();
        assert_eq!(reference().last_prune_epoch(), Some(8));
    }

    #[test]
    fn test_rejects_out_of_range_epochs() {
        assert!(reference().with_epoch_growth(vec![0]).validate().is_err());
        assert!(reference().with_epoch_prune(vec![11]).validate().is_err());
        assert!(reference().with_epoch_growth(vec![4, 2]).validate().is_err());
        assert!(reference().with_epochs(0).validate().is_err());
    }

    #[test]
    fn test_iterative_needs_min_ratio() {
        let err = reference().with_min_ratio(Vec::new()).validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(reference().with_min_ratio(vec![1.5]).validate().is_err());
    }

    #[test]
    fn test_plateau_tolerance_must_be_positive() {
        let params = reference().with_growth(GrowthSchedule::OnPlateau { tolerance: 0.0 });
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_pruning_strategy_matches_type() {
        let strategy = reference().pruning_strategy(0.5, 1).unwrap();
        assert_eq!(strategy.prune_type(), PruneType::Iterative);
        let strategy = reference()
            .with_prune_type(PruneType::SingleBlock)
            .pruning_strategy(0.5, 1)
            .unwrap();
        assert_eq!(strategy.prune_type(), PruneType::SingleBlock);
        assert!(reference().pruning_strategy(0.0, 1).is_err());
    }

    #[test]
    fn test_yaml_accepts_legacy_prune_type() {
        let yaml = "epochs: 4\nepoch_prune: [1, 3]\nprune_type: \"0\"\ngrowth:\n  mode: on_plateau\n  tolerance: 0.8\n";
        let params: TrainParams = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.prune_type, PruneType::SingleBlock);
        assert_eq!(params.growth, GrowthSchedule::OnPlateau { tolerance: 0.8 });
        assert_eq!(params.prune_batch_size, 128);
    }
}
