//! Multi-step learning rate scheduler

use super::{LRScheduler, SchedulerState};
use crate::{Error, Result};

/// Multiplies the rate by `gammas[i]` once the epoch counter reaches
/// `milestones[i]`.
///
/// Formula: lr_t = lr_initial * prod(gammas[i] for milestones[i] <= t)
#[derive(Debug, Clone)]
pub struct MultiStepLR {
    lr_initial: f32,
    milestones: Vec<usize>,
    gammas: Vec<f32>,
    last_epoch: usize,
}

impl MultiStepLR {
    /// Create a scheduler from parallel milestone/gamma lists.
    pub fn new(lr_initial: f32, milestones: Vec<usize>, gammas: Vec<f32>) -> Result<Self> {
        if milestones.len() != gammas.len() {
            return Err(Error::config(format!(
                "multi-step scheduler has {} milestones but {} gammas",
                milestones.len(),
                gammas.len()
            )));
        }
        if milestones.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::config("multi-step milestones must be strictly increasing"));
        }
        Ok(Self {
            lr_initial,
            milestones,
            gammas,
            last_epoch: 0,
        })
    }

    pub fn milestones(&self) -> &[usize] {
        &self.milestones
    }
}

impl LRScheduler for MultiStepLR {
    fn get_lr(&self) -> f32 {
        self.milestones
            .iter()
            .zip(&self.gammas)
            .filter(|(&m, _)| m <= self.last_epoch)
            .fold(self.lr_initial, |lr, (_, &g)| lr * g)
    }

    fn step(&mut self) {
        self.last_epoch += 1;
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            last_epoch: self.last_epoch,
            lr: self.get_lr(),
        }
    }
}
