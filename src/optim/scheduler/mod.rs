//! Learning rate schedulers
//!
//! Schedulers are stepped once at the start of every epoch, before any
//! batch is seen, and the resulting rate is pushed into the optimizer:
//! - `MultiStepLR` - multiply by a per-milestone factor at given epochs
//! - `StepDecayLR` - step decay by factor every N epochs

mod multi_step;
mod step_decay;

#[cfg(test)]
mod tests;

pub use multi_step::MultiStepLR;
pub use step_decay::StepDecayLR;

use crate::optim::Optimizer;
use serde::{Deserialize, Serialize};

/// Serializable view of a scheduler's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub last_epoch: usize,
    pub lr: f32,
}

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Advance one epoch
    fn step(&mut self);

    fn state(&self) -> SchedulerState;

    /// Apply the current learning rate to an optimizer
    fn apply(&self, optimizer: &mut dyn Optimizer) {
        optimizer.set_lr(self.get_lr());
    }
}
