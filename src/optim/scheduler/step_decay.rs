//! Periodic decay, and the constant schedule as its degenerate case

use super::{LRScheduler, SchedulerState};

/// `lr = base * gamma^(steps / period)`.
///
/// The controller steps once at the start of every epoch, so with
/// `period = 2` epochs 1 runs at `base` and epochs 2..=3 at `base * gamma`.
/// A zero period never decays.
#[derive(Debug, Clone)]
pub struct StepDecayLR {
    base: f32,
    gamma: f32,
    period: usize,
    steps: usize,
}

impl StepDecayLR {
    pub fn new(base: f32, period: usize, gamma: f32) -> Self {
        Self {
            base,
            gamma,
            period,
            steps: 0,
        }
    }

    /// Schedule that always reports `lr`.
    pub fn constant(lr: f32) -> Self {
        Self::new(lr, 0, 1.0)
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl LRScheduler for StepDecayLR {
    fn get_lr(&self) -> f32 {
        match self.steps.checked_div(self.period) {
            Some(decays) => self.base * self.gamma.powi(decays as i32),
            None => self.base,
        }
    }

    fn step(&mut self) {
        self.steps += 1;
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            last_epoch: self.steps,
            lr: self.get_lr(),
        }
    }
}
