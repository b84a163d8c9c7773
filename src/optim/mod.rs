//! Optimizers and learning rate schedulers for training SDNs

mod optimizer;
mod scheduler;
mod sgd;

pub use optimizer::{Optimizer, ParamGroup};
pub use scheduler::{LRScheduler, MultiStepLR, SchedulerState, StepDecayLR};
pub use sgd::SGD;
