//! YAML schema for SDN training runs
//!
//! ```yaml
//! model:
//!   input_dim: 16
//!   hidden_dim: 32
//!   num_classes: 3
//!   num_ics: 3
//!   flags:
//!     prune: true
//!     keep_ratio: 0.5
//! data:
//!   batch_size: 32
//! optimizer:
//!   name: sgd
//!   lr: 0.1
//!   momentum: 0.9
//!   weight_decay: 0.0005
//! scheduler:
//!   name: multi_step
//!   milestones: [4]
//!   gammas: [0.1]
//! training:
//!   epochs: 10
//!   epoch_growth: [2, 4, 6]
//!   epoch_prune: [1, 3, 5, 7, 8]
//!   prune_type: iterative
//!   min_ratio: [0.5, 0.4, 0.3, 0.2]
//! ```

use crate::data::SyntheticConfig;
use crate::model::MlpSdnConfig;
use crate::optim::{LRScheduler, MultiStepLR, StepDecayLR, SGD};
use crate::train::TrainParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete run specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdnSpec {
    pub model: MlpSdnConfig,

    /// Synthetic dataset; `input_dim` and `num_classes` always follow the
    /// model.
    #[serde(default)]
    pub data: SyntheticConfig,

    pub optimizer: OptimSpec,

    #[serde(default)]
    pub scheduler: SchedulerSpec,

    #[serde(default)]
    pub training: TrainParams,

    /// Where to write the metrics record as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimSpec {
    /// Optimizer name; only "sgd" is available
    #[serde(default = "default_optimizer")]
    pub name: String,

    pub lr: f32,

    #[serde(default)]
    pub momentum: f32,

    #[serde(default)]
    pub weight_decay: f32,
}

fn default_optimizer() -> String {
    "sgd".to_string()
}

impl OptimSpec {
    pub fn build(&self) -> Result<SGD> {
        match self.name.to_ascii_lowercase().as_str() {
            "sgd" => Ok(SGD::new(self.lr, self.momentum, self.weight_decay)),
            other => Err(Error::config(format!("unsupported optimizer '{other}'"))),
        }
    }
}

/// Learning rate scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SchedulerSpec {
    /// Multiply by `gammas[i]` from epoch `milestones[i]` on
    MultiStep {
        milestones: Vec<usize>,
        gammas: Vec<f32>,
    },
    /// Multiply by `gamma` every `step_size` epochs
    StepDecay { step_size: usize, gamma: f32 },
    /// Keep the optimizer's rate
    #[default]
    Constant,
}

impl SchedulerSpec {
    pub fn build(&self, lr: f32) -> Result<Box<dyn LRScheduler>> {
        Ok(match self {
            SchedulerSpec::MultiStep { milestones, gammas } => {
                Box::new(MultiStepLR::new(lr, milestones.clone(), gammas.clone())?)
            }
            SchedulerSpec::StepDecay { step_size, gamma } => Box::new(StepDecayLR::new(lr, *step_size, *gamma)),
            SchedulerSpec::Constant => Box::new(StepDecayLR::constant(lr)),
        })
    }
}

impl SdnSpec {
    /// Dataset settings with the model's shape filled in.
    pub fn data_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            input_dim: self.model.input_dim,
            num_classes: self.model.num_classes,
            ..self.data.clone()
        }
    }
}
