//! Model capability contract for shallow-deep networks
//!
//! The training controller never looks inside a model. It drives it through
//! [`SdnModel`]: forward/backward passes over every active head, explicit
//! growth that hands back the newly created parameters, access to the
//! prunable weights of each block, and snapshot/restore for checkpoints.
//!
//! [`MlpSdn`] is a dense implementation of the contract used by the CLI and
//! the tests.

mod mlp;
mod param;

pub use mlp::{MlpSdn, MlpSdnConfig, MlpSdnState};
pub use param::{Param, ParamId};

use crate::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Execution mode of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Gradients enabled, activations cached for backward.
    #[default]
    Train,
    /// Deterministic inference, nothing cached.
    Eval,
}

/// Training flags carried by an SDN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFlags {
    /// Train on the augmented loaders.
    pub augment_training: bool,
    /// Freeze the backbone and train the IC heads only.
    pub ic_only: bool,
    /// Enable pruning.
    pub prune: bool,
    /// Fraction of prunable weights to keep.
    pub keep_ratio: f32,
}

impl Default for ModelFlags {
    fn default() -> Self {
        Self {
            augment_training: false,
            ic_only: false,
            prune: false,
            keep_ratio: 0.5,
        }
    }
}

/// What the controller, pruning strategies and evaluation passes need from a
/// model.
///
/// Head order is creation order: output `0` is the shallowest head, the last
/// output is the final (deepest) head.
pub trait SdnModel {
    /// Owned, independent copy of every parameter.
    type Snapshot: Clone + Send + 'static;

    /// Number of active prediction heads, final head included.
    fn num_output(&self) -> usize;

    /// Maximum number of IC heads the model can grow.
    fn num_ics(&self) -> usize;

    fn flags(&self) -> &ModelFlags;

    /// True once every IC head has been grown.
    fn is_full_depth(&self) -> bool {
        self.num_output() == self.num_ics() + 1
    }

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn train(&mut self) {
        self.set_mode(Mode::Train);
    }

    fn eval(&mut self) {
        self.set_mode(Mode::Eval);
    }

    /// Logits of every active head, each `batch x classes`.
    fn forward(&mut self, inputs: &Array2<f32>) -> Result<Vec<Array2<f32>>>;

    /// Accumulate parameter gradients given `dL/dlogits` for every head of
    /// the last training-mode forward pass.
    fn backward(&mut self, grad_outputs: &[Array2<f32>]) -> Result<()>;

    /// Add one IC head and return the newly created trainable parameters.
    ///
    /// Fails with [`crate::Error::GrowthExhausted`] at full depth.
    fn grow(&mut self) -> Result<Vec<ParamId>>;

    /// Parameters the optimizer should update.
    fn trainable_params(&self) -> Vec<ParamId>;

    fn params(&self) -> Vec<&Param>;

    fn params_mut(&mut self) -> Vec<&mut Param>;

    fn param_mut(&mut self, id: ParamId) -> Option<&mut Param> {
        self.params_mut().into_iter().find(|p| p.id() == id)
    }

    fn zero_grad(&mut self) {
        for param in self.params_mut() {
            param.zero_grad();
        }
    }

    /// Number of blocks that currently hold prunable weights.
    fn num_blocks(&self) -> usize;

    /// Prunable weights governed by `block`.
    fn block_params(&self, block: usize) -> Result<Vec<ParamId>>;

    /// Draw fresh initial values for the given parameters, keeping masks.
    fn reinitialize(&mut self, params: &[ParamId]) -> Result<()>;

    fn snapshot(&self) -> Self::Snapshot;

    /// Rebuild a model from a snapshot (used to evaluate checkpoints).
    fn from_snapshot(snapshot: &Self::Snapshot) -> Result<Self>
    where
        Self: Sized;
}
