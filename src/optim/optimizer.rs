//! Optimizer trait

use crate::model::{Param, ParamId};
use std::collections::BTreeSet;

/// Parameters updated together with one learning rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGroup {
    params: BTreeSet<ParamId>,
    lr: f32,
}

impl ParamGroup {
    pub fn new(params: impl IntoIterator<Item = ParamId>, lr: f32) -> Self {
        Self {
            params: params.into_iter().collect(),
            lr,
        }
    }

    pub fn contains(&self, id: ParamId) -> bool {
        self.params.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn lr(&self) -> f32 {
        self.lr
    }

    pub fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

/// Trait for optimization algorithms
///
/// Only parameters registered through [`Optimizer::add_param_group`] are
/// updated; anything else passed to [`Optimizer::step`] is left untouched,
/// which is how frozen backbones stay frozen.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [&mut Param]);

    /// Zero gradients on referenced parameters
    fn zero_grad(&mut self, params: &mut [&mut Param]) {
        for param in params.iter_mut() {
            param.zero_grad();
        }
    }

    /// Register a new parameter group at the current learning rate.
    ///
    /// Existing groups are left as they are.
    fn add_param_group(&mut self, params: Vec<ParamId>);

    fn param_groups(&self) -> &[ParamGroup];

    /// Group owning `id`, if any
    fn group_of(&self, id: ParamId) -> Option<&ParamGroup> {
        self.param_groups().iter().find(|g| g.contains(id))
    }

    /// Get learning rate (of the first group)
    fn lr(&self) -> f32;

    /// Set learning rate on every group
    fn set_lr(&mut self, lr: f32);
}
