//! Keep-masks produced by a pruning round

use crate::model::{ParamId, SdnModel};
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Keep-mask for one parameter: `1.0` kept, `0.0` pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub param: ParamId,
    pub keep: Array2<f32>,
}

impl Mask {
    pub fn new(param: ParamId, keep: Array2<f32>) -> Self {
        Self { param, keep }
    }

    pub fn kept(&self) -> usize {
        self.keep.iter().filter(|&&k| k != 0.0).count()
    }

    /// Fraction of entries this mask removes.
    pub fn sparsity(&self) -> f32 {
        if self.keep.is_empty() {
            return 0.0;
        }
        1.0 - self.kept() as f32 / self.keep.len() as f32
    }
}

/// Masks computed by a single pruning invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskSet {
    masks: Vec<Mask>,
}

impl MaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mask: Mask) {
        self.masks.push(mask);
    }

    pub fn extend(&mut self, masks: impl IntoIterator<Item = Mask>) {
        self.masks.extend(masks);
    }

    pub fn get(&self, param: ParamId) -> Option<&Mask> {
        self.masks.iter().find(|m| m.param == param)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mask> {
        self.masks.iter()
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Ids of every masked parameter.
    pub fn params(&self) -> Vec<ParamId> {
        self.masks.iter().map(|m| m.param).collect()
    }
}

/// `w <- w * mask` for every mask, composing with earlier masks by AND.
///
/// Idempotent. A mask naming a parameter the model does not have, or with a
/// different shape, aborts with an error.
pub fn apply_masks<M: SdnModel>(model: &mut M, masks: &MaskSet) -> Result<()> {
    for mask in masks.iter() {
        let param = model
            .param_mut(mask.param)
            .ok_or(Error::UnknownParam(mask.param.0))?;
        param.apply_mask(&mask.keep)?;
    }
    Ok(())
}

/// Fraction of prunable weights currently removed.
pub fn sparsity<M: SdnModel>(model: &M) -> f32 {
    let (total, kept) = model
        .params()
        .into_iter()
        .filter(|p| p.is_prunable())
        .fold((0usize, 0usize), |(t, k), p| (t + p.len(), k + p.kept()));
    if total == 0 {
        return 0.0;
    }
    1.0 - kept as f32 / total as f32
}
