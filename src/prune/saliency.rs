//! SNIP connection sensitivity
//!
//! Lee et al. (2019), "SNIP: Single-shot Network Pruning based on Connection
//! Sensitivity". The score of a weight is `|dL/dw * w|` on one batch.

use super::mask::Mask;
use crate::data::Batch;
use crate::model::{ParamId, SdnModel};
use crate::train::loss::sdn_loss;
use crate::{Error, Result};
use ndarray::Array2;
use std::collections::HashMap;

/// Saliency of every prunable weight on `batch`.
///
/// Runs one training-mode forward/backward pass with unit head weights,
/// then restores the model's mode and clears the gradients it produced.
pub fn snip_scores<M: SdnModel>(model: &mut M, batch: &Batch) -> Result<HashMap<ParamId, Array2<f32>>> {
    if batch.is_empty() {
        return Err(Error::EmptyLoader("pruning batch".to_string()));
    }
    let mode = model.mode();
    model.train();
    model.zero_grad();

    let outputs = model.forward(&batch.inputs)?;
    let loss = sdn_loss(&outputs, &batch.labels, None)?;
    model.backward(&loss.grads)?;

    let scores = model
        .params()
        .into_iter()
        .filter(|p| p.is_prunable())
        .map(|p| (p.id(), (p.grad() * p.value()).mapv(f32::abs)))
        .collect();

    model.zero_grad();
    model.set_mode(mode);
    Ok(scores)
}

/// One group member handed to [`keep_top`].
pub struct Candidate<'a> {
    pub param: ParamId,
    pub scores: &'a Array2<f32>,
    /// Mask already in force, if any. Entries it removed are never kept.
    pub current: Option<&'a Array2<f32>>,
}

/// Keep the `ceil(ratio * n)` highest-scoring weights of a group, where `n`
/// counts every weight in the group.
///
/// Weights removed by an earlier mask do not compete. Ties keep the weight
/// that comes first in group order.
pub fn keep_top(group: &[Candidate<'_>], ratio: f32) -> Vec<Mask> {
    let total: usize = group.iter().map(|c| c.scores.len()).sum();
    let budget = ((ratio.clamp(0.0, 1.0) * total as f32).ceil() as usize).min(total);

    let mut ranked: Vec<(usize, usize, f32)> = Vec::with_capacity(total);
    for (g, cand) in group.iter().enumerate() {
        match cand.current {
            Some(mask) => ranked.extend(
                cand.scores
                    .iter()
                    .zip(mask.iter())
                    .enumerate()
                    .filter(|(_, (_, k))| **k != 0.0)
                    .map(|(flat, (&score, _))| (g, flat, score)),
            ),
            None => ranked.extend(
                cand.scores
                    .iter()
                    .enumerate()
                    .map(|(flat, &score)| (g, flat, score)),
            ),
        }
    }
    ranked.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut keeps: Vec<Array2<f32>> = group
        .iter()
        .map(|c| Array2::zeros(c.scores.raw_dim()))
        .collect();
    for &(g, flat, _) in ranked.iter().take(budget) {
        let cols = keeps[g].ncols();
        keeps[g][[flat / cols, flat % cols]] = 1.0;
    }

    group
        .iter()
        .zip(keeps)
        .map(|(c, keep)| Mask::new(c.param, keep))
        .collect()
}
