//! Disagreement between heads
//!
//! The confusion of an instance is the sum, over every pair of heads, of
//! the L1 distance between their softmax distributions. High confusion means
//! the shallow and deep heads disagree about the instance.

use super::detailed::argmax;
use super::with_eval_mode;
use crate::data::DataLoader;
use crate::model::SdnModel;
use crate::train::loss::softmax_rows;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Corpus-wide confusion mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfusionStats {
    pub mean: f32,
    pub std: f32,
}

impl ConfusionStats {
    /// `(score - mean) / std`; only centers the score when `std` is zero.
    pub fn normalize(&self, score: f32) -> f32 {
        if self.std > 0.0 {
            (score - self.mean) / self.std
        } else {
            score - self.mean
        }
    }
}

/// Per-row pairwise L1 confusion of the given head distributions.
pub fn confusion_scores(probs: &[Array2<f32>], stats: Option<&ConfusionStats>) -> Array1<f32> {
    let rows = probs.first().map_or(0, |p| p.nrows());
    let mut scores = Array1::zeros(rows);
    for (i, a) in probs.iter().enumerate() {
        for b in &probs[i + 1..] {
            let dist = (a - b).mapv(f32::abs).sum_axis(ndarray::Axis(1));
            scores += &dist;
        }
    }
    if let Some(stats) = stats {
        scores.mapv_inplace(|s| stats.normalize(s));
    }
    scores
}

/// Mean and standard deviation of raw confusion over `loader`.
pub fn sdn_confusion_stats<M: SdnModel>(model: &mut M, loader: &DataLoader) -> Result<ConfusionStats> {
    with_eval_mode(model, |model| {
        let mut all = Vec::with_capacity(loader.num_examples());
        for batch in loader {
            let probs: Vec<Array2<f32>> = model.forward(&batch.inputs)?.iter().map(softmax_rows).collect();
            all.extend(confusion_scores(&probs, None).iter().copied());
        }
        if all.is_empty() {
            return Err(Error::EmptyLoader(loader.name().to_string()));
        }
        let n = all.len() as f32;
        let mean = all.iter().sum::<f32>() / n;
        let var = all.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
        Ok(ConfusionStats {
            mean,
            std: var.sqrt(),
        })
    })
}

/// Per-head correctness plus per-instance confusion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfusionResults {
    pub correct: Vec<BTreeSet<usize>>,
    pub wrong: Vec<BTreeSet<usize>>,
    pub instance_confusion: BTreeMap<usize, f32>,
}

/// Confusion of every instance, normalized with `stats` when given.
pub fn sdn_confusion<M: SdnModel>(
    model: &mut M,
    loader: &DataLoader,
    stats: Option<&ConfusionStats>,
) -> Result<ConfusionResults> {
    with_eval_mode(model, |model| {
        let mut results = ConfusionResults::default();
        let mut offset = 0;
        for batch in loader {
            let probs: Vec<Array2<f32>> = model.forward(&batch.inputs)?.iter().map(softmax_rows).collect();
            if results.correct.len() < probs.len() {
                results.correct.resize_with(probs.len(), BTreeSet::new);
                results.wrong.resize_with(probs.len(), BTreeSet::new);
            }
            let scores = confusion_scores(&probs, stats);
            for (local, &label) in batch.labels.iter().enumerate() {
                let instance = offset + local;
                results.instance_confusion.insert(instance, scores[local]);
                for (head, p) in probs.iter().enumerate() {
                    if argmax(p.row(local)).0 == label {
                        results.correct[head].insert(instance);
                    } else {
                        results.wrong[head].insert(instance);
                    }
                }
            }
            offset += batch.size();
        }
        Ok(results)
    })
}
