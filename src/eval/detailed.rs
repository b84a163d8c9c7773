//! Per-instance correctness and confidence
//!
//! Instances are keyed by their position in the loader, counted across
//! batches with the true size of every batch.

use super::with_eval_mode;
use crate::data::DataLoader;
use crate::model::SdnModel;
use crate::train::loss::softmax_rows;
use crate::{Error, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-instance outcome of one head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadDetail {
    pub correct: BTreeSet<usize>,
    pub wrong: BTreeSet<usize>,
    pub predictions: BTreeMap<usize, usize>,
    /// Max softmax probability.
    pub confidence: BTreeMap<usize, f32>,
}

impl HeadDetail {
    fn record(&mut self, instance: usize, probs: ArrayView1<'_, f32>, label: usize) {
        let (pred, conf) = argmax(probs);
        self.predictions.insert(instance, pred);
        self.confidence.insert(instance, conf);
        if pred == label {
            self.correct.insert(instance);
        } else {
            self.wrong.insert(instance);
        }
    }
}

/// Correct/wrong split and confidence of the final head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub correct: BTreeSet<usize>,
    pub wrong: BTreeSet<usize>,
    pub confidence: BTreeMap<usize, f32>,
}

impl ConfidenceReport {
    /// Fraction of instances predicted correctly.
    pub fn accuracy(&self) -> f32 {
        let total = self.correct.len() + self.wrong.len();
        if total == 0 {
            return 0.0;
        }
        self.correct.len() as f32 / total as f32
    }
}

/// Index and value of the largest entry; the first one wins ties.
pub(crate) fn argmax(row: ArrayView1<'_, f32>) -> (usize, f32) {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
}

/// Per-head correctness, prediction and confidence for every instance.
pub fn sdn_detailed_results<M: SdnModel>(model: &mut M, loader: &DataLoader) -> Result<Vec<HeadDetail>> {
    with_eval_mode(model, |model| {
        let mut heads: Vec<HeadDetail> = Vec::new();
        let mut offset = 0;
        for batch in loader {
            let probs: Vec<Array2<f32>> = model.forward(&batch.inputs)?.iter().map(softmax_rows).collect();
            if heads.len() < probs.len() {
                heads.resize_with(probs.len(), HeadDetail::default);
            }
            for (head, p) in heads.iter_mut().zip(&probs) {
                for (local, &label) in batch.labels.iter().enumerate() {
                    head.record(offset + local, p.row(local), label);
                }
            }
            offset += batch.size();
        }
        if offset == 0 {
            return Err(Error::EmptyLoader(loader.name().to_string()));
        }
        Ok(heads)
    })
}

/// Final-head correctness and confidence for every instance.
pub fn cnn_confidence<M: SdnModel>(model: &mut M, loader: &DataLoader) -> Result<ConfidenceReport> {
    with_eval_mode(model, |model| {
        let mut report = ConfidenceReport::default();
        let mut offset = 0;
        for batch in loader {
            let outputs = model.forward(&batch.inputs)?;
            let last = outputs
                .last()
                .ok_or_else(|| Error::config("model produced no outputs"))?;
            let probs = softmax_rows(last);
            for (local, &label) in batch.labels.iter().enumerate() {
                let instance = offset + local;
                let (pred, conf) = argmax(probs.row(local));
                report.confidence.insert(instance, conf);
                if pred == label {
                    report.correct.insert(instance);
                } else {
                    report.wrong.insert(instance);
                }
            }
            offset += batch.size();
        }
        Ok(report)
    })
}
