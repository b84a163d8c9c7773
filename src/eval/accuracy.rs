//! Top-k accuracy per head

use super::with_eval_mode;
use crate::data::DataLoader;
use crate::model::SdnModel;
use crate::{Error, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Whether `label` is among the `k` best classes of `scores`.
///
/// A class outranks the label when its score is higher, or equal with a
/// lower class index.
pub fn in_top_k(scores: ArrayView1<'_, f32>, label: usize, k: usize) -> bool {
    let Some(&target) = scores.get(label) else {
        return false;
    };
    let rank = scores
        .iter()
        .enumerate()
        .filter(|&(c, &s)| s > target || (s == target && c < label))
        .count();
    rank < k
}

/// Number of rows whose label is within the top `k` logits.
pub fn topk_hits(logits: &Array2<f32>, labels: &[usize], k: usize) -> Result<usize> {
    if logits.nrows() != labels.len() {
        return Err(Error::ShapeMismatch {
            context: "top-k labels".to_string(),
            expected: vec![logits.nrows()],
            actual: vec![labels.len()],
        });
    }
    Ok(logits
        .rows()
        .into_iter()
        .zip(labels)
        .filter(|(row, &label)| in_top_k(row.view(), label, k))
        .count())
}

/// Top-1 and top-3 accuracy in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TopK {
    pub top1: f32,
    pub top3: f32,
}

/// Accuracy of every head in head order, in percent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadAccuracy {
    pub top1: Vec<f32>,
    pub top3: Vec<f32>,
}

impl HeadAccuracy {
    pub fn num_heads(&self) -> usize {
        self.top1.len()
    }

    pub fn head(&self, i: usize) -> Option<TopK> {
        Some(TopK {
            top1: *self.top1.get(i)?,
            top3: *self.top3.get(i)?,
        })
    }
}

#[derive(Default)]
struct HitCounter {
    top1: Vec<usize>,
    top3: Vec<usize>,
    seen: usize,
}

impl HitCounter {
    fn update(&mut self, outputs: &[Array2<f32>], labels: &[usize]) -> Result<()> {
        if self.top1.len() < outputs.len() {
            self.top1.resize(outputs.len(), 0);
            self.top3.resize(outputs.len(), 0);
        }
        for (i, logits) in outputs.iter().enumerate() {
            self.top1[i] += topk_hits(logits, labels, 1)?;
            self.top3[i] += topk_hits(logits, labels, 3)?;
        }
        self.seen += labels.len();
        Ok(())
    }

    fn finish(self, loader: &DataLoader) -> Result<HeadAccuracy> {
        if self.seen == 0 {
            return Err(Error::EmptyLoader(loader.name().to_string()));
        }
        let pct = |hits: usize| 100.0 * hits as f32 / self.seen as f32;
        Ok(HeadAccuracy {
            top1: self.top1.iter().map(|&h| pct(h)).collect(),
            top3: self.top3.iter().map(|&h| pct(h)).collect(),
        })
    }
}

/// Top-1/top-3 accuracy of every active head over `loader`.
pub fn sdn_test<M: SdnModel>(model: &mut M, loader: &DataLoader) -> Result<HeadAccuracy> {
    with_eval_mode(model, |model| {
        let mut counter = HitCounter::default();
        for batch in loader {
            let outputs = model.forward(&batch.inputs)?;
            counter.update(&outputs, &batch.labels)?;
        }
        counter.finish(loader)
    })
}

/// Top-1/top-3 accuracy of the final head only.
pub fn cnn_test<M: SdnModel>(model: &mut M, loader: &DataLoader) -> Result<TopK> {
    with_eval_mode(model, |model| {
        let mut counter = HitCounter::default();
        for batch in loader {
            let mut outputs = model.forward(&batch.inputs)?;
            let last = outputs.pop().ok_or_else(|| Error::config("model produced no outputs"))?;
            counter.update(&[last], &batch.labels)?;
        }
        let acc = counter.finish(loader)?;
        acc.head(0)
            .ok_or_else(|| Error::EmptyLoader(loader.name().to_string()))
    })
}
