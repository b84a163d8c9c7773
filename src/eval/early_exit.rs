//! Early-exit inference simulation
//!
//! Each instance is answered by the shallowest head whose max softmax
//! probability reaches the threshold. When no head is confident enough the
//! final head answers anyway, and the exit is counted as a fallback.

use super::accuracy::in_top_k;
use super::with_eval_mode;
use crate::data::DataLoader;
use crate::model::SdnModel;
use crate::train::loss::softmax_rows;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Where instances left the network and how accurate the answers were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyExitReport {
    /// Confident exits per head.
    pub early_counts: Vec<usize>,
    /// Forced exits per head; only the final head can be non-zero.
    pub fallback_counts: Vec<usize>,
    pub top1: f32,
    pub top3: f32,
    pub total_time: Duration,
}

impl EarlyExitReport {
    pub fn total(&self) -> usize {
        self.early_counts.iter().sum::<usize>() + self.fallback_counts.iter().sum::<usize>()
    }
}

/// Run early-exit inference over `loader` with confidence `threshold`.
pub fn sdn_test_early_exits<M: SdnModel>(
    model: &mut M,
    loader: &DataLoader,
    threshold: f32,
) -> Result<EarlyExitReport> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::config(format!(
            "early-exit threshold must be in [0, 1], got {threshold}"
        )));
    }
    with_eval_mode(model, |model| {
        let heads = model.num_output();
        let mut early_counts = vec![0; heads];
        let mut fallback_counts = vec![0; heads];
        let (mut hits1, mut hits3, mut seen) = (0usize, 0usize, 0usize);
        let mut total_time = Duration::ZERO;

        for batch in loader {
            let start = Instant::now();
            let outputs = model.forward(&batch.inputs)?;
            let probs: Vec<_> = outputs.iter().map(softmax_rows).collect();
            total_time += start.elapsed();

            for (row, &label) in batch.labels.iter().enumerate() {
                let confident = probs.iter().position(|p| {
                    p.row(row).iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b)) >= threshold
                });
                let exit = match confident {
                    Some(head) => {
                        early_counts[head] += 1;
                        head
                    }
                    None => {
                        fallback_counts[heads - 1] += 1;
                        heads - 1
                    }
                };
                let answer = outputs[exit].row(row);
                hits1 += usize::from(in_top_k(answer, label, 1));
                hits3 += usize::from(in_top_k(answer, label, 3));
            }
            seen += batch.size();
        }

        if seen == 0 {
            return Err(Error::EmptyLoader(loader.name().to_string()));
        }
        Ok(EarlyExitReport {
            early_counts,
            fallback_counts,
            top1: 100.0 * hits1 as f32 / seen as f32,
            top3: 100.0 * hits3 as f32 / seen as f32,
            total_time,
        })
    })
}
