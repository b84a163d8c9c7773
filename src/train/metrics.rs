//! Per-epoch training record

use crate::eval::{HeadAccuracy, TopK};
use crate::prune::MaskSet;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything one epoch of the routine produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub lr: f32,
    pub mean_loss: f32,
    pub coeffs: Vec<f32>,
    pub valid: HeadAccuracy,
    pub train: HeadAccuracy,
    pub elapsed: Duration,
}

/// Metric streams of a run.
///
/// Multi-head streams hold one vector per epoch with one entry per head that
/// was active in that epoch, shallowest head first. Accuracies are percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Wall time per epoch in seconds.
    pub epoch_times: Vec<f64>,
    pub lrs: Vec<f32>,
    pub train_losses: Vec<f32>,
    pub coeffs: Vec<Vec<f32>>,
    pub valid_top1_acc: Vec<Vec<f32>>,
    pub valid_top3_acc: Vec<Vec<f32>>,
    pub train_top1_acc: Vec<Vec<f32>>,
    pub train_top3_acc: Vec<Vec<f32>>,
    /// Test accuracy of the best checkpoint; empty when none was captured.
    pub test_top1_acc: Vec<f32>,
    pub test_top3_acc: Vec<f32>,
    /// Test accuracy of the model as it stands after the last epoch.
    pub final_test_top1_acc: Vec<f32>,
    pub final_test_top3_acc: Vec<f32>,
    /// Single-output runs report the final head only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnn_test: Option<TopK>,
    pub best_model_epoch: Option<usize>,
    pub growth_epochs: Vec<usize>,
    /// One entry per pruning round.
    pub masks: Vec<MaskSet>,
}

impl MetricsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_epoch(&mut self, summary: EpochSummary) {
        self.epoch_times.push(summary.elapsed.as_secs_f64());
        self.lrs.push(summary.lr);
        self.train_losses.push(summary.mean_loss);
        self.coeffs.push(summary.coeffs);
        self.valid_top1_acc.push(summary.valid.top1);
        self.valid_top3_acc.push(summary.valid.top3);
        self.train_top1_acc.push(summary.train.top1);
        self.train_top3_acc.push(summary.train.top3);
    }

    /// Number of epochs recorded.
    pub fn epochs(&self) -> usize {
        self.train_losses.len()
    }

    pub fn last_valid_top1(&self) -> Option<&[f32]> {
        self.valid_top1_acc.last().map(Vec::as_slice)
    }

    pub fn set_best_test(&mut self, acc: HeadAccuracy) {
        self.test_top1_acc = acc.top1;
        self.test_top3_acc = acc.top3;
    }

    pub fn set_final_test(&mut self, acc: HeadAccuracy) {
        self.final_test_top1_acc = acc.top1;
        self.final_test_top3_acc = acc.top3;
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(epoch: usize, heads: usize) -> EpochSummary {
        EpochSummary {
            epoch,
            lr: 0.1,
            mean_loss: 1.5,
            coeffs: vec![0.2; heads - 1],
            valid: HeadAccuracy {
                top1: vec![50.0; heads],
                top3: vec![90.0; heads],
            },
            train: HeadAccuracy {
                top1: vec![60.0; heads],
                top3: vec![95.0; heads],
            },
            elapsed: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_record_epoch_appends_every_stream() {
        let mut record = MetricsRecord::new();
        record.record_epoch(summary(1, 1));
        record.record_epoch(summary(2, 2));

        assert_eq!(record.epochs(), 2);
        assert_eq!(record.valid_top1_acc[0].len(), 1);
        assert_eq!(record.valid_top1_acc[1].len(), 2);
        assert_eq!(record.last_valid_top1(), Some(&[50.0, 50.0][..]));
        assert!((record.epoch_times[0] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_json_roundtrip_keeps_missing_best_epoch() {
        let mut record = MetricsRecord::new();
        record.record_epoch(summary(1, 2));
        let json = record.to_json().unwrap();
        assert!(json.contains("\"best_model_epoch\": null"));
        let back: MetricsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_save_json_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        MetricsRecord::new().save_json(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("train_losses"));
    }
}
