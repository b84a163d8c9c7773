//! Evaluation passes over a loader
//!
//! - [`sdn_test`] / [`cnn_test`]: top-1/top-3 accuracy per head, or of the
//!   final head alone
//! - [`sdn_detailed_results`] / [`cnn_confidence`]: per-instance
//!   correctness, predictions and confidence
//! - [`sdn_confusion`]: pairwise disagreement between heads
//! - [`sdn_test_early_exits`]: confidence-threshold early-exit inference
//!
//! Every pass runs the model in eval mode and restores its previous mode.

mod accuracy;
mod confusion;
mod detailed;
mod early_exit;

pub use accuracy::{cnn_test, in_top_k, sdn_test, topk_hits, HeadAccuracy, TopK};
pub use confusion::{confusion_scores, sdn_confusion, sdn_confusion_stats, ConfusionResults, ConfusionStats};
pub use detailed::{cnn_confidence, sdn_detailed_results, ConfidenceReport, HeadDetail};
pub use early_exit::{sdn_test_early_exits, EarlyExitReport};

use crate::model::SdnModel;
use crate::Result;

pub(crate) fn with_eval_mode<M, T>(model: &mut M, pass: impl FnOnce(&mut M) -> Result<T>) -> Result<T>
where
    M: SdnModel,
{
    let mode = model.mode();
    model.eval();
    let out = pass(model);
    model.set_mode(mode);
    out
}
