//! SNIP saliency pruning for SDN backbones
//!
//! - [`Mask`] / [`MaskSet`]: keep-masks, composed by AND with earlier rounds
//! - [`snip_scores`]: connection sensitivity `|dL/dw * w|` on one batch
//! - [`PruningStrategy`]: single-block, global and iterative pruning,
//!   selected once from [`PruneType`]
//!
//! # References
//!
//! - Lee, N., et al. (2019). SNIP: Single-shot network pruning based on
//!   connection sensitivity. ICLR.

mod mask;
mod saliency;
mod strategy;

pub use mask::{apply_masks, sparsity, Mask, MaskSet};
pub use saliency::{keep_top, snip_scores, Candidate};
pub use strategy::{IterativeSchedule, PruneType, PruningStrategy};
