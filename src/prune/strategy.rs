//! Pruning strategies selected once from configuration

use super::mask::{apply_masks, sparsity, Mask, MaskSet};
use super::saliency::{keep_top, snip_scores, Candidate};
use crate::data::Batch;
use crate::model::{ParamId, SdnModel};
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Pruning mode.
///
/// The numeric names used by older run configurations (`"0"`, `"1"`, `"2"`)
/// are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PruneType {
    /// One block per prune epoch, shallowest first.
    #[serde(alias = "0", alias = "single-block")]
    SingleBlock,
    /// One ranking over every prunable weight.
    #[serde(alias = "1")]
    Global,
    /// Every unlocked block, with a per-block ratio that tightens each round.
    #[default]
    #[serde(alias = "2")]
    Iterative,
}

impl PruneType {
    /// Get the display name for this mode.
    pub fn display_name(&self) -> &'static str {
        match self {
            PruneType::SingleBlock => "single-block",
            PruneType::Global => "global",
            PruneType::Iterative => "iterative",
        }
    }
}

impl fmt::Display for PruneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for PruneType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "single_block" | "single-block" => Ok(PruneType::SingleBlock),
            "1" | "global" => Ok(PruneType::Global),
            "2" | "iterative" => Ok(PruneType::Iterative),
            other => Err(Error::config(format!("unknown prune type '{other}'"))),
        }
    }
}

/// Per-block step bookkeeping for iterative pruning.
///
/// Block `b` becomes prunable at `unlock_epochs[b]`. Its keep ratio at its
/// `step`-th prune epoch (0-based) out of `total` is
/// `1 - (1 - min_ratio[b]) * (step + 1) / total`, reaching `min_ratio[b]`
/// on the last scheduled prune epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct IterativeSchedule {
    min_ratio: Vec<f32>,
    unlock_epochs: Vec<usize>,
    prune_epochs: Vec<usize>,
}

impl IterativeSchedule {
    /// `initial_blocks` blocks are prunable from epoch 1; one more block
    /// unlocks at each growth epoch.
    pub fn new(
        min_ratio: Vec<f32>,
        initial_blocks: usize,
        epoch_growth: &[usize],
        epoch_prune: &[usize],
    ) -> Self {
        let mut unlock_epochs = vec![1; initial_blocks.max(1)];
        unlock_epochs.extend_from_slice(epoch_growth);
        let mut prune_epochs = epoch_prune.to_vec();
        prune_epochs.sort_unstable();
        prune_epochs.dedup();
        Self {
            min_ratio,
            unlock_epochs,
            prune_epochs,
        }
    }

    pub fn unlock_epoch(&self, block: usize) -> Option<usize> {
        self.unlock_epochs.get(block).copied()
    }

    /// `(step, total)` for `block` at `epoch`, or `None` while the block is
    /// not yet prunable.
    pub fn steps(&self, block: usize, epoch: usize) -> Option<(usize, usize)> {
        let unlock = self.unlock_epoch(block)?;
        if unlock > epoch {
            return None;
        }
        let total = self.prune_epochs.iter().filter(|&&e| e >= unlock).count();
        let done = self
            .prune_epochs
            .iter()
            .filter(|&&e| e >= unlock && e <= epoch)
            .count();
        if done == 0 || total == 0 {
            return None;
        }
        Some((done - 1, total))
    }

    /// Keep ratio for `block` at `epoch`, `None` while the block is locked.
    pub fn target_ratio(&self, block: usize, epoch: usize) -> Result<Option<f32>> {
        let Some((step, total)) = self.steps(block, epoch) else {
            return Ok(None);
        };
        let min = self.min_ratio.get(block).copied().ok_or_else(|| {
            Error::config(format!(
                "min_ratio has {} entries, block {block} needs one",
                self.min_ratio.len()
            ))
        })?;
        if step + 1 == total {
            return Ok(Some(min));
        }
        Ok(Some(1.0 - (1.0 - min) * (step + 1) as f32 / total as f32))
    }
}

/// Pruning strategy.
///
/// Every variant scores weights with [`snip_scores`] and differs only in
/// which weights compete with each other and at what keep ratio.
#[derive(Debug, Clone, PartialEq)]
pub enum PruningStrategy {
    SingleBlock {
        /// Block pruned by the next invocation.
        next_block: usize,
        keep_ratio: f32,
        reinit: bool,
    },
    Global {
        keep_ratio: f32,
    },
    Iterative {
        schedule: IterativeSchedule,
        reinit: bool,
    },
}

impl PruningStrategy {
    pub fn single_block(keep_ratio: f32, reinit: bool) -> Self {
        Self::SingleBlock {
            next_block: 0,
            keep_ratio,
            reinit,
        }
    }

    pub fn global(keep_ratio: f32) -> Self {
        Self::Global { keep_ratio }
    }

    pub fn iterative(schedule: IterativeSchedule, reinit: bool) -> Self {
        Self::Iterative { schedule, reinit }
    }

    pub fn prune_type(&self) -> PruneType {
        match self {
            Self::SingleBlock { .. } => PruneType::SingleBlock,
            Self::Global { .. } => PruneType::Global,
            Self::Iterative { .. } => PruneType::Iterative,
        }
    }

    fn reinit(&self) -> bool {
        match self {
            Self::SingleBlock { reinit, .. } | Self::Iterative { reinit, .. } => *reinit,
            Self::Global { .. } => false,
        }
    }

    /// Masks this strategy would apply at `epoch`, without touching weights.
    pub fn compute_masks<M: SdnModel>(&self, model: &mut M, batch: &Batch, epoch: usize) -> Result<MaskSet> {
        let scores = snip_scores(model, batch)?;
        let mut masks = MaskSet::new();
        match self {
            Self::SingleBlock {
                next_block,
                keep_ratio,
                ..
            } => {
                let available = model.num_blocks();
                if *next_block >= available {
                    return Err(Error::InvalidBlock {
                        block: *next_block,
                        available,
                    });
                }
                let ids = model.block_params(*next_block)?;
                masks.extend(rank_group(model, &scores, &ids, *keep_ratio)?);
            }
            Self::Global { keep_ratio } => {
                let mut ids = Vec::new();
                for block in 0..model.num_blocks() {
                    ids.extend(model.block_params(block)?);
                }
                masks.extend(rank_group(model, &scores, &ids, *keep_ratio)?);
            }
            Self::Iterative { schedule, .. } => {
                for block in 0..model.num_blocks() {
                    let Some(ratio) = schedule.target_ratio(block, epoch)? else {
                        continue;
                    };
                    let ids = model.block_params(block)?;
                    masks.extend(rank_group(model, &scores, &ids, ratio)?);
                }
            }
        }
        Ok(masks)
    }

    /// Apply `masks`, then redraw the surviving weights when re-initialization
    /// is enabled.
    pub fn apply_masks<M: SdnModel>(&self, model: &mut M, masks: &MaskSet) -> Result<()> {
        apply_masks(model, masks)?;
        if self.reinit() && !masks.is_empty() {
            model.reinitialize(&masks.params())?;
        }
        Ok(())
    }

    /// Compute and apply one round of masks; advances the block counter of
    /// the single-block strategy.
    pub fn prune<M: SdnModel>(&mut self, model: &mut M, batch: &Batch, epoch: usize) -> Result<MaskSet> {
        let masks = self.compute_masks(model, batch, epoch)?;
        self.apply_masks(model, &masks)?;
        if let Self::SingleBlock { next_block, .. } = self {
            *next_block += 1;
        }
        info!(
            epoch,
            strategy = %self.prune_type(),
            masks = masks.len(),
            sparsity = sparsity(model),
            "pruned model"
        );
        Ok(masks)
    }
}

fn rank_group<M: SdnModel>(
    model: &M,
    scores: &HashMap<ParamId, Array2<f32>>,
    ids: &[ParamId],
    ratio: f32,
) -> Result<Vec<Mask>> {
    let params = model.params();
    let mut group = Vec::with_capacity(ids.len());
    for &id in ids {
        let scores = scores.get(&id).ok_or(Error::UnknownParam(id.0))?;
        let current = params
            .iter()
            .find(|p| p.id() == id)
            .ok_or(Error::UnknownParam(id.0))?
            .mask();
        group.push(Candidate {
            param: id,
            scores,
            current,
        });
    }
    Ok(keep_top(&group, ratio))
}
