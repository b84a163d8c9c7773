//! Best-checkpoint selection over per-head accuracy vectors

use crate::model::SdnModel;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How two accuracy vectors are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Plain sum of every head's accuracy.
    Sum,
    /// Positional weights `(i + 1) / n`, favoring deeper heads.
    #[default]
    Weighted,
}

impl SelectionPolicy {
    /// Scalar score of `accuracies` under this policy.
    pub fn score(&self, accuracies: &[f32]) -> Result<f32> {
        if accuracies.is_empty() {
            return Err(Error::config("cannot score an empty accuracy vector"));
        }
        Ok(match self {
            SelectionPolicy::Sum => accuracies.iter().sum(),
            SelectionPolicy::Weighted => positional_weights(accuracies.len())
                .iter()
                .zip(accuracies)
                .map(|(w, a)| w * a)
                .sum(),
        })
    }

    /// True when `candidate` strictly beats `stored`.
    pub fn improves(&self, candidate: &[f32], stored: &[f32]) -> Result<bool> {
        if *self == SelectionPolicy::Weighted && candidate.len() != stored.len() {
            return Err(Error::config(format!(
                "weighted selection compares {} heads against {}",
                candidate.len(),
                stored.len()
            )));
        }
        Ok(self.score(candidate)? > self.score(stored)?)
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Sum => f.write_str("sum"),
            SelectionPolicy::Weighted => f.write_str("weighted"),
        }
    }
}

/// `[(1/n), (2/n), ..., 1]`; `[0.25, 0.5, 0.75, 1.0]` for four heads.
pub fn positional_weights(n: usize) -> Vec<f32> {
    (1..=n).map(|i| i as f32 / n as f32).collect()
}

/// Deep copy of the winning model together with why it won.
#[derive(Debug, Clone)]
pub struct BestCheckpoint<S> {
    pub snapshot: S,
    pub accuracies: Vec<f32>,
    pub epoch: usize,
}

/// Keeps the best checkpoint seen so far.
#[derive(Debug, Clone)]
pub struct CheckpointSelector<S> {
    policy: SelectionPolicy,
    best: Option<BestCheckpoint<S>>,
}

impl<S> CheckpointSelector<S> {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy, best: None }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn best(&self) -> Option<&BestCheckpoint<S>> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<BestCheckpoint<S>> {
        self.best
    }

    /// Accept `accuracies` if it is the first candidate or strictly better
    /// than the stored one; `snapshot` is only taken on acceptance.
    pub fn consider(
        &mut self,
        accuracies: &[f32],
        epoch: usize,
        snapshot: impl FnOnce() -> S,
    ) -> Result<bool> {
        let accept = match &self.best {
            None => {
                self.policy.score(accuracies)?;
                true
            }
            Some(best) => self.policy.improves(accuracies, &best.accuracies)?,
        };
        if accept {
            self.best = Some(BestCheckpoint {
                snapshot: snapshot(),
                accuracies: accuracies.to_vec(),
                epoch,
            });
        }
        Ok(accept)
    }

    /// [`Self::consider`] with a snapshot of `model`.
    pub fn offer<M>(&mut self, model: &M, accuracies: &[f32], epoch: usize) -> Result<bool>
    where
        M: SdnModel<Snapshot = S>,
    {
        self.consider(accuracies, epoch, || model.snapshot())
    }
}
