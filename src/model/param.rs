//! Trainable parameter storage with an optional pruning mask

use crate::{Error, Result};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a parameter inside a model.
///
/// Ids are never reused, so a handle registered with an optimizer keeps
/// pointing at the same tensor after the model grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(pub usize);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A weight or bias matrix together with its gradient and keep-mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    id: ParamId,
    value: Array2<f32>,
    grad: Array2<f32>,
    /// `1.0` = kept, `0.0` = pruned. `None` until the first pruning round.
    mask: Option<Array2<f32>>,
    prunable: bool,
}

impl Param {
    /// Create a parameter with a zero gradient and no mask.
    pub fn new(id: ParamId, value: Array2<f32>, prunable: bool) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self {
            id,
            value,
            grad,
            mask: None,
            prunable,
        }
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn value(&self) -> &Array2<f32> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Array2<f32> {
        &mut self.value
    }

    pub fn grad(&self) -> &Array2<f32> {
        &self.grad
    }

    pub fn mask(&self) -> Option<&Array2<f32>> {
        self.mask.as_ref()
    }

    /// Whether the pruning strategies may mask this parameter.
    pub fn is_prunable(&self) -> bool {
        self.prunable
    }

    pub fn shape(&self) -> Vec<usize> {
        self.value.shape().to_vec()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Number of entries not removed by the mask.
    pub fn kept(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(self.value.len(), |m| m.iter().filter(|&&k| k != 0.0).count())
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    /// Add `delta` to the accumulated gradient.
    pub fn accumulate_grad(&mut self, delta: &Array2<f32>) -> Result<()> {
        self.check_shape(delta.shape(), "gradient")?;
        self.grad += delta;
        Ok(())
    }

    /// Compose `keep` with the current mask (logical AND) and zero the
    /// removed weights.
    ///
    /// Applying the same mask twice leaves the value bit-identical, and a
    /// weight removed by an earlier mask stays removed.
    pub fn apply_mask(&mut self, keep: &Array2<f32>) -> Result<()> {
        self.check_shape(keep.shape(), "mask")?;
        let combined = match self.mask.take() {
            Some(existing) => {
                let mut combined = existing;
                Zip::from(&mut combined).and(keep).for_each(|c, &k| {
                    if k == 0.0 {
                        *c = 0.0;
                    }
                });
                combined
            }
            None => keep.mapv(|k| if k == 0.0 { 0.0 } else { 1.0 }),
        };
        self.mask = Some(combined);
        self.enforce_mask();
        Ok(())
    }

    /// Zero the value and gradient entries removed by the mask.
    pub fn enforce_mask(&mut self) {
        if let Some(mask) = &self.mask {
            Zip::from(&mut self.value)
                .and(&mut self.grad)
                .and(mask)
                .for_each(|w, g, &m| {
                    if m == 0.0 {
                        *w = 0.0;
                        *g = 0.0;
                    }
                });
        }
    }

    /// Draw fresh values for every entry, then re-apply the mask so pruned
    /// entries stay at zero.
    pub fn reinitialize(&mut self, mut sample: impl FnMut() -> f32) {
        self.value.mapv_inplace(|_| sample());
        self.enforce_mask();
    }

    fn check_shape(&self, actual: &[usize], what: &str) -> Result<()> {
        if self.value.shape() != actual {
            return Err(Error::ShapeMismatch {
                context: format!("{what} for param {}", self.id),
                expected: self.value.shape().to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn param() -> Param {
        Param::new(ParamId(0), array![[1.0, -2.0], [3.0, -4.0]], true)
    }

    #[test]
    fn test_apply_mask_zeroes_pruned() {
        let mut p = param();
        p.apply_mask(&array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        assert_eq!(p.value(), &array![[1.0, 0.0], [0.0, -4.0]]);
        assert_eq!(p.kept(), 2);
    }

    #[test]
    fn test_apply_mask_is_idempotent() {
        let mut p = param();
        let keep = array![[0.0, 1.0], [1.0, 0.0]];
        p.apply_mask(&keep).unwrap();
        let once: Vec<u32> = p.value().iter().map(|v| v.to_bits()).collect();
        p.apply_mask(&keep).unwrap();
        let twice: Vec<u32> = p.value().iter().map(|v| v.to_bits()).collect();
        assert_eq!(once, twice);
        assert_eq!(p.mask(), Some(&keep));
    }

    #[test]
    fn test_masks_compose_with_and() {
        let mut p = param();
        p.apply_mask(&array![[1.0, 0.0], [1.0, 1.0]]).unwrap();
        // second mask tries to keep the already pruned entry
        p.apply_mask(&array![[1.0, 1.0], [0.0, 1.0]]).unwrap();
        assert_eq!(p.mask(), Some(&array![[1.0, 0.0], [0.0, 1.0]]));
        assert_eq!(p.value()[[0, 1]], 0.0);
    }

    #[test]
    fn test_mask_shape_mismatch_is_fatal() {
        let mut p = param();
        let err = p.apply_mask(&array![[1.0, 0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_reinitialize_keeps_pruned_at_zero() {
        let mut p = param();
        p.apply_mask(&array![[1.0, 0.0], [1.0, 0.0]]).unwrap();
        p.reinitialize(|| 7.0);
        assert_eq!(p.value(), &array![[7.0, 0.0], [7.0, 0.0]]);
    }

    #[test]
    fn test_enforce_mask_clears_gradient() {
        let mut p = param();
        p.apply_mask(&array![[1.0, 0.0], [1.0, 1.0]]).unwrap();
        p.accumulate_grad(&array![[0.5, 0.5], [0.5, 0.5]]).unwrap();
        p.enforce_mask();
        assert_eq!(p.grad()[[0, 1]], 0.0);
        assert_eq!(p.grad()[[0, 0]], 0.5);
    }
}
