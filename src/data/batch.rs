//! Batch data structure

use crate::{Error, Result};
use ndarray::{Array2, Axis};

/// A mini-batch of inputs (`batch x features`) and class labels
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Input features, one row per example
    pub inputs: Array2<f32>,
    /// Class index per example
    pub labels: Vec<usize>,
}

impl Batch {
    /// Create a new batch, checking that every row has a label
    pub fn new(inputs: Array2<f32>, labels: Vec<usize>) -> Result<Self> {
        if inputs.nrows() != labels.len() {
            return Err(Error::ShapeMismatch {
                context: "batch labels".into(),
                expected: vec![inputs.nrows()],
                actual: vec![labels.len()],
            });
        }
        Ok(Self { inputs, labels })
    }

    /// Number of examples in the batch
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// First `n` examples of the batch (all of them if `n` is larger)
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.size());
        Self {
            inputs: self.inputs.slice_axis(Axis(0), (0..n).into()).to_owned(),
            labels: self.labels[..n].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_batch_creation() {
        let batch = Batch::new(array![[1.0, 2.0], [3.0, 4.0]], vec![0, 1]).unwrap();
        assert_eq!(batch.size(), 2);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_batch_label_mismatch() {
        let err = Batch::new(array![[1.0, 2.0]], vec![0, 1]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_batch_head() {
        let batch = Batch::new(array![[1.0], [2.0], [3.0]], vec![0, 1, 2]).unwrap();
        let head = batch.head(2);
        assert_eq!(head.labels, vec![0, 1]);
        assert_eq!(head.inputs, array![[1.0], [2.0]]);
        assert_eq!(batch.head(10).size(), 3);
    }
}
