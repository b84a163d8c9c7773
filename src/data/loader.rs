//! In-memory data loaders

use super::Batch;
use crate::{Error, Result};
use ndarray::{concatenate, Array2, ArrayView2, Axis};

/// A fixed sequence of batches with a nominal batch size.
///
/// Every batch holds `batch_size` examples except possibly the last one.
#[derive(Debug, Clone)]
pub struct DataLoader {
    name: String,
    batches: Vec<Batch>,
    batch_size: usize,
}

impl DataLoader {
    /// Wrap pre-built batches.
    pub fn new(name: impl Into<String>, batches: Vec<Batch>, batch_size: usize) -> Self {
        Self {
            name: name.into(),
            batches,
            batch_size,
        }
    }

    /// Split a full example matrix into batches of `batch_size` rows.
    pub fn from_examples(
        name: impl Into<String>,
        inputs: Array2<f32>,
        labels: Vec<usize>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch_size must be non-zero"));
        }
        let all = Batch::new(inputs, labels)?;
        let mut batches = Vec::with_capacity(all.size().div_ceil(batch_size));
        let mut start = 0;
        while start < all.size() {
            let end = (start + batch_size).min(all.size());
            batches.push(Batch {
                inputs: all
                    .inputs
                    .slice_axis(Axis(0), (start..end).into())
                    .to_owned(),
                labels: all.labels[start..end].to_vec(),
            });
            start = end;
        }
        Ok(Self::new(name, batches, batch_size))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nominal batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn num_examples(&self) -> usize {
        self.batches.iter().map(Batch::size).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Batch> {
        self.batches.iter()
    }

    /// One batch made of the first `n` examples across batch boundaries.
    pub fn take_examples(&self, n: usize) -> Result<Batch> {
        let mut views: Vec<ArrayView2<'_, f32>> = Vec::new();
        let mut labels = Vec::with_capacity(n);
        for batch in &self.batches {
            let remaining = n - labels.len();
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.size());
            views.push(batch.inputs.slice_axis(Axis(0), (0..take).into()));
            labels.extend_from_slice(&batch.labels[..take]);
        }
        if labels.is_empty() {
            return Err(Error::EmptyLoader(self.name.clone()));
        }
        let inputs = concatenate(Axis(0), &views)
            .map_err(|e| Error::config(format!("cannot assemble batch from '{}': {e}", self.name)))?;
        Batch::new(inputs, labels)
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = &'a Batch;
    type IntoIter = std::slice::Iter<'a, Batch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.iter()
    }
}

/// The loaders an SDN run reads from.
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    pub train: DataLoader,
    pub aug_train: DataLoader,
    pub valid: DataLoader,
    pub aug_valid: DataLoader,
    pub test: DataLoader,
}

impl DatasetBundle {
    /// Training loader, augmented or plain.
    pub fn train_loader(&self, augment: bool) -> &DataLoader {
        if augment {
            &self.aug_train
        } else {
            &self.train
        }
    }

    /// Validation loader, augmented or plain.
    pub fn valid_loader(&self, augment: bool) -> &DataLoader {
        if augment {
            &self.aug_valid
        } else {
            &self.valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(n: usize, batch_size: usize) -> DataLoader {
        let inputs = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32);
        let labels = (0..n).map(|i| i % 3).collect();
        DataLoader::from_examples("train", inputs, labels, batch_size).unwrap()
    }

    #[test]
    fn test_from_examples_short_last_batch() {
        let loader = loader(10, 4);
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.num_examples(), 10);
        let sizes: Vec<usize> = loader.iter().map(Batch::size).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(loader.batch_size(), 4);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = DataLoader::from_examples("x", Array2::zeros((2, 2)), vec![0, 1], 0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_take_examples_crosses_batches() {
        let loader = loader(10, 4);
        let batch = loader.take_examples(6).unwrap();
        assert_eq!(batch.size(), 6);
        assert_eq!(batch.labels, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(batch.inputs[[5, 1]], 11.0);
    }

    #[test]
    fn test_take_examples_from_empty_loader() {
        let empty = DataLoader::new("empty", Vec::new(), 8);
        assert!(matches!(
            empty.take_examples(4),
            Err(Error::EmptyLoader(name)) if name == "empty"
        ));
    }
}
