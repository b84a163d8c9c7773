//! Clustered synthetic classification data

use super::{DataLoader, DatasetBundle};
use crate::{Error, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of the synthetic dataset: one Gaussian-ish cluster per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub num_classes: usize,
    pub input_dim: usize,
    pub train_size: usize,
    pub valid_size: usize,
    pub test_size: usize,
    pub batch_size: usize,
    /// Half-width of the uniform noise around each class center.
    pub noise: f32,
    /// Extra jitter applied to the augmented loaders.
    pub augment_noise: f32,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_classes: 3,
            input_dim: 16,
            train_size: 256,
            valid_size: 64,
            test_size: 64,
            batch_size: 32,
            noise: 0.5,
            augment_noise: 0.1,
            seed: 0,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 || self.input_dim == 0 {
            return Err(Error::config("num_classes and input_dim must be non-zero"));
        }
        if self.train_size == 0 || self.valid_size == 0 || self.test_size == 0 {
            return Err(Error::config("train, valid and test sizes must be non-zero"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be non-zero"));
        }
        if self.noise < 0.0 || self.augment_noise < 0.0 {
            return Err(Error::config("noise levels must be non-negative"));
        }
        Ok(())
    }
}

struct Generator<'a> {
    config: &'a SyntheticConfig,
    centers: Array2<f32>,
    rng: StdRng,
}

impl Generator<'_> {
    fn split(&mut self, n: usize, jitter: f32) -> (Array2<f32>, Vec<usize>) {
        let classes = self.config.num_classes;
        let labels: Vec<usize> = (0..n).map(|i| i % classes).collect();
        let noise = self.config.noise + jitter;
        let mut inputs = Array2::zeros((n, self.config.input_dim));
        for (row, &label) in labels.iter().enumerate() {
            for col in 0..self.config.input_dim {
                let offset = if noise > 0.0 {
                    self.rng.random_range(-noise..noise)
                } else {
                    0.0
                };
                inputs[[row, col]] = self.centers[[label, col]] + offset;
            }
        }
        (inputs, labels)
    }
}

/// Build train, augmented train, validation (plain and augmented) and test
/// loaders from class clusters.
pub fn synthetic_bundle(config: &SyntheticConfig) -> Result<DatasetBundle> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let centers = Array2::from_shape_fn((config.num_classes, config.input_dim), |_| {
        rng.random_range(-2.0f32..2.0)
    });
    let mut generator = Generator {
        config,
        centers,
        rng,
    };

    let batch = config.batch_size;
    let (x, y) = generator.split(config.train_size, 0.0);
    let train = DataLoader::from_examples("train", x, y, batch)?;
    let (x, y) = generator.split(config.train_size, config.augment_noise);
    let aug_train = DataLoader::from_examples("aug_train", x, y, batch)?;
    let (x, y) = generator.split(config.valid_size, 0.0);
    let valid = DataLoader::from_examples("valid", x, y, batch)?;
    let (x, y) = generator.split(config.valid_size, config.augment_noise);
    let aug_valid = DataLoader::from_examples("aug_valid", x, y, batch)?;
    let (x, y) = generator.split(config.test_size, 0.0);
    let test = DataLoader::from_examples("test", x, y, batch)?;

    Ok(DatasetBundle {
        train,
        aug_train,
        valid,
        aug_valid,
        test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_sizes() {
        let config = SyntheticConfig {
            train_size: 32,
            valid_size: 10,
            test_size: 12,
            batch_size: 8,
            ..SyntheticConfig::default()
        };
        let bundle = synthetic_bundle(&config).unwrap();
        assert_eq!(bundle.train.num_examples(), 32);
        assert_eq!(bundle.train.len(), 4);
        assert_eq!(bundle.aug_train.num_examples(), 32);
        assert_eq!(bundle.valid.num_examples(), 10);
        assert_eq!(bundle.test.len(), 2);
        assert_eq!(bundle.train_loader(true).name(), "aug_train");
        assert_eq!(bundle.valid_loader(false).name(), "valid");
    }

    #[test]
    fn test_bundle_is_deterministic() {
        let config = SyntheticConfig::default();
        let a = synthetic_bundle(&config).unwrap();
        let b = synthetic_bundle(&config).unwrap();
        let first_a = a.train.iter().next().unwrap();
        let first_b = b.train.iter().next().unwrap();
        assert_eq!(first_a, first_b);
    }

    #[test]
    fn test_labels_are_balanced() {
        let bundle = synthetic_bundle(&SyntheticConfig::default()).unwrap();
        let mut counts = [0usize; 3];
        for batch in &bundle.train {
            for &label in &batch.labels {
                counts[label] += 1;
            }
        }
        assert!(counts.iter().all(|&c| c >= 85));
    }

    #[test]
    fn test_invalid_config() {
        let config = SyntheticConfig {
            batch_size: 0,
            ..SyntheticConfig::default()
        };
        assert!(synthetic_bundle(&config).is_err());
    }
}
