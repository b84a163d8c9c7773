//! # sdn-grow
//!
//! Training and evaluation of shallow-deep networks (SDNs): classifiers with
//! early-exit internal classifier (IC) heads, grown head by head during
//! training and pruned with SNIP-style gradient saliency.
//!
//! ## Layout
//!
//! - [`model`]: the model capability contract ([`model::SdnModel`]) and a
//!   dense reference implementation ([`model::MlpSdn`])
//! - [`data`]: batches, loaders and the dataset bundle
//! - [`optim`]: SGD with parameter groups and learning rate schedulers
//! - [`prune`]: masks, saliency scoring and the pruning strategies
//! - [`train`]: loss coefficients, the epoch routine, checkpoint selection
//!   and the growth/prune controller
//! - [`eval`]: accuracy, confidence, confusion and early-exit passes
//! - [`config`]: YAML configuration and the end-to-end entry point
//!
//! ## Example
//!
//! ```no_run
//! use sdn_grow::data::{synthetic_bundle, SyntheticConfig};
//! use sdn_grow::model::{MlpSdn, MlpSdnConfig, SdnModel};
//! use sdn_grow::optim::{MultiStepLR, Optimizer, SGD};
//! use sdn_grow::train::{SdnTrainer, TrainParams};
//!
//! let data = synthetic_bundle(&SyntheticConfig::default())?;
//! let mut model = MlpSdn::new(MlpSdnConfig::default())?;
//!
//! let mut optimizer = SGD::new(0.1, 0.9, 5e-4);
//! optimizer.add_param_group(model.trainable_params());
//! let scheduler = MultiStepLR::new(0.1, vec![4], vec![0.1])?;
//!
//! let params = TrainParams::default().with_epochs(10).with_epoch_growth(vec![2, 4, 6]);
//! let mut trainer = SdnTrainer::new(Box::new(optimizer), Box::new(scheduler), params)?;
//! let outcome = trainer.run(&mut model, &data)?;
//! println!("best epoch: {:?}", outcome.metrics.best_model_epoch);
//! # Ok::<(), sdn_grow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod model;
pub mod optim;
pub mod prune;
pub mod train;

pub use error::{Error, Result};
