//! SDN training
//!
//! - [`coeffs`]: annealed per-head loss coefficients
//! - [`loss`]: multi-head cross entropy with logits gradients
//! - [`run_epoch`]: one epoch of training plus per-head evaluation
//! - [`CheckpointSelector`]: best checkpoint under the sum or weighted policy
//! - [`SdnTrainer`]: the growth/prune controller
//!
//! # Example
//!
//! ```no_run
//! use sdn_grow::data::{synthetic_bundle, SyntheticConfig};
//! use sdn_grow::model::{MlpSdn, MlpSdnConfig};
//! use sdn_grow::optim::{MultiStepLR, SGD};
//! use sdn_grow::prune::PruneType;
//! use sdn_grow::train::{SdnTrainer, TrainParams};
//!
//! let data = synthetic_bundle(&SyntheticConfig::default())?;
//! let mut model = MlpSdn::new(MlpSdnConfig::default().with_pruning(0.5))?;
//!
//! let params = TrainParams::default()
//!     .with_epochs(10)
//!     .with_epoch_growth(vec![2, 4, 6])
//!     .with_epoch_prune(vec![1, 3, 5, 7, 8])
//!     .with_prune_type(PruneType::Iterative)
//!     .with_min_ratio(vec![0.5, 0.4, 0.3, 0.2]);
//!
//! let mut trainer = SdnTrainer::new(
//!     Box::new(SGD::new(0.1, 0.9, 5e-4)),
//!     Box::new(MultiStepLR::new(0.1, vec![4], vec![0.1])?),
//!     params,
//! )?;
//! let outcome = trainer.run(&mut model, &data)?;
//! let best = outcome.best()?;
//! println!("best epoch {} with {:?}", best.epoch, best.accuracies);
//! # Ok::<(), sdn_grow::Error>(())
//! ```

mod checkpoint;
pub mod coeffs;
mod controller;
mod epoch;
pub mod loss;
mod metrics;
mod params;

pub use checkpoint::{positional_weights, BestCheckpoint, CheckpointSelector, SelectionPolicy};
pub use coeffs::{current_coeffs, max_coeffs};
pub use controller::{SdnTrainer, TrainOutcome};
pub use epoch::{run_epoch, sdn_training_step, EpochPlan};
pub use loss::{cross_entropy, ic_only_loss, sdn_loss, softmax_rows, SdnLoss};
pub use metrics::{EpochSummary, MetricsRecord};
pub use params::{GrowthSchedule, TrainParams};
