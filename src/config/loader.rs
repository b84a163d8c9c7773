//! Main entry points for YAML-based training

use super::schema::SdnSpec;
use crate::data::synthetic_bundle;
use crate::model::{MlpSdn, MlpSdnState, SdnModel};
use crate::optim::Optimizer;
use crate::prune::PruneType;
use crate::train::{GrowthSchedule, SdnTrainer, TrainOutcome};
use crate::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Read and parse a YAML run specification.
pub fn load_spec<P: AsRef<Path>>(config_path: P) -> Result<SdnSpec> {
    let path = config_path.as_ref();
    let yaml = fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read config file {}: {e}", path.display())))?;
    Ok(serde_yaml::from_str(&yaml)?)
}

/// Check every section and the cross-section constraints.
pub fn validate_spec(spec: &SdnSpec) -> Result<()> {
    spec.model.validate()?;
    spec.data_config().validate()?;
    if !(spec.optimizer.lr > 0.0 && spec.optimizer.lr <= 1.0) {
        return Err(Error::config(format!("learning rate {} outside (0, 1]", spec.optimizer.lr)));
    }
    spec.optimizer.build()?;
    spec.scheduler.build(spec.optimizer.lr)?;

    let training = &spec.training;
    training.validate()?;
    let flags = &spec.model.flags;
    let blocks = spec.model.num_ics + 1;
    if flags.prune
        && training.prune_type == PruneType::Iterative
        && !training.epoch_prune.is_empty()
        && training.min_ratio.len() < blocks
    {
        return Err(Error::config(format!(
            "iterative pruning needs {blocks} min_ratio entries, got {}",
            training.min_ratio.len()
        )));
    }
    if training.growth == GrowthSchedule::Scheduled {
        let room = blocks - spec.model.initial_heads;
        if training.epoch_growth.len() > room {
            return Err(Error::config(format!(
                "epoch_growth schedules {} growths but only {room} heads are left to grow",
                training.epoch_growth.len()
            )));
        }
    }
    Ok(())
}

/// Build the model, data and optimizer described by `spec` and run it.
pub fn train_from_spec(spec: &SdnSpec) -> Result<(MlpSdn, TrainOutcome<MlpSdnState>)> {
    validate_spec(spec)?;
    let data = synthetic_bundle(&spec.data_config())?;
    let mut model = MlpSdn::new(spec.model.clone())?;

    let mut optimizer = spec.optimizer.build()?;
    optimizer.add_param_group(model.trainable_params());
    let scheduler = spec.scheduler.build(spec.optimizer.lr)?;

    let mut trainer = SdnTrainer::new(Box::new(optimizer), scheduler, spec.training.clone())?;
    let outcome = trainer.run(&mut model, &data)?;

    if let Some(path) = &spec.output {
        outcome.metrics.save_json(path)?;
        info!(path = %path.display(), "metrics written");
    }
    Ok((model, outcome))
}

/// Train from a YAML configuration file
///
/// Loads and validates the file, builds the run and executes it.
///
/// ```no_run
/// use sdn_grow::config::train_from_yaml;
///
/// let (_model, outcome) = train_from_yaml("config.yaml")?;
/// println!("best epoch: {:?}", outcome.metrics.best_model_epoch);
/// # Ok::<(), sdn_grow::Error>(())
/// ```
pub fn train_from_yaml<P: AsRef<Path>>(config_path: P) -> Result<(MlpSdn, TrainOutcome<MlpSdnState>)> {
    let spec = load_spec(config_path)?;
    train_from_spec(&spec)
}
