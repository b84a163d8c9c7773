//! Train command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, TrainArgs};
use crate::config::{load_spec, train_from_spec, SdnSpec};
use crate::model::SdnModel;

/// Apply command-line overrides to a loaded spec
pub fn apply_overrides(spec: &mut SdnSpec, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        spec.training.epochs = epochs;
    }
    if let Some(output) = &args.output {
        spec.output = Some(output.clone());
    }
    if let Some(seed) = args.seed {
        spec.model.seed = seed;
        spec.data.seed = seed;
    }
}

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("sdn-grow: training from {}", args.config.display()),
    );

    let mut spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);

    let (model, outcome) = train_from_spec(&spec).map_err(|e| format!("Training error: {e}"))?;
    let metrics = &outcome.metrics;

    log(level, LogLevel::Normal, "Training complete!");
    log(
        level,
        LogLevel::Normal,
        &format!("  Heads: {}", model.num_output()),
    );
    match outcome.best() {
        Ok(best) => {
            log(level, LogLevel::Normal, &format!("  Best epoch: {}", best.epoch));
            log(
                level,
                LogLevel::Normal,
                &format!("  Best test top-1: {:?}", metrics.test_top1_acc),
            );
        }
        Err(e) => log(level, LogLevel::Normal, &format!("  Warning: {e}")),
    }
    log(
        level,
        LogLevel::Normal,
        &format!("  Final test top-1: {:?}", metrics.final_test_top1_acc),
    );
    if let Some(path) = &spec.output {
        log(level, LogLevel::Verbose, &format!("  Metrics: {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_overrides_replace_spec_values() {
        let yaml = "model:\n  input_dim: 4\noptimizer:\n  lr: 0.1\n";
        let mut spec: SdnSpec = serde_yaml::from_str(yaml).unwrap();
        let args = TrainArgs {
            config: PathBuf::from("run.yaml"),
            epochs: Some(3),
            output: Some(PathBuf::from("out.json")),
            seed: Some(9),
        };
        apply_overrides(&mut spec, &args);
        assert_eq!(spec.training.epochs, 3);
        assert_eq!(spec.output, Some(PathBuf::from("out.json")));
        assert_eq!(spec.model.seed, 9);
        assert_eq!(spec.data.seed, 9);
    }
}
