// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// One command, two workflows:
//   1. training run — fresh, resumed, finetuned, or a single
//      evaluation (--evaluate / --eval-only)
//   2. ensemble     — --ensemble FILE ... or --ensemble-all
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod args;

use anyhow::Result;
use clap::Parser;
use args::{EnsembleArgs, RunArgs};

/// The main CLI struct; clap reads the fields and generates
/// argument parsing code via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "pose-lift-trainer",
    version = "0.1.0",
    about = "Train and evaluate a 2D-to-3D pose lifting network on H36M."
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub ensemble: EnsembleArgs,
}

impl Cli {
    /// Dispatch to the matching use case. The CLI layer only routes.
    pub fn run(self) -> Result<()> {
        if self.ensemble.requested() {
            self.run_ensemble()
        } else {
            self.run_train()
        }
    }

    fn run_train(self) -> Result<()> {
        use crate::application::train_use_case::{RunOutcome, TrainUseCase};

        tracing::info!("Checkpoint directory: {}", self.run.checkpoint.display());
        match TrainUseCase::new(self.run.into()).execute()? {
            RunOutcome::Trained(state) => {
                println!("Training complete. Best e1: {:.6}", state.min_loss);
            }
            RunOutcome::Evaluated(report) => {
                println!("Evaluation complete. e1 {:.6} e2 {:.6}", report.mpjpe, report.p_mpjpe);
            }
        }
        Ok(())
    }

    fn run_ensemble(self) -> Result<()> {
        use crate::application::evaluate_use_case::EvaluateUseCase;

        let opts = self.ensemble.into_options(&self.run);
        let outcome = EvaluateUseCase::new(opts).execute()?;
        println!("Ensembled {} checkpoints.", outcome.members.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::RunOptions;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["pose-lift-trainer"]).unwrap();
        assert!(!cli.ensemble.requested());
        let opts: RunOptions = cli.run.into();
        assert_eq!(opts.selection, "latest_epoch.bin");
        assert_eq!(opts.seed, 654262);
        assert_eq!(opts.num_cpus, 8);
        assert_eq!(opts.write_dir(), PathBuf::from("checkpoint"));
    }

    #[test]
    fn test_short_flags_and_aliases() {
        let cli = Cli::try_parse_from([
            "pose-lift-trainer", "--config", "cfg.yaml", "-c", "ck", "-p", "pre",
            "-e", "best_epoch.bin", "--ms", "epoch_9.bin", "--sd", "7",
            "--new-checkpoint", "out", "--refine",
        ])
        .unwrap();
        let opts: RunOptions = cli.run.into();
        assert_eq!(opts.config, PathBuf::from("cfg.yaml"));
        assert_eq!(opts.checkpoint, PathBuf::from("ck"));
        assert_eq!(opts.pretrained, PathBuf::from("pre"));
        assert_eq!(opts.evaluate.as_deref(), Some("best_epoch.bin"));
        assert_eq!(opts.selection, "epoch_9.bin");
        assert_eq!(opts.seed, 7);
        assert_eq!(opts.write_dir(), PathBuf::from("out"));
        assert!(opts.refine);
    }

    #[test]
    fn test_ensemble_flags() {
        let cli = Cli::try_parse_from([
            "pose-lift-trainer", "-c", "ck", "--ensemble", "a.bin", "--ensemble", "b.bin",
        ])
        .unwrap();
        assert!(cli.ensemble.requested());
        let opts = cli.ensemble.clone().into_options(&cli.run);
        assert_eq!(opts.members, vec!["a.bin", "b.bin"]);
        assert_eq!(opts.checkpoint, PathBuf::from("ck"));

        let cli = Cli::try_parse_from(["pose-lift-trainer", "--ensemble-all"]).unwrap();
        assert!(cli.ensemble.all);
        assert!(Cli::try_parse_from(["pose-lift-trainer", "--ensemble-all", "--ensemble", "a.bin"]).is_err());
    }
}
