// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Every flag of the trainer. Hyperparameters live in the YAML
// config; these flags only pick files, directories and modes.
//
// clap's derive macros generate --help, error messages for bad
// values and type conversion. Multi-character short flags are
// not expressible in clap, so `-ms` / `-sd` become the long
// aliases `--ms` / `--sd`.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::Args;
use std::path::PathBuf;

use crate::application::{evaluate_use_case::EnsembleOptions, train_use_case::RunOptions};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the YAML experiment config
    #[arg(long, default_value = "configs/pretrain.yaml")]
    pub config: PathBuf,

    /// Checkpoint directory read for resume / evaluate
    #[arg(short = 'c', long, default_value = "checkpoint")]
    pub checkpoint: PathBuf,

    /// Directory holding the pretrained checkpoint to finetune from
    #[arg(short = 'p', long, default_value = "checkpoint")]
    pub pretrained: PathBuf,

    /// Checkpoint file (inside --checkpoint) to evaluate
    #[arg(short = 'e', long)]
    pub evaluate: Option<String>,

    /// Pretrained checkpoint file to finetune from
    #[arg(long, visible_alias = "ms", default_value = "latest_epoch.bin")]
    pub selection: String,

    /// Random seed for the backend and the data shuffle
    #[arg(long, visible_alias = "sd", default_value_t = 654262)]
    pub seed: u64,

    /// Write checkpoints here instead of --checkpoint
    #[arg(long)]
    pub new_checkpoint: Option<PathBuf>,

    /// Checkpoint file used by --resume / --eval-only
    #[arg(long)]
    pub checkpoint_file: Option<String>,

    /// Data loading workers
    #[arg(long, default_value_t = 8)]
    pub num_cpus: usize,

    /// Resume from --checkpoint-file (default latest_epoch.bin)
    #[arg(long)]
    pub resume: bool,

    /// Only evaluate --checkpoint-file (default best_epoch.bin)
    #[arg(long)]
    pub eval_only: bool,

    /// Use the `_refine` checkpoint slots
    #[arg(long)]
    pub refine: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EnsembleArgs {
    /// Checkpoint file to ensemble (repeatable)
    #[arg(long = "ensemble", value_name = "FILENAME")]
    pub members: Vec<String>,

    /// Ensemble every snapshot in --checkpoint
    #[arg(long = "ensemble-all", conflicts_with = "members")]
    pub all: bool,
}

impl EnsembleArgs {
    pub fn requested(&self) -> bool {
        self.all || !self.members.is_empty()
    }
}

/// Convert CLI RunArgs into the application-layer RunOptions.
/// This is the boundary between Layer 1 and Layer 2;
/// the application layer never sees clap types.
impl From<RunArgs> for RunOptions {
    fn from(a: RunArgs) -> Self {
        RunOptions {
            config:          a.config,
            checkpoint:      a.checkpoint,
            pretrained:      a.pretrained,
            evaluate:        a.evaluate,
            selection:       a.selection,
            seed:            a.seed,
            new_checkpoint:  a.new_checkpoint,
            checkpoint_file: a.checkpoint_file,
            num_cpus:        a.num_cpus,
            resume:          a.resume,
            eval_only:       a.eval_only,
            refine:          a.refine,
        }
    }
}

impl EnsembleArgs {
    pub fn into_options(self, run: &RunArgs) -> EnsembleOptions {
        EnsembleOptions {
            config:     run.config.clone(),
            checkpoint: run.checkpoint.clone(),
            members:    self.members,
            all:        self.all,
        }
    }
}
