// ============================================================
// Layer 2 — EvaluateUseCase (checkpoint ensembling)
// ============================================================
// Scores several checkpoints of one directory on the test split
// and combines their per-action errors:
//
//   Step 1: Load the experiment config
//   Step 2: Resolve the member list     (explicit, or every
//                                        snapshot in the directory)
//   Step 3: Load the test split once
//   Step 4: Evaluate each member        (strict load, no autodiff)
//   Step 5: Report the mean and min ensembles

use anyhow::{ensure, Result};
use burn::prelude::*;
use std::path::PathBuf;

use crate::application::{config::ExperimentConfig, train_use_case::TestData};
use crate::domain::ensemble::{EnsembleAccumulator, EnsembleResult};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::EvalBackend;

#[derive(Debug, Clone)]
pub struct EnsembleOptions {
    pub config:     PathBuf,
    pub checkpoint: PathBuf,
    /// Checkpoint files to combine; empty with `all` set
    pub members:    Vec<String>,
    /// Combine every snapshot found in `checkpoint`
    pub all:        bool,
}

impl EnsembleOptions {
    /// Member files, discovering snapshots when `all` is set
    pub fn resolve_members(&self, ckpt: &CheckpointManager) -> Result<Vec<String>> {
        let members = if self.all { ckpt.snapshot_files()? } else { self.members.clone() };
        ensure!(
            !members.is_empty(),
            "no checkpoints to ensemble in '{}'",
            ckpt.dir().display()
        );
        Ok(members)
    }
}

#[derive(Debug, Clone)]
pub struct EnsembleOutcome {
    pub members: Vec<String>,
    pub mean:    EnsembleResult,
    pub min:     EnsembleResult,
}

pub struct EvaluateUseCase {
    opts: EnsembleOptions,
}

impl EvaluateUseCase {
    pub fn new(opts: EnsembleOptions) -> Self {
        Self { opts }
    }

    pub fn execute(&self) -> Result<EnsembleOutcome> {
        // ── Step 1: Load config ─────────────────────────────────────────────
        let cfg = ExperimentConfig::load(&self.opts.config)?;
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        ensemble::<EvalBackend>(&cfg, &self.opts, &device)
    }
}

/// Evaluate every member on backend `B` and combine the results
pub fn ensemble<B: Backend>(cfg: &ExperimentConfig, opts: &EnsembleOptions, device: &B::Device) -> Result<EnsembleOutcome> {
    // ── Step 2: Members ─────────────────────────────────────────────────────
    let ckpt = CheckpointManager::open(&opts.checkpoint);
    let members = opts.resolve_members(&ckpt)?;
    tracing::info!("Ensembling {} checkpoints: {:?}", members.len(), members);

    // ── Step 3: Test data ───────────────────────────────────────────────────
    let test = TestData::<B>::load(cfg, device)?;

    // ── Step 4: Evaluate each member ────────────────────────────────────────
    let mut acc = EnsembleAccumulator::new();
    for name in &members {
        let model = ckpt.load_model(name, cfg.model.init::<B>(device), device)?;
        let report = test.evaluate(cfg, &model)?;
        acc.add(&report)?;
    }

    // ── Step 5: Report ──────────────────────────────────────────────────────
    tracing::info!("Combining {} evaluations", acc.members());
    let mean = acc.mean()?;
    let min  = acc.min()?;
    println!("{}", acc.summary_table()?);
    println!("Ensemble result: e1 {:.6} e2 {:.6}", mean.e1, mean.e2);
    println!("Ensemble2 result: e1 {:.6} e2 {:.6}", min.e1, min.e2);

    Ok(EnsembleOutcome { members, mean, min })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{train_with_config, tests::write_fixture, RunOptions};
    use burn::backend::{Autodiff, NdArray};
    use tempfile::tempdir;

    #[test]
    fn test_empty_member_list_is_rejected() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let opts = EnsembleOptions {
            config:     root.join("config.yaml"),
            checkpoint: root.to_path_buf(),
            members:    vec![],
            all:        true,
        };
        assert!(opts.resolve_members(&CheckpointManager::open(root)).is_err());
    }

    #[test]
    fn test_ensemble_of_periodic_checkpoints() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let mut cfg = write_fixture(root, 4);
        cfg.no_eval = true;
        cfg.checkpoint_frequency = 1;
        let run_opts = RunOptions { checkpoint: root.join("ckpt"), num_cpus: 1, ..RunOptions::default() };
        train_with_config::<Autodiff<NdArray<f32>>>(&cfg, &run_opts, &Default::default()).unwrap();

        let opts = EnsembleOptions {
            config:     root.join("config.yaml"),
            checkpoint: root.join("ckpt"),
            members:    vec![],
            all:        true,
        };
        let out = ensemble::<NdArray<f32>>(&cfg, &opts, &Default::default()).unwrap();
        assert_eq!(out.members, vec!["epoch_0.bin", "epoch_1.bin"]);
        assert_eq!(out.mean.p1.len(), 2);
        assert!(out.min.e1 <= out.mean.e1 + 1e-9);
        assert!(out.min.e2 <= out.mean.e2 + 1e-9);

        // an explicit single member ensembles to itself
        let single = EnsembleOptions { members: vec!["epoch_1.bin".into()], all: false, ..opts };
        let out = ensemble::<NdArray<f32>>(&cfg, &single, &Default::default()).unwrap();
        assert_eq!(out.mean, out.min);
    }
}
