// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores training state using Burn's
// BinFileRecorder (full precision).
//
// What gets saved per checkpoint slot `<stem>.bin`:
//   1. <stem>.bin        — model weights
//   2. <stem>.optim.bin  — AdamW state
//   3. <stem>.meta.json  — next epoch, learning rate, best
//                          error so far, model architecture
//
// The architecture in the meta file lets a finetune run
// rebuild the source model before transplanting its weights.
//
// Slot names:
//   checkpoints/
//     latest_epoch.bin              ← overwritten every epoch
//     best_epoch.bin                ← lowest e1 so far
//     latest_epoch_<e1>_<e2>.bin    ← e1 below the snapshot threshold
//     epoch_<N>.bin                 ← periodic, if enabled
//   (refinement runs use latest_epoch_refine / best_epoch_refine)
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{BinFileRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::{PoseLifter, PoseLifterConfig};

/// Sentinel for "no best error recorded yet"
pub const MIN_LOSS_SENTINEL: f64 = 100000.0;

const WEIGHTS_EXT: &str = "bin";
const OPTIM_EXT:   &str = "optim.bin";
const META_EXT:    &str = "meta.json";

pub fn latest_name(refine: bool) -> &'static str {
    if refine { "latest_epoch_refine.bin" } else { "latest_epoch.bin" }
}

pub fn best_name(refine: bool) -> &'static str {
    if refine { "best_epoch_refine.bin" } else { "best_epoch.bin" }
}

/// `latest_epoch_<e1>_<e2>.bin`. Errors are written in full, so distinct
/// errors never share a file.
pub fn snapshot_name(e1: f64, e2: f64) -> String {
    format!("latest_epoch_{e1}_{e2}.bin")
}

pub fn epoch_name(epoch: usize) -> String {
    format!("epoch_{epoch}.bin")
}

/// Scalar training state stored next to the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// The next epoch to run
    pub epoch:    usize,
    /// Learning rate for that epoch (already decayed)
    pub lr:       f64,
    #[serde(default)]
    pub min_loss: Option<f64>,
    #[serde(default)]
    pub model:    Option<PoseLifterConfig>,
}

/// Reads and writes checkpoint slots inside one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open `dir`, creating it if needed.
    /// Failing to create a directory that does not exist is fatal.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Unable to create checkpoint directory '{}'", dir.display()))?;
        }
        Ok(Self { dir })
    }

    /// Open `dir` for reading only; nothing is created.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a slot's weights file
    pub fn path(&self, name: &str) -> PathBuf {
        let path = self.dir.join(name);
        if path.extension().is_some_and(|e| e == WEIGHTS_EXT) {
            path
        } else {
            path.with_extension(WEIGHTS_EXT)
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn optim_path(&self, name: &str) -> PathBuf {
        self.path(name).with_extension(OPTIM_EXT)
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.path(name).with_extension(META_EXT)
    }

    /// Write weights, optimiser state and meta for one slot.
    pub fn save<B, O>(
        &self,
        name:  &str,
        model: &PoseLifter<B>,
        optim: &O,
        meta:  &CheckpointMeta,
    ) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<PoseLifter<B>, B>,
    {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let path = self.path(name);
        println!("Saving checkpoint to {}", path.display());

        Recorder::<B>::record(&recorder, model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let optim_path = self.optim_path(name);
        Recorder::<B>::record(&recorder, optim.to_record(), optim_path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", optim_path.display()))?;

        let meta_path = self.meta_path(name);
        fs::write(&meta_path, serde_json::to_string_pretty(meta)?)
            .with_context(|| format!("Cannot write '{}'", meta_path.display()))?;

        tracing::debug!("Saved checkpoint '{}' (next epoch {})", name, meta.epoch);
        Ok(())
    }

    /// Load weights into `model`. The architecture must match exactly.
    pub fn load_model<B: Backend>(
        &self,
        name:   &str,
        model:  PoseLifter<B>,
        device: &B::Device,
    ) -> Result<PoseLifter<B>> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let path = self.path(name);
        println!("Loading checkpoint {}", path.display());

        let record = Recorder::<B>::load(&recorder, path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        Ok(model.load_record(record))
    }

    /// Restore the optimiser state of a slot into `optim`.
    ///
    /// A slot without optimiser state leaves `optim` freshly
    /// initialised and logs a warning.
    pub fn load_optimizer<B, O>(&self, name: &str, optim: O, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        O: Optimizer<PoseLifter<B>, B>,
    {
        let path = self.optim_path(name);
        if !path.is_file() {
            tracing::warn!(
                "Checkpoint '{}' does not contain an optimizer state. The optimizer will be reinitialized.",
                name
            );
            return Ok(optim);
        }
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let record = Recorder::<B>::load(&recorder, path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(optim.load_record(record))
    }

    /// Meta of a slot, or None if the slot has none.
    pub fn load_meta(&self, name: &str) -> Result<Option<CheckpointMeta>> {
        let path = self.meta_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let meta = serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint meta '{}'", path.display()))?;
        Ok(Some(meta))
    }

    /// Every weights file in the directory except the rolling
    /// latest/best slots, sorted by name.
    pub fn snapshot_files(&self) -> Result<Vec<String>> {
        let excluded = [latest_name(false), best_name(false), latest_name(true), best_name(true)];
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot list checkpoint directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".bin") && !name.ends_with(".optim.bin"))
            .filter(|name| !excluded.contains(&name.as_str()))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamWConfig,
    };
    use tempfile::tempdir;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn small_model() -> (PoseLifterConfig, PoseLifter<TestBackend>) {
        let cfg = PoseLifterConfig::new().with_hidden_dim(8).with_depth(1);
        let model = cfg.init(&Default::default());
        (cfg, model)
    }

    fn weights(model: &PoseLifter<TestBackend>) -> Vec<f32> {
        model.head.weight.val().into_data().to_vec().unwrap()
    }

    #[test]
    fn test_slot_names() {
        assert_eq!(latest_name(true), "latest_epoch_refine.bin");
        assert_eq!(best_name(false), "best_epoch.bin");
        assert_eq!(snapshot_name(38.123, 30.0), "latest_epoch_38.123_30.bin");
        assert_eq!(epoch_name(7), "epoch_7.bin");
    }

    #[test]
    fn test_close_errors_get_distinct_snapshots() {
        assert_ne!(snapshot_name(39.501, 30.002), snapshot_name(39.504, 30.004));
        assert_ne!(snapshot_name(39.5, 30.0), snapshot_name(39.5, 30.000001));
    }

    #[test]
    fn test_sidecar_paths() {
        let tmp = tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let snap = snapshot_name(38.1, 30.2);
        assert!(mgr.path(&snap).ends_with("latest_epoch_38.1_30.2.bin"));
        assert!(mgr.optim_path(&snap).ends_with("latest_epoch_38.1_30.2.optim.bin"));
        assert!(mgr.meta_path(&snap).ends_with("latest_epoch_38.1_30.2.meta.json"));
        assert!(mgr.meta_path("best_epoch.bin").ends_with("best_epoch.meta.json"));
        assert!(mgr.path("best_epoch").ends_with("best_epoch.bin"));
    }

    fn same_meta(a: &CheckpointMeta, b: &CheckpointMeta) -> bool {
        serde_json::to_string(a).unwrap() == serde_json::to_string(b).unwrap()
    }

    fn round_trip<O: Optimizer<PoseLifter<TestBackend>, TestBackend>>(optim: O) {
        let tmp = tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let (cfg, model) = small_model();
        let meta = CheckpointMeta { epoch: 4, lr: 0.125 * 0.5, min_loss: Some(41.5), model: Some(cfg.clone()) };

        mgr.save("latest_epoch.bin", &model, &optim, &meta).unwrap();

        let loaded_meta = mgr.load_meta("latest_epoch.bin").unwrap().unwrap();
        assert!(same_meta(&loaded_meta, &meta));
        assert_eq!(loaded_meta.epoch, 4);
        assert_eq!(loaded_meta.lr, 0.0625);
        assert_eq!(loaded_meta.min_loss, Some(41.5));

        let fresh: PoseLifter<TestBackend> = cfg.init(&Default::default());
        let loaded = mgr.load_model("latest_epoch.bin", fresh, &Default::default()).unwrap();
        assert_eq!(weights(&loaded), weights(&model));

        let restored = mgr.load_optimizer::<TestBackend, O>("latest_epoch.bin", optim, &Default::default()).unwrap();

        mgr.save("best_epoch.bin", &loaded, &restored, &loaded_meta).unwrap();
        assert!(same_meta(&mgr.load_meta("best_epoch.bin").unwrap().unwrap(), &meta));
    }

    #[test]
    fn test_save_load_save_round_trip() {
        round_trip(AdamWConfig::new().init::<TestBackend, PoseLifter<TestBackend>>());
    }

    fn drop_optimizer_state<O: Optimizer<PoseLifter<TestBackend>, TestBackend>>(optim: O) {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        let mgr = CheckpointManager::new(dir).unwrap();
        let (_, model) = small_model();
        let meta = CheckpointMeta { epoch: 1, lr: 0.1, min_loss: None, model: None };
        mgr.save("epoch_0.bin", &model, &optim, &meta).unwrap();
        fs::remove_file(dir.join("epoch_0.optim.bin")).unwrap();

        assert!(mgr.load_optimizer::<TestBackend, O>("epoch_0.bin", optim, &Default::default()).is_ok());
        assert!(mgr.load_meta("nothing.bin").unwrap().is_none());
    }

    #[test]
    fn test_missing_sidecars_fall_back() {
        drop_optimizer_state(AdamWConfig::new().init::<TestBackend, PoseLifter<TestBackend>>());
    }

    #[test]
    fn test_snapshot_discovery_skips_rolling_slots_and_sidecars() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        let mgr = CheckpointManager::new(dir).unwrap();
        for name in [
            "latest_epoch.bin",
            "best_epoch.bin",
            "latest_epoch_39.1_31.bin",
            "latest_epoch_39.1_31.optim.bin",
            "latest_epoch_38.5_30.9.bin",
            "epoch_3.bin",
            "notes.txt",
        ] {
            fs::write(dir.join(name), b"").unwrap();
        }
        assert_eq!(
            mgr.snapshot_files().unwrap(),
            vec!["epoch_3.bin", "latest_epoch_38.5_30.9.bin", "latest_epoch_39.1_31.bin"]
        );
    }

    #[test]
    fn test_new_fails_when_path_is_a_file() {
        let tmp = tempdir().unwrap();
        let blocked = tmp.path().join("blocked");
        fs::write(&blocked, b"").unwrap();
        assert!(CheckpointManager::new(&blocked).is_err());
    }
}
