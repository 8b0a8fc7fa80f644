// ============================================================
// Layer 2 — Experiment Configuration
// ============================================================
// Everything a training or evaluation run needs besides the
// command-line paths, read from the YAML file given with
// `--config`. Keys left out of the file fall back to Default.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::ml::augment::Augmenter;
use crate::ml::model::PoseLifterConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    // ── Optimisation ──────────────────────────────────────────
    pub learning_rate: f64,
    pub weight_decay:  f64,
    pub lr_decay:      f64,
    pub epochs:        usize,
    pub batch_size:    usize,

    // ── Data ──────────────────────────────────────────────────
    /// Frames per clip
    pub n_frames:    usize,
    pub data_root:   String,
    pub subset_list: Vec<String>,
    pub dt_root:     String,
    pub dt_file:     String,

    // ── Input / output handling ───────────────────────────────
    pub no_conf:  bool,
    pub flip:     bool,
    pub root_rel: bool,
    pub gt_2d:    bool,
    /// Train on 3D ground truth; false trains on 2D reprojection only
    pub has_3d:   bool,
    /// Ground-truth inputs (noise is only added when set)
    pub has_gt:   bool,

    // ── Augmentation ──────────────────────────────────────────
    pub mask_ratio: f64,
    #[serde(rename = "mask_T_ratio", alias = "mask_t_ratio")]
    pub mask_t_ratio: f64,
    pub noise:      bool,
    pub noise_std:  f64,

    // ── Loss weights (the position term has weight 1) ─────────
    pub lambda_scale:       f64,
    pub lambda_3d_velocity: f64,
    pub lambda_lv:          f64,
    pub lambda_lg:          f64,
    pub lambda_a:           f64,
    pub lambda_av:          f64,

    // ── Run control ───────────────────────────────────────────
    pub finetune: bool,
    pub no_eval:  bool,
    /// Write `latest_epoch_<e1>_<e2>.bin` whenever e1 drops below this
    pub snapshot_threshold:   f64,
    /// Write `epoch_<N>.bin` every N epochs; 0 disables
    pub checkpoint_frequency: usize,

    #[serde(deserialize_with = "model_section")]
    pub model: PoseLifterConfig,
}

/// The `model:` block. Keys left out keep the architecture defaults,
/// which the derived `PoseLifterConfig` deserializer does not do.
#[derive(Deserialize)]
#[serde(default)]
struct ModelSection {
    num_joints:  usize,
    in_channels: usize,
    hidden_dim:  usize,
    depth:       usize,
    dropout:     f64,
}

impl Default for ModelSection {
    fn default() -> Self {
        let PoseLifterConfig { num_joints, in_channels, hidden_dim, depth, dropout } = PoseLifterConfig::new();
        Self { num_joints, in_channels, hidden_dim, depth, dropout }
    }
}

impl From<ModelSection> for PoseLifterConfig {
    fn from(m: ModelSection) -> Self {
        PoseLifterConfig::new()
            .with_num_joints(m.num_joints)
            .with_in_channels(m.in_channels)
            .with_hidden_dim(m.hidden_dim)
            .with_depth(m.depth)
            .with_dropout(m.dropout)
    }
}

fn model_section<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<PoseLifterConfig, D::Error> {
    ModelSection::deserialize(d).map(Into::into)
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.0005,
            weight_decay:  0.01,
            lr_decay:      0.99,
            epochs:        60,
            batch_size:    32,

            n_frames:    243,
            data_root:   "data/motion3d/MB3D_f243s81/".to_string(),
            subset_list: vec!["H36M-SH".to_string()],
            dt_root:     "data/motion3d".to_string(),
            dt_file:     "h36m_sh_conf_cam_source_final.json".to_string(),

            no_conf:  false,
            flip:     true,
            root_rel: false,
            gt_2d:    false,
            has_3d:   true,
            has_gt:   true,

            mask_ratio:   0.0,
            mask_t_ratio: 0.0,
            noise:        false,
            noise_std:    0.002,

            lambda_scale:       0.5,
            lambda_3d_velocity: 20.0,
            lambda_lv:          0.0,
            lambda_lg:          0.0,
            lambda_a:           0.0,
            lambda_av:          0.0,

            finetune: false,
            no_eval:  false,
            snapshot_threshold:   39.8,
            checkpoint_frequency: 0,

            model: PoseLifterConfig::new(),
        }
    }
}

impl ExperimentConfig {
    /// Read a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&yaml)
            .with_context(|| format!("Malformed config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.n_frames > 0, "n_frames must be positive");
        ensure!(!self.subset_list.is_empty(), "subset_list is empty");
        ensure!(self.lr_decay > 0.0, "lr_decay must be positive");
        let channels = if self.no_conf { 2 } else { 3 };
        ensure!(
            self.model.in_channels == channels,
            "model.in_channels is {} but the input has {channels} channels (no_conf = {})",
            self.model.in_channels,
            self.no_conf
        );
        Ok(())
    }

    pub fn augmenter(&self) -> Augmenter {
        Augmenter::new(self.mask_ratio, self.mask_t_ratio, self.noise_std)
    }

    /// Stride between test clips; test clips never overlap
    pub fn test_stride(&self) -> usize {
        self.n_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "
learning_rate: 0.0002
mask_T_ratio: 0.1
lambda_lv: 1.5
model:
  depth: 2
";
        let cfg: ExperimentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.learning_rate, 0.0002);
        assert_eq!(cfg.mask_t_ratio, 0.1);
        assert_eq!(cfg.lambda_lv, 1.5);
        assert_eq!(cfg.model.depth, 2);
        assert_eq!(cfg.model.hidden_dim, 256);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.snapshot_threshold, 39.8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_model_block_fills_every_missing_key() {
        let cfg: ExperimentConfig = serde_yaml::from_str("model:\n  hidden_dim: 64\n").unwrap();
        assert_eq!(cfg.model.hidden_dim, 64);
        assert_eq!(cfg.model.num_joints, 17);
        assert_eq!(cfg.model.in_channels, 3);
        assert_eq!(cfg.model.depth, 4);
        assert_eq!(cfg.model.dropout, 0.1);

        // an empty block is the default architecture
        let cfg: ExperimentConfig = serde_yaml::from_str("model: {}\n").unwrap();
        assert_eq!(cfg.model.depth, PoseLifterConfig::new().depth);
    }

    #[test]
    fn test_model_block_rejects_wrong_types() {
        assert!(serde_yaml::from_str::<ExperimentConfig>("model:\n  depth: deep\n").is_err());
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let cfg = ExperimentConfig { no_conf: true, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = ExperimentConfig::load("/nonexistent/config.yaml").unwrap_err();
        assert!(err.to_string().contains("Cannot read config"));
    }
}
