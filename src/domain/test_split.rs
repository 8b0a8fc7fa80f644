// ============================================================
// Layer 3 — Test Split
// ============================================================
// Frame-level annotations of the evaluation split. Every vector
// is indexed by the global test frame index, which is also the
// index space used by clip frame lists.

use anyhow::{ensure, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::domain::skeleton::{PoseFrame, PoseSequence};

/// Per-frame metadata of the test split
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSplit {
    /// Action label of each frame
    pub action: Vec<String>,

    /// Depth scale that turns a denormalized prediction into millimetres
    #[serde(rename = "2.5d_factor")]
    pub factor_2_5d: Vec<f64>,

    /// Ground-truth joints in 2.5D image space
    #[serde(rename = "joints_2.5d_image")]
    pub joints_2_5d_image: Vec<Vec<[f64; 3]>>,

    /// Source video of each frame, e.g. `s_09_act_02_subact_01_ca_01`
    pub source: Vec<String>,

    /// Camera resolution (width, height) of each frame
    pub camera_resolution: Vec<[f64; 2]>,
}

impl TestSplit {
    pub fn num_frames(&self) -> usize {
        self.action.len()
    }

    /// Check that every per-frame vector has the same length
    pub fn validate(&self) -> Result<()> {
        let n = self.num_frames();
        ensure!(self.factor_2_5d.len() == n,
            "2.5d_factor has {} frames, expected {n}", self.factor_2_5d.len());
        ensure!(self.joints_2_5d_image.len() == n,
            "joints_2.5d_image has {} frames, expected {n}", self.joints_2_5d_image.len());
        ensure!(self.source.len() == n,
            "source has {} frames, expected {n}", self.source.len());
        ensure!(self.camera_resolution.len() == n,
            "camera_resolution has {} frames, expected {n}", self.camera_resolution.len());
        Ok(())
    }

    /// Sorted, de-duplicated action labels
    pub fn action_names(&self) -> Vec<String> {
        let mut names = self.action.clone();
        names.sort();
        names.dedup();
        names
    }

    pub fn gt_frame(&self, frame: usize) -> PoseFrame {
        self.joints_2_5d_image[frame]
            .iter()
            .map(|&[x, y, z]| Vector3::new(x, y, z))
            .collect()
    }

    /// Ground truth of a clip given its frame list
    pub fn gt_clip(&self, frames: &[usize]) -> PoseSequence {
        frames.iter().map(|&f| self.gt_frame(f)).collect()
    }
}
