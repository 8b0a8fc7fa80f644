// ============================================================
// Layer 4 — Motion Clip Dataset
// ============================================================
// Loads fixed-length motion clips from disk and exposes them
// through Burn's Dataset trait.
//
// Directory layout:
//   <root>/<subset>/<split>/*.json
//
// Each file is one clip:
//   {
//     "input": [T][J][C]   normalized 2D joints (+ confidence)
//     "label": [T][J][3]   normalized 3D joints
//   }
//
// Clips are sorted by file name within a subset and subsets are
// visited in the order given, so the test clip order is stable
// and matches the reader's clip frame lists.

use anyhow::{ensure, Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

/// Which half of a subset to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test  => "test",
        }
    }
}

/// One training / test sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseClip {
    /// 2D input, indexed `[frame][joint][channel]`
    pub input: Vec<Vec<Vec<f32>>>,
    /// 3D target, indexed `[frame][joint]`
    pub label: Vec<Vec<[f32; 3]>>,
}

impl PoseClip {
    pub fn num_frames(&self) -> usize {
        self.input.len()
    }

    pub fn num_joints(&self) -> usize {
        self.input.first().map_or(0, |f| f.len())
    }

    pub fn num_channels(&self) -> usize {
        self.input
            .first()
            .and_then(|f| f.first())
            .map_or(0, |j| j.len())
    }

    /// Every frame/joint of input and label must agree in shape
    pub fn validate(&self) -> Result<()> {
        let (t, j, c) = (self.num_frames(), self.num_joints(), self.num_channels());
        ensure!(t > 0 && j > 0 && c >= 2, "empty clip or fewer than 2 input channels");
        ensure!(self.label.len() == t, "label has {} frames, input has {t}", self.label.len());
        for (frame, (inp, lab)) in self.input.iter().zip(self.label.iter()).enumerate() {
            ensure!(inp.len() == j && lab.len() == j, "frame {frame} has a ragged joint count");
            ensure!(inp.iter().all(|joint| joint.len() == c), "frame {frame} has a ragged channel count");
        }
        Ok(())
    }
}

/// Clips of one split across the configured subsets
pub struct MotionDataset {
    clips: Vec<PoseClip>,
}

impl MotionDataset {
    pub fn new(clips: Vec<PoseClip>) -> Self {
        Self { clips }
    }

    /// Read every clip of `split` under `root/<subset>/`
    pub fn load(root: impl AsRef<Path>, subsets: &[String], split: Split) -> Result<Self> {
        let root = root.as_ref();
        let mut clips = Vec::new();

        for subset in subsets {
            let dir = root.join(subset).join(split.dir_name());
            let files = clip_files(&dir)?;
            tracing::debug!("{} clips in '{}'", files.len(), dir.display());

            for path in files {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("Cannot read clip '{}'", path.display()))?;
                let clip: PoseClip = serde_json::from_str(&json)
                    .with_context(|| format!("Malformed clip '{}'", path.display()))?;
                clip.validate()
                    .with_context(|| format!("Invalid clip '{}'", path.display()))?;
                clips.push(clip);
            }
        }

        if let Some(first) = clips.first() {
            let shape = (first.num_frames(), first.num_joints(), first.num_channels());
            ensure!(
                clips.iter().all(|c| (c.num_frames(), c.num_joints(), c.num_channels()) == shape),
                "clips of the {} split do not share one shape",
                split.dir_name()
            );
        }

        tracing::info!("Loaded {} {} clips", clips.len(), split.dir_name());
        Ok(Self::new(clips))
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// `(frames, joints, channels)` of the clips, if any were loaded
    pub fn clip_shape(&self) -> Option<(usize, usize, usize)> {
        self.clips
            .first()
            .map(|c| (c.num_frames(), c.num_joints(), c.num_channels()))
    }
}

impl Dataset<PoseClip> for MotionDataset {
    fn get(&self, index: usize) -> Option<PoseClip> {
        self.clips.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.clips.len()
    }
}

/// Sorted `*.json` files of a directory
fn clip_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read clip directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Clip with `t` frames of 17 joints whose values depend on `seed`
    pub(crate) fn synthetic_clip(t: usize, channels: usize, seed: f32) -> PoseClip {
        let input = (0..t)
            .map(|f| {
                (0..17)
                    .map(|j| {
                        (0..channels)
                            .map(|c| if c == 2 { 1.0 } else { seed + 0.01 * (f + j + c) as f32 })
                            .collect()
                    })
                    .collect()
            })
            .collect();
        let label = (0..t)
            .map(|f| {
                (0..17)
                    .map(|j| {
                        let base = seed + 0.02 * j as f32;
                        [base + 0.001 * f as f32, -base, 0.5 * base]
                    })
                    .collect()
            })
            .collect();
        PoseClip { input, label }
    }

    pub(crate) fn write_clips(root: &Path, subset: &str, split: Split, clips: &[PoseClip]) {
        let dir = root.join(subset).join(split.dir_name());
        fs::create_dir_all(&dir).unwrap();
        for (i, clip) in clips.iter().enumerate() {
            let path = dir.join(format!("{i:08}.json"));
            fs::write(path, serde_json::to_string(clip).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_load_keeps_file_order() {
        let tmp = tempdir().unwrap();
        let clips: Vec<PoseClip> = (0..3).map(|i| synthetic_clip(4, 3, i as f32)).collect();
        write_clips(tmp.path(), "H36M-SH", Split::Test, &clips);

        let ds = MotionDataset::load(tmp.path(), &["H36M-SH".to_string()], Split::Test).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(2), Some(clips[2].clone()));
        assert_eq!(ds.clip_shape(), Some((4, 17, 3)));
    }

    #[test]
    fn test_missing_split_dir_is_an_error() {
        let tmp = tempdir().unwrap();
        assert!(MotionDataset::load(tmp.path(), &["H36M-SH".to_string()], Split::Train).is_err());
    }

    #[test]
    fn test_ragged_clip_rejected() {
        let mut clip = synthetic_clip(3, 3, 0.0);
        clip.label.pop();
        assert!(clip.validate().is_err());
    }
}
