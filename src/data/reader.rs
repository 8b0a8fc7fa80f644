// ============================================================
// Layer 4 — H36M Test-Split Reader
// ============================================================
// Owns the frame-level annotations of the test split and knows
// how network outputs map back onto them:
//
//   split_ids()    — global frame indices of every test clip,
//                    in the same order as the test MotionDataset
//   denormalize()  — normalized [-1, 1] coordinates → pixels,
//                    using each clip's camera resolution
//
// Clips never cross a video boundary. A video shorter than one
// clip is resampled to clip length with evenly spaced (and
// therefore possibly repeated) frame indices.

use anyhow::{ensure, Context, Result};
use nalgebra::Vector3;
use std::{fs, path::Path};

use crate::domain::skeleton::PoseSequence;
use crate::domain::test_split::TestSplit;

#[derive(Debug, Clone)]
pub struct H36mReader {
    test:     TestSplit,
    n_frames: usize,
    stride:   usize,
}

impl H36mReader {
    pub fn new(test: TestSplit, n_frames: usize, stride: usize) -> Result<Self> {
        test.validate()?;
        ensure!(n_frames > 0, "clip length must be positive");
        ensure!(stride > 0, "test stride must be positive");
        Ok(Self { test, n_frames, stride })
    }

    /// Load `<dt_root>/<dt_file>` (JSON test split)
    pub fn load(dt_root: impl AsRef<Path>, dt_file: &str, n_frames: usize, stride: usize) -> Result<Self> {
        let path = dt_root.as_ref().join(dt_file);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read test split '{}'", path.display()))?;
        let test: TestSplit = serde_json::from_str(&json)
            .with_context(|| format!("Malformed test split '{}'", path.display()))?;
        tracing::info!("Test split: {} frames, {} actions", test.num_frames(), test.action_names().len());
        Self::new(test, n_frames, stride)
    }

    pub fn test(&self) -> &TestSplit {
        &self.test
    }

    /// Frame lists of the test clips
    pub fn split_ids(&self) -> Vec<Vec<usize>> {
        split_clips(&self.test.source, self.n_frames, self.stride)
    }

    /// Map normalized predictions back to image space.
    ///
    /// `x, y ← (v + [1, h/w]) · w/2` and `z ← z · w/2`, where
    /// (w, h) is the camera resolution of the clip's first frame.
    pub fn denormalize(&self, clips: &[Vec<usize>], predictions: Vec<PoseSequence>) -> Result<Vec<PoseSequence>> {
        ensure!(
            clips.len() == predictions.len(),
            "{} predicted clips but the test split has {} clips",
            predictions.len(),
            clips.len()
        );
        clips
            .iter()
            .zip(predictions)
            .map(|(frames, pred)| -> Result<PoseSequence> {
                let first = *frames.first().context("empty test clip")?;
                let [res_w, res_h] = self.test.camera_resolution[first];
                let half_w = res_w / 2.0;
                let offset = Vector3::new(1.0, res_h / res_w, 0.0);
                Ok(pred
                    .into_iter()
                    .map(|frame| frame.into_iter().map(|j| (j + offset) * half_w).collect())
                    .collect())
            })
            .collect()
    }
}

/// Evenly spaced indices `0..ori_len` of length `target_len`
pub fn resample(ori_len: usize, target_len: usize) -> Vec<usize> {
    (0..target_len)
        .map(|i| (i * ori_len) / target_len)
        .collect()
}

/// Cut a per-frame video list into clips of `n_frames`.
///
/// A new clip starts every `stride` frames within a video. A video
/// that produced no full clip is resampled into exactly one.
pub fn split_clips(video_of_frame: &[String], n_frames: usize, stride: usize) -> Vec<Vec<usize>> {
    let mut clips = Vec::new();
    let mut start = 0usize;
    let mut saved: Option<&str> = None;
    let total = video_of_frame.len();

    let mut i = 0usize;
    while i < total {
        i += 1;
        if i >= start && i - start == n_frames {
            clips.push((start..i).collect());
            saved = Some(video_of_frame[i - 1].as_str());
            start += stride;
        }
        if i == total {
            break;
        }
        if video_of_frame[i] != video_of_frame[i - 1] {
            let video = video_of_frame[i - 1].as_str();
            if saved != Some(video) {
                let len = i.saturating_sub(start).max(1);
                clips.push(resample(len, n_frames).into_iter().map(|k| k + start).collect());
            }
            start = i;
        }
    }
    clips
}
