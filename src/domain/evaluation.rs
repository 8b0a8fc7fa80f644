// ============================================================
// Layer 3 — Action-Stratified Evaluation
// ============================================================
// Turns per-clip predictions into the benchmark numbers:
//
//   1. every clip is scaled by its 2.5D factor and root-centred
//   2. per-frame errors are added onto the global frame index
//      (clips overlap, so a frame can be hit more than once)
//   3. each frame's sum is divided by its overlap count
//   4. frames are grouped by action and averaged per action
//   5. the reported error is the mean over ACTIONS, not frames
//
// Step 5 is the H36M protocol: an action with few frames weighs
// as much as an action with many.
//
// Acceleration error exists only for interior clip frames. The
// value for clip position k (1 ≤ k ≤ T-2) is credited to the frame
// at that position and has its own coverage count, so boundary
// frames never dilute the average with zeros.

use std::collections::BTreeMap;

use anyhow::{ensure, Result};

use crate::domain::error_metrics::{acc_error, mpjpe, p_mpjpe};
use crate::domain::skeleton::{root_relative, PoseSequence};
use crate::domain::test_split::TestSplit;

/// Source videos with corrupt ground truth, excluded from every metric
pub const DENYLISTED_SOURCES: [&str; 3] = [
    "s_09_act_05_subact_02",
    "s_09_act_10_subact_02",
    "s_09_act_13_subact_01",
];

/// Length of the camera suffix, e.g. `_ca_01`
const CAMERA_SUFFIX_LEN: usize = 6;

/// Strip the camera suffix from a frame source name
pub fn video_key(source: &str) -> &str {
    source
        .len()
        .checked_sub(CAMERA_SUFFIX_LEN)
        .and_then(|end| source.get(..end))
        .unwrap_or("")
}

pub fn is_denylisted(source: &str) -> bool {
    DENYLISTED_SOURCES.contains(&video_key(source))
}

/// Mean of a slice; NaN when empty
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unweighted mean over per-action values, skipping actions that had no frames
pub fn mean_over_actions(per_action: &[f64]) -> f64 {
    let finite: Vec<f64> = per_action.iter().copied().filter(|v| v.is_finite()).collect();
    mean(&finite)
}

// ─── Frame accumulator ───────────────────────────────────────────────────────

/// Error sums and coverage counts over the global test frame index
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    mpjpe:       Vec<f64>,
    p_mpjpe:     Vec<f64>,
    acc:         Vec<f64>,
    overlap:     Vec<u32>,
    acc_overlap: Vec<u32>,
}

impl FrameAccumulator {
    pub fn new(num_frames: usize) -> Self {
        Self {
            mpjpe:       vec![0.0; num_frames],
            p_mpjpe:     vec![0.0; num_frames],
            acc:         vec![0.0; num_frames],
            overlap:     vec![0; num_frames],
            acc_overlap: vec![0; num_frames],
        }
    }

    pub fn num_frames(&self) -> usize {
        self.overlap.len()
    }

    /// Add one clip's per-frame errors.
    ///
    /// `acc` must hold one value per interior frame (`frames.len() - 2`),
    /// or be empty for clips shorter than three frames. A frame listed
    /// twice in the same clip counts once, with its last value.
    pub fn add_clip(
        &mut self,
        frames: &[usize],
        e1:     &[f64],
        e2:     &[f64],
        acc:    &[f64],
    ) -> Result<()> {
        ensure!(e1.len() == frames.len() && e2.len() == frames.len(),
            "clip has {} frames but {} / {} errors", frames.len(), e1.len(), e2.len());
        ensure!(acc.len() == frames.len().saturating_sub(2),
            "clip has {} frames but {} acceleration errors", frames.len(), acc.len());
        if let Some(&bad) = frames.iter().find(|&&f| f >= self.num_frames()) {
            anyhow::bail!("frame index {bad} outside test split of {} frames", self.num_frames());
        }

        let mut last_pos: BTreeMap<usize, usize> = BTreeMap::new();
        for (pos, &f) in frames.iter().enumerate() {
            last_pos.insert(f, pos);
        }
        for (&f, &pos) in &last_pos {
            self.mpjpe[f]   += e1[pos];
            self.p_mpjpe[f] += e2[pos];
            self.overlap[f] += 1;
        }

        let mut last_acc: BTreeMap<usize, f64> = BTreeMap::new();
        for (k, &a) in acc.iter().enumerate() {
            last_acc.insert(frames[k + 1], a);
        }
        for (f, a) in last_acc {
            self.acc[f]         += a;
            self.acc_overlap[f] += 1;
        }
        Ok(())
    }

    pub fn overlap(&self, frame: usize) -> u32 {
        self.overlap[frame]
    }

    /// Overlap-averaged (mpjpe, p_mpjpe) of a covered frame
    pub fn frame_errors(&self, frame: usize) -> Option<(f64, f64)> {
        let oc = self.overlap(frame);
        (oc > 0).then(|| (self.mpjpe[frame] / oc as f64, self.p_mpjpe[frame] / oc as f64))
    }

    /// Coverage-averaged acceleration error of an interior frame
    pub fn frame_acc_error(&self, frame: usize) -> Option<f64> {
        let oc = self.acc_overlap[frame];
        (oc > 0).then(|| self.acc[frame] / oc as f64)
    }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Mean errors of one action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionErrors {
    pub action:    String,
    pub mpjpe:     f64,
    pub p_mpjpe:   f64,
    pub acc_error: f64,
    /// Number of covered frames that contributed
    pub frames:    usize,
}

/// Result of one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// One entry per action of the test split, sorted by name
    pub actions:   Vec<ActionErrors>,
    /// Protocol #1 (MPJPE), mean over actions
    pub mpjpe:     f64,
    /// Protocol #2 (P-MPJPE), mean over actions
    pub p_mpjpe:   f64,
    pub acc_error: f64,
}

impl EvaluationReport {
    /// Group covered frames by action and reduce to action means
    pub fn from_frames(acc: &FrameAccumulator, frame_actions: &[String]) -> Self {
        #[derive(Default)]
        struct Lists {
            p1:  Vec<f64>,
            p2:  Vec<f64>,
            acc: Vec<f64>,
        }

        let mut lists: BTreeMap<&str, Lists> = frame_actions
            .iter()
            .map(|a| (a.as_str(), Lists::default()))
            .collect();

        for (frame, action) in frame_actions.iter().enumerate().take(acc.num_frames()) {
            let entry = lists.entry(action.as_str()).or_default();
            if let Some((e1, e2)) = acc.frame_errors(frame) {
                entry.p1.push(e1);
                entry.p2.push(e2);
            }
            if let Some(a) = acc.frame_acc_error(frame) {
                entry.acc.push(a);
            }
        }

        let actions: Vec<ActionErrors> = lists
            .into_iter()
            .map(|(action, l)| {
                if l.p1.is_empty() {
                    tracing::warn!("Action '{}' has no evaluated frames", action);
                }
                ActionErrors {
                    action:    action.to_string(),
                    mpjpe:     mean(&l.p1),
                    p_mpjpe:   mean(&l.p2),
                    acc_error: mean(&l.acc),
                    frames:    l.p1.len(),
                }
            })
            .collect();

        let p1:  Vec<f64> = actions.iter().map(|a| a.mpjpe).collect();
        let p2:  Vec<f64> = actions.iter().map(|a| a.p_mpjpe).collect();
        let acc: Vec<f64> = actions.iter().map(|a| a.acc_error).collect();

        Self {
            mpjpe:     mean_over_actions(&p1),
            p_mpjpe:   mean_over_actions(&p2),
            acc_error: mean_over_actions(&acc),
            actions,
        }
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.action.clone()).collect()
    }

    pub fn per_action_mpjpe(&self) -> Vec<f64> {
        self.actions.iter().map(|a| a.mpjpe).collect()
    }

    pub fn per_action_p_mpjpe(&self) -> Vec<f64> {
        self.actions.iter().map(|a| a.p_mpjpe).collect()
    }

    /// Per-action P1 / P2 table
    pub fn summary_table(&self) -> String {
        let mut header = vec!["test_name".to_string()];
        header.extend(self.action_names());
        let row = |name: &str, values: Vec<f64>| {
            let mut r = vec![name.to_string()];
            r.extend(values.iter().map(|v| format!("{v:.2}")));
            r
        };
        format_table(&header, &[
            row("P1", self.per_action_mpjpe()),
            row("P2", self.per_action_p_mpjpe()),
        ])
    }
}

/// Render a boxed text table
pub fn format_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let rule: String = widths.iter().fold(String::from("+"), |mut s, w| {
        s.push_str(&"-".repeat(w + 2));
        s.push('+');
        s
    });
    let line = |cells: &[String]| {
        widths.iter().enumerate().fold(String::from("|"), |mut s, (i, &w)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            s.push_str(&format!(" {cell:^w$} |"));
            s
        })
    };

    let mut out = vec![rule.clone(), line(header), rule.clone()];
    out.extend(rows.iter().map(|r| line(r.as_slice())));
    out.push(rule);
    out.join("\n")
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Score denormalized clip predictions against the test split.
///
/// `clips[i]` lists the global frame indices of prediction `i`.
pub fn evaluate_clips(
    split:       &TestSplit,
    clips:       &[Vec<usize>],
    predictions: &[PoseSequence],
) -> Result<EvaluationReport> {
    ensure!(
        predictions.len() == clips.len(),
        "{} predicted clips but the test split has {} clips",
        predictions.len(),
        clips.len()
    );

    let mut acc = FrameAccumulator::new(split.num_frames());
    let mut skipped = 0usize;

    for (frames, pred) in clips.iter().zip(predictions.iter()) {
        let Some(&first) = frames.first() else { continue };
        ensure!(first < split.num_frames(), "clip starts at frame {first}, outside the test split");
        if is_denylisted(&split.source[first]) {
            skipped += 1;
            continue;
        }
        ensure!(
            pred.len() == frames.len(),
            "prediction has {} frames, clip has {}",
            pred.len(),
            frames.len()
        );

        let scaled: PoseSequence = pred
            .iter()
            .zip(frames.iter())
            .map(|(frame, &f)| {
                let factor = split.factor_2_5d[f];
                frame.iter().map(|j| j * factor).collect()
            })
            .collect();

        let pred = root_relative(&scaled);
        let gt   = root_relative(&split.gt_clip(frames));

        acc.add_clip(frames, &mpjpe(&pred, &gt), &p_mpjpe(&pred, &gt), &acc_error(&pred, &gt))?;
    }

    tracing::debug!("Skipped {} denylisted clips", skipped);
    Ok(EvaluationReport::from_frames(&acc, &split.action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::skeleton::PoseFrame;
    use nalgebra::Vector3;

    fn actions(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_video_key_strips_camera() {
        assert_eq!(video_key("s_09_act_05_subact_02_ca_03"), "s_09_act_05_subact_02");
        assert!(is_denylisted("s_09_act_13_subact_01_ca_01"));
        assert!(!is_denylisted("s_11_act_13_subact_01_ca_01"));
        assert_eq!(video_key("ca_1"), "");
    }

    #[test]
    fn test_overlapping_frame_is_averaged_once() {
        let mut acc = FrameAccumulator::new(3);
        acc.add_clip(&[0, 1], &[1.0, 4.0], &[1.0, 4.0], &[]).unwrap();
        acc.add_clip(&[1, 2], &[6.0, 1.0], &[6.0, 1.0], &[]).unwrap();

        assert_eq!(acc.overlap(1), 2);
        assert_eq!(acc.frame_errors(1), Some((5.0, 5.0)));
        assert_eq!(acc.frame_errors(0), Some((1.0, 1.0)));
    }

    #[test]
    fn test_duplicate_frame_in_clip_counts_once() {
        let mut acc = FrameAccumulator::new(2);
        acc.add_clip(&[0, 0, 1], &[2.0, 8.0, 1.0], &[2.0, 8.0, 1.0], &[3.0]).unwrap();
        assert_eq!(acc.overlap(0), 1);
        assert_eq!(acc.frame_errors(0), Some((8.0, 8.0)));
        // the single interior value belongs to clip position 1 → frame 0
        assert_eq!(acc.frame_acc_error(0), Some(3.0));
        assert_eq!(acc.frame_acc_error(1), None);
    }

    #[test]
    fn test_acceleration_is_centre_aligned() {
        let mut acc = FrameAccumulator::new(6);
        acc.add_clip(&[2, 3, 4, 5], &[0.0; 4], &[0.0; 4], &[7.0, 9.0]).unwrap();
        assert_eq!(acc.frame_acc_error(2), None);
        assert_eq!(acc.frame_acc_error(3), Some(7.0));
        assert_eq!(acc.frame_acc_error(4), Some(9.0));
        assert_eq!(acc.frame_acc_error(5), None);
    }

    #[test]
    fn test_add_clip_rejects_bad_shapes() {
        let mut acc = FrameAccumulator::new(2);
        assert!(acc.add_clip(&[0, 1], &[1.0], &[1.0, 1.0], &[]).is_err());
        assert!(acc.add_clip(&[0, 5], &[1.0, 1.0], &[1.0, 1.0], &[]).is_err());
        assert!(acc.add_clip(&[0, 1], &[1.0, 1.0], &[1.0, 1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_global_error_is_mean_over_actions_not_frames() {
        // action A: 3 frames at 10mm, action B: 1 frame at 2mm
        let labels = actions(&["A", "A", "A", "B"]);
        let mut acc = FrameAccumulator::new(4);
        acc.add_clip(&[0, 1, 2], &[10.0; 3], &[10.0; 3], &[0.0]).unwrap();
        acc.add_clip(&[3], &[2.0], &[2.0], &[]).unwrap();

        let report = EvaluationReport::from_frames(&acc, &labels);
        assert_eq!(report.per_action_mpjpe(), vec![10.0, 2.0]);

        let frame_weighted = (10.0 * 3.0 + 2.0) / 4.0;
        assert!((report.mpjpe - 6.0).abs() < 1e-12);
        assert!((report.p_mpjpe - 6.0).abs() < 1e-12);
        assert!((report.mpjpe - frame_weighted).abs() > 1.0);
    }

    #[test]
    fn test_every_action_gets_a_key() {
        let labels = actions(&["Walk", "Eat", "Walk", "Sit", "Eat"]);
        let mut acc = FrameAccumulator::new(5);
        acc.add_clip(&[0, 1], &[1.0, 1.0], &[1.0, 1.0], &[]).unwrap();

        let report = EvaluationReport::from_frames(&acc, &labels);
        assert_eq!(report.action_names(), actions(&["Eat", "Sit", "Walk"]));
        // Sit has no covered frame: NaN, and ignored by the grand mean
        let sit = &report.actions[1];
        assert!(sit.mpjpe.is_nan());
        assert_eq!(sit.frames, 0);
        assert!(report.mpjpe.is_finite());
    }

    fn frame_at(offset: f64) -> PoseFrame {
        (0..17)
            .map(|j| Vector3::new(j as f64 + offset, (j % 3) as f64 * offset, 2.0 * j as f64))
            .collect()
    }

    fn fixture_split() -> TestSplit {
        let n = 8;
        let sources: Vec<String> = (0..n)
            .map(|i| if i < 4 { "s_11_act_02_subact_01_ca_01" } else { "s_09_act_05_subact_02_ca_01" })
            .map(String::from)
            .collect();
        TestSplit {
            action:            vec!["Directions".to_string(); n],
            factor_2_5d:       vec![1.0; n],
            joints_2_5d_image: (0..n)
                .map(|i| frame_at(i as f64).iter().map(|v| [v.x, v.y, v.z]).collect())
                .collect(),
            source:            sources,
            camera_resolution: vec![[1000.0, 1000.0]; n],
        }
    }

    #[test]
    fn test_denylisted_clip_never_changes_metrics() {
        let split = fixture_split();
        let clean_frames = vec![0, 1, 2, 3];
        let clean_pred: PoseSequence = clean_frames
            .iter()
            .map(|&f| frame_at(f as f64 + 0.5))
            .collect();

        let baseline = evaluate_clips(&split, &[clean_frames.clone()], &[clean_pred.clone()]).unwrap();

        let bad_frames = vec![4, 5, 6, 7];
        let bad_pred: PoseSequence = bad_frames
            .iter()
            .map(|_| frame_at(0.0).iter().map(|j| j * 1.0e6).collect())
            .collect();
        let with_bad = evaluate_clips(
            &split,
            &[clean_frames, bad_frames],
            &[clean_pred, bad_pred],
        )
        .unwrap();

        assert_eq!(baseline, with_bad);
        assert!(baseline.mpjpe > 0.0);
    }

    #[test]
    fn test_clip_count_mismatch_is_fatal() {
        let split = fixture_split();
        assert!(evaluate_clips(&split, &[vec![0, 1]], &[]).is_err());
    }

    #[test]
    fn test_summary_table_lists_actions() {
        let labels = actions(&["Eat", "Walk"]);
        let mut acc = FrameAccumulator::new(2);
        acc.add_clip(&[0, 1], &[1.0, 3.0], &[0.5, 1.5], &[]).unwrap();
        let table = EvaluationReport::from_frames(&acc, &labels).summary_table();
        assert!(table.contains("test_name"));
        assert!(table.contains("Walk"));
        assert!(table.contains("3.00"));
        assert!(table.contains("P2"));
    }
}
