// ============================================================
// Layer 3 — Checkpoint Ensembling
// ============================================================
// Combines the per-action results of several checkpoints two ways:
//
//   mean — average of each action's error across checkpoints
//   min  — best (lowest) error of each action across checkpoints
//
// Each combined vector is then reduced with the usual mean over
// actions. The `min` ensemble is an oracle selection and is only
// reported next to the mean, never used for checkpoint choice.

use anyhow::{ensure, Result};

use crate::domain::evaluation::{format_table, mean_over_actions, EvaluationReport};

/// Per-action P1/P2 of a combined ensemble and their action means
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleResult {
    pub p1: Vec<f64>,
    pub p2: Vec<f64>,
    pub e1: f64,
    pub e2: f64,
}

impl EnsembleResult {
    fn from_actions(p1: Vec<f64>, p2: Vec<f64>) -> Self {
        Self { e1: mean_over_actions(&p1), e2: mean_over_actions(&p2), p1, p2 }
    }
}

/// Running sum / minimum of per-action errors over checkpoints
#[derive(Debug, Clone, Default)]
pub struct EnsembleAccumulator {
    actions: Vec<String>,
    p1_sum:  Vec<f64>,
    p2_sum:  Vec<f64>,
    p1_min:  Vec<f64>,
    p2_min:  Vec<f64>,
    members: usize,
}

impl EnsembleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> usize {
        self.members
    }

    /// Fold in one checkpoint's evaluation.
    ///
    /// All members must report the same action list.
    pub fn add(&mut self, report: &EvaluationReport) -> Result<()> {
        let names = report.action_names();
        if self.members == 0 {
            let n = names.len();
            self.actions = names;
            self.p1_sum  = vec![0.0; n];
            self.p2_sum  = vec![0.0; n];
            self.p1_min  = vec![f64::INFINITY; n];
            self.p2_min  = vec![f64::INFINITY; n];
        } else {
            ensure!(
                names == self.actions,
                "ensemble member reports actions {:?}, expected {:?}",
                names,
                self.actions
            );
        }

        for (i, a) in report.actions.iter().enumerate() {
            self.p1_sum[i] += a.mpjpe;
            self.p2_sum[i] += a.p_mpjpe;
            self.p1_min[i]  = self.p1_min[i].min(a.mpjpe);
            self.p2_min[i]  = self.p2_min[i].min(a.p_mpjpe);
        }
        self.members += 1;
        Ok(())
    }

    /// Average across members
    pub fn mean(&self) -> Result<EnsembleResult> {
        ensure!(self.members > 0, "ensemble has no members");
        let n = self.members as f64;
        Ok(EnsembleResult::from_actions(
            self.p1_sum.iter().map(|s| s / n).collect(),
            self.p2_sum.iter().map(|s| s / n).collect(),
        ))
    }

    /// Per-action minimum across members
    pub fn min(&self) -> Result<EnsembleResult> {
        ensure!(self.members > 0, "ensemble has no members");
        Ok(EnsembleResult::from_actions(self.p1_min.clone(), self.p2_min.clone()))
    }

    /// Side-by-side table of both ensembles
    pub fn summary_table(&self) -> Result<String> {
        let mean = self.mean()?;
        let min  = self.min()?;
        let mut header = vec!["ensemble".to_string()];
        header.extend(self.actions.iter().cloned());
        let row = |name: &str, values: &[f64]| {
            let mut r = vec![name.to_string()];
            r.extend(values.iter().map(|v| format!("{v:.2}")));
            r
        };
        Ok(format_table(&header, &[
            row("mean P1", &mean.p1),
            row("mean P2", &mean.p2),
            row("min P1", &min.p1),
            row("min P2", &min.p2),
        ]))
    }
}
