// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per training epoch.
//
// Columns:
//   epoch       the epoch number (1, 2, 3, ...)
//   e1, e2      Protocol #1 / #2 errors in mm (empty with no_eval)
//   acc         acceleration error (empty with no_eval)
//   3d_pos ...  average of every loss term over the epoch
//               (empty when the term was not computed)
//
// Output file: <checkpoint>/logs/metrics.csv
//
// Example CSV output:
//   epoch,e1,e2,acc,3d_pos,3d_scale,...,total
//   1,52.113400,41.002100,3.120000,0.081200,0.079900,...,0.240100
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::loss_meters::{LossMeters, LossTerm};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch:  usize,
    pub e1:     Option<f64>,
    pub e2:     Option<f64>,
    pub acc:    Option<f64>,
    /// Average per loss term, None for terms never updated
    pub losses: [Option<f64>; LossTerm::COUNT],
}

impl EpochMetrics {
    pub fn new(epoch: usize, meters: &LossMeters) -> Self {
        let mut losses = [None; LossTerm::COUNT];
        for (term, avg) in meters.averages() {
            losses[term.index()] = Some(avg);
        }
        Self { epoch, e1: None, e2: None, acc: None, losses }
    }

    pub fn with_errors(mut self, e1: f64, e2: f64, acc: f64) -> Self {
        self.e1  = Some(e1);
        self.e2  = Some(e2);
        self.acc = Some(acc);
        self
    }

    /// Returns true if this epoch's e1 beats the best so far
    pub fn is_improvement(&self, min_loss: f64) -> bool {
        self.e1.is_some_and(|e1| e1 < min_loss)
    }

    fn header() -> String {
        let mut cols = vec!["epoch", "e1", "e2", "acc"];
        cols.extend(LossTerm::ALL.iter().map(|t| t.name()));
        cols.join(",")
    }

    fn row(&self) -> String {
        let cell = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
        let mut cells = vec![self.epoch.to_string(), cell(self.e1), cell(self.e2), cell(self.acc)];
        cells.extend(self.losses.iter().map(|&v| cell(v)));
        cells.join(",")
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `<checkpoint_dir>/logs/metrics.csv`, writing the header if
    /// the file is new. An existing log is appended to, so a resumed
    /// run continues the same file.
    pub fn new(checkpoint_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = checkpoint_dir.as_ref().join("logs");
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{}", EpochMetrics::header())?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.row())?;

        tracing::debug!("Logged epoch {} metrics", m.epoch);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
