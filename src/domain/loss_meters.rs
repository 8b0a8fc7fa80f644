// ============================================================
// Layer 3 — Loss Meters
// ============================================================
// Running averages of every loss term during one epoch.
//
// The set of terms is closed, so instead of a string-keyed map
// each term is an enum variant and the meters live in a fixed
// array indexed by that variant. Misspelling a term is a compile
// error rather than a silently empty meter.

use std::ops::Index;

/// Every loss term the trainer reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LossTerm {
    Pos3d,
    Scale3d,
    Velocity3d,
    LimbVar,
    LimbGt,
    Angle,
    AngleVelocity,
    Proj2d,
    Total,
}

impl LossTerm {
    pub const COUNT: usize = 9;

    pub const ALL: [LossTerm; LossTerm::COUNT] = [
        LossTerm::Pos3d,
        LossTerm::Scale3d,
        LossTerm::Velocity3d,
        LossTerm::LimbVar,
        LossTerm::LimbGt,
        LossTerm::Angle,
        LossTerm::AngleVelocity,
        LossTerm::Proj2d,
        LossTerm::Total,
    ];

    /// Column / log name of the term
    pub fn name(self) -> &'static str {
        match self {
            LossTerm::Pos3d         => "3d_pos",
            LossTerm::Scale3d       => "3d_scale",
            LossTerm::Velocity3d    => "3d_velocity",
            LossTerm::LimbVar       => "lv",
            LossTerm::LimbGt        => "lg",
            LossTerm::Angle         => "angle",
            LossTerm::AngleVelocity => "angle_velocity",
            LossTerm::Proj2d        => "2d_proj",
            LossTerm::Total         => "total",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Running mean of a scalar weighted by sample count
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageMeter {
    /// Last value passed to `update`
    pub val:   f64,
    pub sum:   f64,
    pub count: usize,
    pub avg:   f64,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the mean over `n` samples
    pub fn update(&mut self, value: f64, n: usize) {
        self.val    = value;
        self.sum   += value * n as f64;
        self.count += n;
        self.avg    = if self.count > 0 { self.sum / self.count as f64 } else { 0.0 };
    }
}

/// One `AverageMeter` per `LossTerm`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossMeters {
    meters: [AverageMeter; LossTerm::COUNT],
}

impl LossMeters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, term: LossTerm, value: f64, n: usize) {
        self.meters[term.index()].update(value, n);
    }

    pub fn avg(&self, term: LossTerm) -> f64 {
        self.meters[term.index()].avg
    }

    /// Terms that received at least one update, with their averages
    pub fn averages(&self) -> impl Iterator<Item = (LossTerm, f64)> + '_ {
        LossTerm::ALL
            .iter()
            .filter(|t| self.meters[t.index()].count > 0)
            .map(|&t| (t, self.avg(t)))
    }
}

impl Index<LossTerm> for LossMeters {
    type Output = AverageMeter;

    fn index(&self, term: LossTerm) -> &AverageMeter {
        &self.meters[term.index()]
    }
}
