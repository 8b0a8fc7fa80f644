// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and arithmetic of the pose benchmark:
//
//   skeleton       — H36M joint layout, pose sequence types
//   error_metrics  — MPJPE, P-MPJPE and acceleration error
//   loss_meters    — running averages of the training loss terms
//   test_split     — frame-level annotations of the test split
//   evaluation     — overlap handling and per-action reduction
//   ensemble       — mean / min combination across checkpoints
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Everything is unit-testable without a device

pub mod skeleton;

pub mod error_metrics;

pub mod loss_meters;

pub mod test_split;

pub mod evaluation;

pub mod ensemble;
