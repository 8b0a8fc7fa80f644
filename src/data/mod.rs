// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between files on disk and tensor batches:
//
//   <root>/<subset>/<split>/*.json
//       │
//       ▼
//   MotionDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   PoseBatcher       → stacks clips into [N, T, J, C] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to train / evaluate
//
// and, on the evaluation side only:
//
//   <dt_root>/<dt_file>
//       │
//       ▼
//   H36mReader        → test frame annotations, clip frame
//                       lists, denormalization
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Implements Burn's Dataset trait for motion clips
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Test-split annotations, clip splitting and denormalization
pub mod reader;
