// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence that the training workflow relies on but that
// belongs to no single business layer:
//
//   checkpoint.rs — checkpoint slots: model weights and
//                   optimiser state through Burn's
//                   BinFileRecorder, scalar training state
//                   (epoch, lr, min_loss, architecture) as JSON,
//                   and snapshot discovery for ensembling
//
//   metrics.rs    — per-epoch CSV log of errors and loss terms
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint saving, loading and discovery
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
