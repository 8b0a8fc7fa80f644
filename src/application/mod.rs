// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (a training run or a checkpoint ensemble).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No direct file formats here (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Think of this layer as the "director": it tells other
// layers what to do but doesn't do the work itself.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Experiment config (YAML)
pub mod config;

// Training / resume / finetune / single evaluation
pub mod train_use_case;

// Multi-checkpoint ensemble evaluation
pub mod evaluate_use_case;
