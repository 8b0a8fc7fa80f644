// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. Other layers work on plain Rust
// values (PoseSequence, LossMeters, EvaluationReport) and only
// touch Burn through the types re-exported below.
//
// What's in this layer:
//
//   model.rs      — PoseLifter: per-frame MLP lifting network
//                   • joint embedding
//                   • residual blocks (LayerNorm → Linear → GELU)
//                   • 3D regression head
//                   • relaxed (shape-tolerant) weight transplant
//
//   loss.rs       — the seven 3D loss terms and the weighted
//                   2D reprojection loss
//
//   transforms.rs — flip, root-centring, confidence handling
//
//   augment.rs    — 2D input masking and noise
//
//   trainer.rs    — one training epoch: forward, loss,
//                   backward, AdamW step
//
//   evaluator.rs  — inference over the test loader and scoring
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Backend used for training (GPU through WGPU, with autodiff)
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Backend of `model.valid()`, used for evaluation
pub type EvalBackend = burn::backend::Wgpu;

/// Pose lifting network and its config
pub mod model;

/// Training objectives
pub mod loss;

/// Shape-preserving pose tensor edits
pub mod transforms;

/// Training-time 2D augmentation
pub mod augment;

/// One training epoch
pub mod trainer;

/// Inference and scoring on the test split
pub mod evaluator;
