// ============================================================
// Layer 5 — Training Losses
// ============================================================
// All losses take pose tensors of shape [N, T, J, 3] and
// return a single-element tensor so they can be weighted,
// summed and back-propagated together.
//
//   loss_mpjpe          mean joint distance
//   n_mpjpe             mpjpe after a least-squares scale fit
//   loss_velocity       mpjpe of the frame-to-frame differences
//   loss_limb_var       temporal variance of each limb length
//   loss_limb_gt        L1 between predicted and true limb lengths
//   loss_angle          L1 between cosines of limb-pair angles
//   loss_angle_velocity L1 between temporal changes of those cosines
//   loss_2d_weighted    confidence-weighted 2D reprojection error
//
// The limb and angle losses assume the 17-joint H36M layout.

use burn::prelude::*;

use crate::domain::skeleton::{LIMBS, LIMB_ANGLES};

const EPS: f64 = 1e-8;

/// Euclidean norm over the last axis, keeping it as size 1
fn joint_norm<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.powf_scalar(2.0).sum_dim(3).add_scalar(1e-12).sqrt()
}

fn index_tensor<B: Backend>(idx: impl Iterator<Item = usize>, device: &B::Device) -> Tensor<B, 1, Int> {
    let idx: Vec<i32> = idx.map(|i| i as i32).collect();
    Tensor::<B, 1, Int>::from_ints(idx.as_slice(), device)
}

/// x[:, 1:] - x[:, :-1]
fn temporal_diff<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, j, c] = x.dims();
    x.clone().slice([0..n, 1..t, 0..j, 0..c]) - x.slice([0..n, 0..t - 1, 0..j, 0..c])
}

fn zero<B: Backend>(device: &B::Device) -> Tensor<B, 1> {
    Tensor::zeros([1], device)
}

/// Parent minus child joint for every limb → [N, T, L, 3]
fn limb_vectors<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = x.device();
    let parents  = index_tensor(LIMBS.iter().map(|&(p, _)| p), &device);
    let children = index_tensor(LIMBS.iter().map(|&(_, c)| c), &device);
    x.clone().select(2, parents) - x.select(2, children)
}

/// [N, T, L, 1]
pub fn limb_lens<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    joint_norm(limb_vectors(x))
}

/// Cosine of the angle between each configured limb pair → [N, T, A, 1]
fn limb_cosines<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = x.device();
    let limbs = limb_vectors(x);
    let first  = limbs.clone().select(2, index_tensor(LIMB_ANGLES.iter().map(|&(a, _)| a), &device));
    let second = limbs.select(2, index_tensor(LIMB_ANGLES.iter().map(|&(_, b)| b), &device));

    let dot   = (first.clone() * second.clone()).sum_dim(3);
    let norms = joint_norm(first) * joint_norm(second);
    (dot / norms.add_scalar(EPS)).clamp(-1.0, 1.0)
}

pub fn loss_mpjpe<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
    joint_norm(pred - gt).mean()
}

/// Scale each predicted frame by the factor that best fits it to the
/// ground truth, then take mpjpe.
pub fn n_mpjpe<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
    let norm_pred   = pred.clone().powf_scalar(2.0).sum_dim(3).mean_dim(2);
    let norm_target = (gt.clone() * pred.clone()).sum_dim(3).mean_dim(2);
    let scale = norm_target / norm_pred.add_scalar(EPS);
    loss_mpjpe(pred * scale, gt)
}

pub fn loss_velocity<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
    if pred.dims()[1] <= 1 {
        return zero(&pred.device());
    }
    loss_mpjpe(temporal_diff(pred), temporal_diff(gt))
}

/// Limbs should keep their length over the clip
pub fn loss_limb_var<B: Backend>(pred: Tensor<B, 4>) -> Tensor<B, 1> {
    if pred.dims()[1] <= 1 {
        return zero(&pred.device());
    }
    limb_lens(pred).var(1).mean()
}

pub fn loss_limb_gt<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
    (limb_lens(pred) - limb_lens(gt)).abs().mean()
}

pub fn loss_angle<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
    (limb_cosines(pred) - limb_cosines(gt)).abs().mean()
}

pub fn loss_angle_velocity<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
    if pred.dims()[1] <= 1 {
        return zero(&pred.device());
    }
    let v_pred = temporal_diff(limb_cosines(pred));
    let v_gt   = temporal_diff(limb_cosines(gt));
    (v_pred - v_gt).abs().mean()
}

/// 2D error of the x,y channels, each joint weighted by `conf` ([N, T, J, 1])
pub fn loss_2d_weighted<B: Backend>(pred: Tensor<B, 4>, gt: Tensor<B, 4>, conf: Tensor<B, 4>) -> Tensor<B, 1> {
    let [n, t, j, _] = pred.dims();
    let pred_xy = pred.slice([0..n, 0..t, 0..j, 0..2]);
    let gt_xy   = gt.slice([0..n, 0..t, 0..j, 0..2]);
    joint_norm((pred_xy - gt_xy) * conf).mean()
}
