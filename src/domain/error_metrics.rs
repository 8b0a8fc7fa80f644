// ============================================================
// Layer 3 — Pose Error Metrics
// ============================================================
// Per-frame errors between a predicted and a ground-truth clip:
//
//   mpjpe     — mean Euclidean joint distance (Protocol #1)
//   p_mpjpe   — mpjpe after a similarity (Procrustes) alignment
//               of the prediction onto the ground truth (Protocol #2)
//   acc_error — distance between second finite differences,
//               one value per interior frame
//
// Inputs are expected to be root-relative already; none of these
// functions re-centre at the root.
//
// Reference: Gower (1975) Generalized Procrustes analysis

use nalgebra::{Matrix3, Vector3};

use crate::domain::skeleton::{PoseFrame, PoseSequence};

const EPS: f64 = 1e-12;

fn frame_distance(pred: &PoseFrame, gt: &PoseFrame) -> f64 {
    let n = pred.len().min(gt.len());
    if n == 0 {
        return 0.0;
    }
    pred.iter()
        .zip(gt.iter())
        .map(|(p, g)| (p - g).norm())
        .sum::<f64>()
        / n as f64
}

/// Mean per-joint position error for every frame
pub fn mpjpe(pred: &PoseSequence, gt: &PoseSequence) -> Vec<f64> {
    pred.iter()
        .zip(gt.iter())
        .map(|(p, g)| frame_distance(p, g))
        .collect()
}

/// MPJPE after aligning each predicted frame to its ground truth with
/// the optimal scale, rotation and translation
pub fn p_mpjpe(pred: &PoseSequence, gt: &PoseSequence) -> Vec<f64> {
    pred.iter()
        .zip(gt.iter())
        .map(|(p, g)| frame_distance(&procrustes_align(p, g), g))
        .collect()
}

fn centroid(frame: &PoseFrame) -> Vector3<f64> {
    let sum = frame.iter().fold(Vector3::zeros(), |acc, j| acc + j);
    sum / frame.len().max(1) as f64
}

/// Align `pred` onto `target`, returning the transformed prediction.
fn procrustes_align(pred: &PoseFrame, target: &PoseFrame) -> PoseFrame {
    let mu_x = centroid(target);
    let mu_y = centroid(pred);

    let x0: Vec<Vector3<f64>> = target.iter().map(|j| j - mu_x).collect();
    let y0: Vec<Vector3<f64>> = pred.iter().map(|j| j - mu_y).collect();

    let norm_x = x0.iter().map(|v| v.norm_squared()).sum::<f64>().sqrt().max(EPS);
    let norm_y = y0.iter().map(|v| v.norm_squared()).sum::<f64>().sqrt().max(EPS);

    // H = X0ᵀ Y0 with points as rows
    let mut h = Matrix3::<f64>::zeros();
    for (x, y) in x0.iter().zip(y0.iter()) {
        h += (x / norm_x) * (y / norm_y).transpose();
    }

    let svd = h.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return pred.clone(),
    };
    let mut v = v_t.transpose();
    let mut s = svd.singular_values;

    // Reflection fix: force det(R) = +1
    let r = v * u.transpose();
    if r.determinant() < 0.0 {
        let mut last = v.column_mut(2);
        last *= -1.0;
        s[2] *= -1.0;
    }
    let r = v * u.transpose();

    let scale = s.sum() * norm_x / norm_y;
    // Row-vector convention: aligned = a·y·R + t
    let rt = r.transpose();
    let t = mu_x - scale * (rt * mu_y);

    pred.iter().map(|y| scale * (rt * y) + t).collect()
}

/// Acceleration error per interior frame.
///
/// Element `k` belongs to frame `k + 1` of the clip; clips shorter
/// than three frames yield an empty vector.
pub fn acc_error(pred: &PoseSequence, gt: &PoseSequence) -> Vec<f64> {
    let t = pred.len().min(gt.len());
    if t < 3 {
        return Vec::new();
    }
    (0..t - 2)
        .map(|k| {
            let joints = pred[k].len().min(gt[k].len());
            if joints == 0 {
                return 0.0;
            }
            (0..joints)
                .map(|j| {
                    let acc_p = pred[k][j] - 2.0 * pred[k + 1][j] + pred[k + 2][j];
                    let acc_g = gt[k][j] - 2.0 * gt[k + 1][j] + gt[k + 2][j];
                    (acc_p - acc_g).norm()
                })
                .sum::<f64>()
                / joints as f64
        })
        .collect()
}
