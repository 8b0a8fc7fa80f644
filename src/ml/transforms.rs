// ============================================================
// Layer 5 — Pose Tensor Transforms
// ============================================================
// Shape-preserving edits of [N, T, J, C] pose tensors shared by
// the training and evaluation passes.

use burn::prelude::*;

use crate::domain::skeleton::{flip_permutation, ROOT_JOINT};

/// Keep only the x,y channels
pub fn strip_confidence<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, j, _] = x.dims();
    x.slice([0..n, 0..t, 0..j, 0..2])
}

/// The confidence channel `[N, T, J, 1]`, or ones when the input has none
pub fn confidence<B: Backend>(x: &Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, j, c] = x.dims();
    if c > 2 {
        x.clone().slice([0..n, 0..t, 0..j, 2..3])
    } else {
        Tensor::ones([n, t, j, 1], &x.device())
    }
}

/// Subtract the root joint of each frame from every joint
pub fn root_relative<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, _, c] = x.dims();
    let root = x.clone().slice([0..n, 0..t, ROOT_JOINT..ROOT_JOINT + 1, 0..c]);
    x - root
}

/// Shift depth so the root of the first frame sits at z = 0
pub fn anchor_root_depth<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, j, _] = x.dims();
    let root_z = x.clone().slice([0..n, 0..1, ROOT_JOINT..ROOT_JOINT + 1, 2..3]);
    let z = x.clone().slice([0..n, 0..t, 0..j, 2..3]) - root_z;
    x.slice_assign([0..n, 0..t, 0..j, 2..3], z)
}

/// Set the root joint of every frame to the origin
pub fn zero_root<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, _, c] = x.dims();
    let device = x.device();
    x.slice_assign(
        [0..n, 0..t, ROOT_JOINT..ROOT_JOINT + 1, 0..c],
        Tensor::zeros([n, t, 1, c], &device),
    )
}

/// Replace the x,y channels of `pred` with those of `input`
pub fn copy_xy<B: Backend>(pred: Tensor<B, 4>, input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, t, j, _] = pred.dims();
    let xy = input.slice([0..n, 0..t, 0..j, 0..2]);
    pred.slice_assign([0..n, 0..t, 0..j, 0..2], xy)
}

/// Mirror a pose tensor `[N, T, J, C]` about the vertical axis:
/// negate x and swap left/right joints.
pub fn flip_pose<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, j, c] = x.dims();
    let device = x.device();

    let perm: Vec<i32> = flip_permutation(j).into_iter().map(|i| i as i32).collect();
    let perm = Tensor::<B, 1, Int>::from_ints(perm.as_slice(), &device);

    let signs: Vec<f32> = (0..c).map(|ch| if ch == 0 { -1.0 } else { 1.0 }).collect();
    let signs = Tensor::<B, 1>::from_floats(signs.as_slice(), &device).reshape([1, 1, 1, c]);

    x.select(2, perm) * signs
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn values(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_flip_is_an_involution() {
        let x = Tensor::<TestBackend, 4>::random([2, 4, 17, 3], Distribution::Uniform(-1.0, 1.0), &Default::default());
        let back = flip_pose(flip_pose(x.clone()));
        for (a, b) in values(x).iter().zip(values(back)) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_flip_swaps_hips_and_negates_x() {
        let x = Tensor::<TestBackend, 4>::random([1, 1, 17, 3], Distribution::Uniform(-1.0, 1.0), &Default::default());
        let original = values(x.clone());
        let flipped = values(flip_pose(x));
        // right hip (1) ↔ left hip (4)
        assert_eq!(flipped[3], -original[12]);
        assert_eq!(flipped[4], original[13]);
        assert_eq!(flipped[5], original[14]);
        // root stays in place
        assert_eq!(flipped[0], -original[0]);
        assert_eq!(flipped[1], original[1]);
    }

    #[test]
    fn test_root_relative_zeroes_root() {
        let x = Tensor::<TestBackend, 4>::random([2, 3, 17, 3], Distribution::Uniform(-1.0, 1.0), &Default::default());
        let root: Vec<f32> = root_relative(x).slice([0..2, 0..3, 0..1, 0..3]).into_data().to_vec().unwrap();
        assert!(root.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_anchor_root_depth_only_touches_z() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([1, 2, 17, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let original = values(x.clone());
        let anchored = values(anchor_root_depth(x));
        assert_eq!(anchored[2], 0.0);
        // x,y of every joint unchanged; z shifted by the first root depth
        let offset = original[2];
        for (a, b) in original.chunks(3).zip(anchored.chunks(3)) {
            assert_eq!(a[0], b[0]);
            assert_eq!(a[1], b[1]);
            assert!((a[2] - offset - b[2]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_confidence_defaults_to_ones_without_channel() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 2, 17, 3], &device);
        let conf = confidence(&strip_confidence(x));
        assert_eq!(conf.dims(), [1, 2, 17, 1]);
        assert_eq!(conf.sum().into_scalar(), 34.0);
    }

    #[test]
    fn test_copy_xy_and_zero_root() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 4>::ones([1, 1, 17, 3], &device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 1, 17, 3], &device) + 5.0;
        let out = values(zero_root(copy_xy(pred, input)));
        assert_eq!(&out[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&out[3..6], &[5.0, 5.0, 1.0]);
    }
}
