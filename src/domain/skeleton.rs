// ============================================================
// Layer 3 — H36M Skeleton
// ============================================================
// Joint layout shared by the data, loss and evaluation code.
//
//    0 root (pelvis)
//    1-3   right hip / knee / ankle
//    4-6   left  hip / knee / ankle
//    7-10  spine / thorax / neck / head
//    11-13 left  shoulder / elbow / wrist
//    14-16 right shoulder / elbow / wrist
//
// Poses are kept as nalgebra vectors once they leave the tensor
// world, so per-frame metrics read like plain geometry.

use nalgebra::Vector3;

/// Number of joints in the H36M 17-joint skeleton
pub const NUM_JOINTS: usize = 17;

/// Index of the pelvis, used for root-relative coordinates
pub const ROOT_JOINT: usize = 0;

/// Left-side joints, paired position-by-position with `RIGHT_JOINTS`
pub const LEFT_JOINTS: [usize; 6] = [4, 5, 6, 11, 12, 13];

/// Right-side joints
pub const RIGHT_JOINTS: [usize; 6] = [1, 2, 3, 14, 15, 16];

/// Bones as (parent, child) joint pairs
pub const LIMBS: [(usize, usize); 16] = [
    (0, 1), (1, 2), (2, 3),
    (0, 4), (4, 5), (5, 6),
    (0, 7), (7, 8), (8, 9), (9, 10),
    (8, 11), (11, 12), (12, 13),
    (8, 14), (14, 15), (15, 16),
];

/// Pairs of limbs (indices into `LIMBS`) whose relative angle is supervised
pub const LIMB_ANGLES: [(usize, usize); 18] = [
    (0, 3), (0, 6), (3, 6),
    (0, 1), (1, 2), (3, 4), (4, 5),
    (6, 7), (7, 10), (7, 13), (8, 13), (10, 13),
    (7, 8), (8, 9), (10, 11), (11, 12), (13, 14), (14, 15),
];

/// One joint position
pub type Joint = Vector3<f64>;

/// All joints of one frame
pub type PoseFrame = Vec<Joint>;

/// A temporal clip of poses, indexed `[frame][joint]`
pub type PoseSequence = Vec<PoseFrame>;

/// Joint permutation that mirrors a skeleton left/right.
///
/// Skeletons with a different joint count are returned unpermuted
/// so the flip degrades to a plain x-mirror.
pub fn flip_permutation(num_joints: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..num_joints).collect();
    if num_joints != NUM_JOINTS {
        return perm;
    }
    for (&l, &r) in LEFT_JOINTS.iter().zip(RIGHT_JOINTS.iter()) {
        perm[l] = r;
        perm[r] = l;
    }
    perm
}

/// Subtract the root joint from every joint of every frame
pub fn root_relative(seq: &PoseSequence) -> PoseSequence {
    seq.iter()
        .map(|frame| {
            let root = frame[ROOT_JOINT];
            frame.iter().map(|j| j - root).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_permutation_is_an_involution() {
        let perm = flip_permutation(NUM_JOINTS);
        for (i, &p) in perm.iter().enumerate() {
            assert_eq!(perm[p], i);
        }
        // spine joints stay put
        assert_eq!(perm[0], 0);
        assert_eq!(perm[8], 8);
        assert_eq!(perm[4], 1);
        assert_eq!(perm[14], 11);
    }

    #[test]
    fn test_root_relative_zeroes_root() {
        let frame = vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(2.0, 2.0, 5.0)];
        let rel = root_relative(&vec![frame]);
        assert_eq!(rel[0][0], Vector3::zeros());
        assert_eq!(rel[0][1], Vector3::new(1.0, 0.0, 2.0));
    }
}
