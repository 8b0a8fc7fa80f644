// ============================================================
// Layer 4 — Pose Batcher
// ============================================================
// Implements Burn's Batcher trait to stack PoseClips into
// device tensors.
//
//   Input:  Vec of N clips, each T frames × J joints
//   Output: PoseBatch with
//             input [N, T, J, C]
//             label [N, T, J, 3]
//
// Clips are flattened frame-major, joint-minor, then reshaped.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::PoseClip;

/// A batch of clips ready for the forward pass
#[derive(Debug, Clone)]
pub struct PoseBatch<B: Backend> {
    /// 2D joints (+ confidence) — `[N, T, J, C]`
    pub input: Tensor<B, 4>,

    /// 3D joints — `[N, T, J, 3]`
    pub label: Tensor<B, 4>,
}

#[derive(Clone, Debug)]
pub struct PoseBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> PoseBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PoseClip, PoseBatch<B>> for PoseBatcher<B> {
    fn batch(&self, items: Vec<PoseClip>) -> PoseBatch<B> {
        let n = items.len();
        // MotionDataset guarantees one shape per split
        let t = items[0].num_frames();
        let j = items[0].num_joints();
        let c = items[0].num_channels();

        let input_flat: Vec<f32> = items
            .iter()
            .flat_map(|clip| clip.input.iter().flatten().flatten().copied())
            .collect();

        let label_flat: Vec<f32> = items
            .iter()
            .flat_map(|clip| clip.label.iter().flatten().flat_map(|joint| joint.iter().copied()))
            .collect();

        let input = Tensor::<B, 1>::from_floats(input_flat.as_slice(), &self.device)
            .reshape([n, t, j, c]);

        let label = Tensor::<B, 1>::from_floats(label_flat.as_slice(), &self.device)
            .reshape([n, t, j, 3]);

        PoseBatch { input, label }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::synthetic_clip;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_batch_shapes_and_layout() {
        let device = Default::default();
        let batcher = PoseBatcher::<TestBackend>::new(device);
        let clips = vec![synthetic_clip(5, 3, 0.0), synthetic_clip(5, 3, 1.0)];

        let batch = batcher.batch(clips.clone());
        assert_eq!(batch.input.dims(), [2, 5, 17, 3]);
        assert_eq!(batch.label.dims(), [2, 5, 17, 3]);

        // second clip, frame 4, joint 16, channel 1
        let v: Vec<f32> = batch
            .input
            .slice([1..2, 4..5, 16..17, 1..2])
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(v[0], clips[1].input[4][16][1]);

        let l: Vec<f32> = batch
            .label
            .slice([0..1, 2..3, 3..4, 0..3])
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(l, clips[0].label[2][3].to_vec());
    }
}
