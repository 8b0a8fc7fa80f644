// ============================================================
// Layer 5 — 2D Input Augmentation
// ============================================================
// Applied to training inputs [N, T, J, C] only:
//
//   noise  Gaussian jitter on the x,y channels
//   mask   zero random joints (per frame, mask_ratio) and
//          whole random frames (shared by the batch, mask_t_ratio)
//
// Randomness comes from the backend RNG, so `Backend::seed`
// makes a run reproducible.

use burn::{prelude::*, tensor::Distribution};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Augmenter {
    pub mask_ratio:   f64,
    pub mask_t_ratio: f64,
    pub noise_std:    f64,
}

impl Augmenter {
    pub fn new(mask_ratio: f64, mask_t_ratio: f64, noise_std: f64) -> Self {
        Self { mask_ratio, mask_t_ratio, noise_std }
    }

    /// Masking needs both ratios to be positive
    pub fn masks(&self) -> bool {
        self.mask_ratio > 0.0 && self.mask_t_ratio > 0.0
    }

    pub fn augment_2d<B: Backend>(&self, x: Tensor<B, 4>, noise: bool, mask: bool) -> Tensor<B, 4> {
        let mut x = x;
        if noise {
            x = self.add_noise(x);
        }
        if mask {
            x = self.add_mask(x);
        }
        x
    }

    fn add_noise<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [n, t, j, c] = x.dims();
        let device = x.device();
        let jitter = Tensor::<B, 4>::random([n, t, j, 2], Distribution::Normal(0.0, self.noise_std), &device);
        let jitter = if c > 2 {
            Tensor::cat(vec![jitter, Tensor::zeros([n, t, j, c - 2], &device)], 3)
        } else {
            jitter
        };
        x + jitter
    }

    fn add_mask<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [n, t, j, _] = x.dims();
        let device = x.device();
        let keep_joint = Tensor::<B, 4>::random([n, t, j, 1], Distribution::Default, &device)
            .greater_equal_elem(self.mask_ratio)
            .float();
        let keep_frame = Tensor::<B, 4>::random([1, t, 1, 1], Distribution::Default, &device)
            .greater_equal_elem(self.mask_t_ratio)
            .float();
        x * keep_joint * keep_frame
    }
}
