// ============================================================
// Layer 5 — Training Epoch
// ============================================================
// One full pass over the training loader.
//
// Per batch:
//   1. optional confidence strip
//   2. ground truth made root-relative, or first-frame root
//      depth anchored at 0
//   3. optional 2D masking / noise on the input
//   4. forward, weighted loss, backward, optimiser step
//
// Progress is drawn per sample with indicatif, sized from the
// loader's item count, showing the last batch's total loss.
//
// Key Burn insight:
//   - The optimiser consumes the model and hands back the
//     updated one, so the model is threaded through by value
//   - Loss values reach the meters via into_scalar()
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use burn::{
    data::dataloader::DataLoader,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::config::ExperimentConfig;
use crate::data::batcher::PoseBatch;
use crate::domain::loss_meters::{LossMeters, LossTerm};
use crate::ml::{
    loss::{
        loss_2d_weighted, loss_angle, loss_angle_velocity, loss_limb_gt, loss_limb_var,
        loss_mpjpe, loss_velocity, n_mpjpe,
    },
    model::PoseLifter,
    transforms::{anchor_root_depth, confidence, root_relative, strip_confidence},
};

/// Bar over `len` samples
pub(crate) fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}

fn scalar<B: Backend>(loss: &Tensor<B, 1>) -> f64 {
    loss.clone().into_scalar().elem::<f64>()
}

/// The weighted 3D objective, recording every term in `meters`
fn loss_3d<B: Backend>(
    cfg:     &ExperimentConfig,
    pred:    Tensor<B, 4>,
    gt:      Tensor<B, 4>,
    meters:  &mut LossMeters,
    n:       usize,
) -> Tensor<B, 1> {
    let pos = loss_mpjpe(pred.clone(), gt.clone());
    meters.update(LossTerm::Pos3d, scalar(&pos), n);

    let weighted = [
        (LossTerm::Scale3d,       cfg.lambda_scale,       n_mpjpe(pred.clone(), gt.clone())),
        (LossTerm::Velocity3d,    cfg.lambda_3d_velocity, loss_velocity(pred.clone(), gt.clone())),
        (LossTerm::LimbVar,       cfg.lambda_lv,          loss_limb_var(pred.clone())),
        (LossTerm::LimbGt,        cfg.lambda_lg,          loss_limb_gt(pred.clone(), gt.clone())),
        (LossTerm::Angle,         cfg.lambda_a,           loss_angle(pred.clone(), gt.clone())),
        (LossTerm::AngleVelocity, cfg.lambda_av,          loss_angle_velocity(pred, gt)),
    ];

    weighted.into_iter().fold(pos, |total, (term, weight, loss)| {
        meters.update(term, scalar(&loss), n);
        total + loss.mul_scalar(weight)
    })
}

/// Train `model` for one epoch and return the updated model.
pub fn train_epoch<B, O>(
    cfg:    &ExperimentConfig,
    model:  PoseLifter<B>,
    loader: &dyn DataLoader<PoseBatch<B>>,
    meters: &mut LossMeters,
    optim:  &mut O,
    lr:     f64,
) -> PoseLifter<B>
where
    B: AutodiffBackend,
    O: Optimizer<PoseLifter<B>, B>,
{
    let augmenter = cfg.augmenter();
    let mask = augmenter.masks();
    let mut model = model;
    let progress = progress_bar(loader.num_items());

    for batch in loader.iter() {
        let n = batch.input.dims()[0];

        let mut input = batch.input;
        if cfg.no_conf {
            input = strip_confidence(input);
        }
        let conf = (!cfg.has_3d).then(|| confidence(&input));

        let gt = if cfg.root_rel {
            root_relative(batch.label)
        } else {
            anchor_root_depth(batch.label)
        };

        if mask || cfg.noise {
            input = augmenter.augment_2d(input, cfg.noise && cfg.has_gt, mask);
        }

        let pred = model.forward(input);

        let total = match conf {
            None => loss_3d(cfg, pred, gt, meters, n),
            Some(conf) => {
                let loss = loss_2d_weighted(pred, gt, conf);
                meters.update(LossTerm::Proj2d, scalar(&loss), n);
                loss
            }
        };
        let loss = scalar(&total);
        meters.update(LossTerm::Total, loss, n);

        let grads = total.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);

        progress.set_message(format!("loss:{loss:.6}"));
        progress.inc(n as u64);
    }

    progress.finish();
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        batcher::PoseBatcher,
        dataset::{tests::synthetic_clip, MotionDataset},
    };
    use crate::ml::model::PoseLifterConfig;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::DataLoaderBuilder,
        optim::AdamWConfig,
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    fn run(cfg: &ExperimentConfig) -> LossMeters {
        let device: <TestBackend as Backend>::Device = Default::default();
        let clips = (0..4).map(|i| synthetic_clip(5, 3, 0.1 * i as f32)).collect();
        let loader = DataLoaderBuilder::new(PoseBatcher::<TestBackend>::new(device.clone()))
            .batch_size(2)
            .build(MotionDataset::new(clips));

        let model: PoseLifter<TestBackend> = cfg.model.init(&device);
        let mut optim = AdamWConfig::new().init::<TestBackend, PoseLifter<TestBackend>>();
        let mut meters = LossMeters::new();
        let _model = train_epoch(cfg, model, loader.as_ref(), &mut meters, &mut optim, 1e-3);
        meters
    }

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            model: PoseLifterConfig::new().with_hidden_dim(8).with_depth(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_3d_epoch_fills_every_3d_meter() {
        let meters = run(&small_config());
        assert_eq!(meters[LossTerm::Total].count, 4);
        assert_eq!(meters[LossTerm::Pos3d].count, 4);
        assert_eq!(meters[LossTerm::AngleVelocity].count, 4);
        assert_eq!(meters[LossTerm::Proj2d].count, 0);
        assert!(meters.avg(LossTerm::Total) >= meters.avg(LossTerm::Pos3d));
    }

    #[test]
    fn test_progress_counts_samples() {
        let progress = progress_bar(6);
        assert_eq!(progress.length(), Some(6));
        progress.inc(2);
        progress.inc(2);
        assert_eq!(progress.position(), 4);
    }

    #[test]
    fn test_2d_epoch_uses_reprojection_only() {
        let cfg = ExperimentConfig { has_3d: false, noise: true, ..small_config() };
        let meters = run(&cfg);
        assert_eq!(meters[LossTerm::Proj2d].count, 4);
        assert_eq!(meters[LossTerm::Pos3d].count, 0);
        assert!((meters.avg(LossTerm::Total) - meters.avg(LossTerm::Proj2d)).abs() < 1e-9);
    }
}
