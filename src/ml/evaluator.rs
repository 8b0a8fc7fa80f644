// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Runs a model in inference mode over the test loader and
// scores the result:
//
//   predict_clips()  — batches → one PoseSequence per clip
//   evaluate()       — denormalize, score per action, print
//                      the P1/P2 table and protocol errors
//
// The caller passes the inner (non-autodiff) model obtained
// with `model.valid()`, so dropout is off and no graph is kept.

use anyhow::{anyhow, ensure, Result};
use burn::{data::dataloader::DataLoader, prelude::*};
use nalgebra::Vector3;

use crate::application::config::ExperimentConfig;
use crate::data::{batcher::PoseBatch, reader::H36mReader};
use crate::domain::{
    evaluation::{evaluate_clips, EvaluationReport},
    skeleton::PoseSequence,
};
use crate::ml::{
    model::PoseLifter,
    trainer::progress_bar,
    transforms::{copy_xy, flip_pose, strip_confidence, zero_root},
};

/// Model output for one batch, with test-time flip averaging and the
/// root / 2D-oracle overrides applied.
pub fn predict_batch<B: Backend>(cfg: &ExperimentConfig, model: &PoseLifter<B>, input: Tensor<B, 4>) -> Tensor<B, 4> {
    let input = if cfg.no_conf { strip_confidence(input) } else { input };

    let mut pred = if cfg.flip {
        let direct  = model.forward(input.clone());
        let flipped = flip_pose(model.forward(flip_pose(input.clone())));
        (direct + flipped).div_scalar(2.0)
    } else {
        model.forward(input.clone())
    };

    if cfg.root_rel {
        pred = zero_root(pred);
    }
    if cfg.gt_2d {
        pred = copy_xy(pred, input);
    }
    pred
}

/// Split a `[N, T, J, 3]` tensor into N pose sequences
pub fn to_sequences<B: Backend>(pred: Tensor<B, 4>) -> Result<Vec<PoseSequence>> {
    let [n, t, j, c] = pred.dims();
    ensure!(c == 3, "expected 3D output, got {c} channels");
    let values: Vec<f32> = pred
        .into_data()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read prediction tensor: {e:?}"))?;

    Ok(values
        .chunks(t * j * 3)
        .take(n)
        .map(|clip| {
            clip.chunks(j * 3)
                .map(|frame| {
                    frame
                        .chunks(3)
                        .map(|p| Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64))
                        .collect()
                })
                .collect()
        })
        .collect())
}

/// Predictions for every test clip, in loader order
pub fn predict_clips<B: Backend>(
    cfg:    &ExperimentConfig,
    model:  &PoseLifter<B>,
    loader: &dyn DataLoader<PoseBatch<B>>,
) -> Result<Vec<PoseSequence>> {
    let progress = progress_bar(loader.num_items());
    let mut clips = Vec::new();
    for batch in loader.iter() {
        let n = batch.input.dims()[0];
        clips.extend(to_sequences(predict_batch(cfg, model, batch.input))?);
        progress.inc(n as u64);
    }
    progress.finish();
    Ok(clips)
}

/// Score `model` on the test split and print the results
pub fn evaluate<B: Backend>(
    cfg:    &ExperimentConfig,
    model:  &PoseLifter<B>,
    loader: &dyn DataLoader<PoseBatch<B>>,
    reader: &H36mReader,
) -> Result<EvaluationReport> {
    tracing::info!("Evaluating on {} test frames", reader.test().num_frames());

    let clips = reader.split_ids();
    let predictions = predict_clips(cfg, model, loader)?;
    let predictions = reader.denormalize(&clips, predictions)?;
    let report = evaluate_clips(reader.test(), &clips, &predictions)?;

    println!("{}", report.summary_table());
    println!("Protocol #1 Error (MPJPE): {} mm", report.mpjpe);
    println!("Protocol #2 Error (P-MPJPE): {} mm", report.p_mpjpe);
    println!("Acceleration error: {} mm/s^2", report.acc_error);
    println!("----------");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::PoseLifterConfig;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn model(cfg: &ExperimentConfig) -> PoseLifter<TestBackend> {
        cfg.model.init(&Default::default())
    }

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            model: PoseLifterConfig::new().with_hidden_dim(8).with_depth(1).with_dropout(0.0),
            ..Default::default()
        }
    }

    fn input() -> Tensor<TestBackend, 4> {
        Tensor::random([2, 4, 17, 3], Distribution::Uniform(-1.0, 1.0), &Default::default())
    }

    #[test]
    fn test_to_sequences_layout() {
        let x = input();
        let flat: Vec<f32> = x.clone().into_data().to_vec().unwrap();
        let seqs = to_sequences(x).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[1].len(), 4);
        assert_eq!(seqs[1][3].len(), 17);
        // clip 1, frame 2, joint 5, channel 1
        let idx = ((1 * 4 + 2) * 17 + 5) * 3 + 1;
        assert_eq!(seqs[1][2][5].y, flat[idx] as f64);
    }

    #[test]
    fn test_flip_averaging_is_flip_equivariant() {
        let cfg = small_config();
        let m = model(&cfg);
        let x = input();
        let a: Vec<f32> = flip_pose(predict_batch(&cfg, &m, x.clone())).into_data().to_vec().unwrap();
        let b: Vec<f32> = predict_batch(&cfg, &m, flip_pose(x)).into_data().to_vec().unwrap();
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-4);
        }
    }

    #[test]
    fn test_root_rel_and_gt_2d_overrides() {
        let cfg = ExperimentConfig { root_rel: true, gt_2d: true, flip: false, ..small_config() };
        let m = model(&cfg);
        let x = input();
        let seqs = to_sequences(predict_batch(&cfg, &m, x.clone())).unwrap();
        let inp = to_sequences(x).unwrap();
        // gt_2d wins over the zeroed root for x,y
        assert_eq!(seqs[0][1][0].x, inp[0][1][0].x);
        assert_eq!(seqs[0][1][0].z, 0.0);
        assert_eq!(seqs[1][3][7].y, inp[1][3][7].y);
    }
}
