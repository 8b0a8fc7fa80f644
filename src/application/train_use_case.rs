// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full run in order:
//
//   Step 1: Load the experiment config      (Layer 2)
//   Step 2: Seed the backend                (Layer 5 - ml)
//   Step 3: Open checkpoint directories     (Layer 6 - infra)
//   Step 4: Decide how to start             (fresh / resume /
//                                            finetune / evaluate)
//   Step 5: Build datasets and loaders      (Layer 4 - data)
//   Step 6: Build and load the model        (Layer 5 + 6)
//   Step 7: Evaluate once, or run the epoch loop with
//           learning-rate decay and checkpointing
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::AdamWConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{path::PathBuf, sync::Arc, time::Instant};

use crate::application::config::ExperimentConfig;
use crate::data::{
    batcher::{PoseBatch, PoseBatcher},
    dataset::{MotionDataset, Split},
    reader::H36mReader,
};
use crate::domain::{
    evaluation::EvaluationReport,
    loss_meters::{LossMeters, LossTerm},
};
use crate::infra::{
    checkpoint::{
        best_name, epoch_name, latest_name, snapshot_name, CheckpointManager, CheckpointMeta,
        MIN_LOSS_SENTINEL,
    },
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluator::evaluate,
    model::{PoseLifter, PoseLifterConfig},
    trainer::train_epoch,
    TrainBackend,
};

// ─── Run Options ─────────────────────────────────────────────────────────────
// Paths and switches that come from the command line rather than the
// YAML config. Built from the CLI args at the Layer 1 boundary.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config:          PathBuf,
    /// Directory read for resume / evaluate, and written unless
    /// `new_checkpoint` is set
    pub checkpoint:      PathBuf,
    pub pretrained:      PathBuf,
    /// Checkpoint file to evaluate; selects evaluate-only mode
    pub evaluate:        Option<String>,
    /// Checkpoint file under `pretrained` to finetune from
    pub selection:       String,
    pub seed:            u64,
    pub new_checkpoint:  Option<PathBuf>,
    pub checkpoint_file: Option<String>,
    pub num_cpus:        usize,
    pub resume:          bool,
    pub eval_only:       bool,
    pub refine:          bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config:          PathBuf::from("configs/pretrain.yaml"),
            checkpoint:      PathBuf::from("checkpoint"),
            pretrained:      PathBuf::from("checkpoint"),
            evaluate:        None,
            selection:       "latest_epoch.bin".to_string(),
            seed:            654262,
            new_checkpoint:  None,
            checkpoint_file: None,
            num_cpus:        8,
            resume:          false,
            eval_only:       false,
            refine:          false,
        }
    }
}

impl RunOptions {
    /// Where checkpoints of this run are written
    pub fn write_dir(&self) -> PathBuf {
        self.new_checkpoint.clone().unwrap_or_else(|| self.checkpoint.clone())
    }

    /// Explicitly requested resume file, if any
    pub fn resume_file(&self) -> Option<String> {
        self.resume.then(|| {
            self.checkpoint_file
                .clone()
                .unwrap_or_else(|| latest_name(self.refine).to_string())
        })
    }

    /// Explicitly requested evaluation file, if any
    pub fn evaluate_file(&self) -> Option<String> {
        self.evaluate.clone().or_else(|| {
            self.eval_only.then(|| {
                self.checkpoint_file
                    .clone()
                    .unwrap_or_else(|| best_name(self.refine).to_string())
            })
        })
    }
}

// ─── Start Mode ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartMode {
    /// Freshly initialised model
    Fresh,
    /// Continue training from a file in the checkpoint directory (strict)
    Resume(String),
    /// Transplant compatible weights from a pretrained file (relaxed)
    Finetune(PathBuf),
    /// Score a file in the checkpoint directory and stop (strict)
    Evaluate(String),
}

/// Decide how a run starts.
///
/// Without finetuning an existing rolling "latest" checkpoint forces a
/// resume. An evaluation request always wins.
pub fn decide_start_mode(finetune: bool, opts: &RunOptions, latest_exists: bool) -> StartMode {
    if let Some(file) = opts.evaluate_file() {
        return StartMode::Evaluate(file);
    }
    if let Some(file) = opts.resume_file() {
        return StartMode::Resume(file);
    }
    if finetune {
        StartMode::Finetune(opts.pretrained.join(&opts.selection))
    } else if latest_exists {
        StartMode::Resume(latest_name(opts.refine).to_string())
    } else {
        StartMode::Fresh
    }
}

// ─── Training State ──────────────────────────────────────────────────────────
// The scalars threaded through the epoch loop and persisted with
// every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingState {
    /// Next epoch to run (0-based)
    pub epoch:    usize,
    pub lr:       f64,
    /// Lowest e1 seen so far
    pub min_loss: f64,
}

/// One checkpoint write requested by the save policy
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSlot {
    pub name:     String,
    pub min_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavePolicy {
    pub refine:               bool,
    pub snapshot_threshold:   f64,
    pub checkpoint_frequency: usize,
}

impl TrainingState {
    pub fn fresh(lr: f64) -> Self {
        Self { epoch: 0, lr, min_loss: MIN_LOSS_SENTINEL }
    }

    /// State stored with a checkpoint; `default_lr` fills a missing meta
    pub fn from_meta(meta: Option<&CheckpointMeta>, default_lr: f64) -> Self {
        let Some(meta) = meta else {
            tracing::warn!("Checkpoint has no training state; starting from epoch 0");
            return Self::fresh(default_lr);
        };
        let min_loss = meta.min_loss.unwrap_or_else(|| {
            tracing::warn!("Checkpoint has no min_loss; keeping {}", MIN_LOSS_SENTINEL);
            MIN_LOSS_SENTINEL
        });
        Self { epoch: meta.epoch, lr: meta.lr, min_loss }
    }

    pub fn decay_lr(&mut self, factor: f64) {
        self.lr *= factor;
    }

    /// Meta written after finishing `epoch`
    pub fn meta(&self, epoch: usize, min_loss: f64, model: &PoseLifterConfig) -> CheckpointMeta {
        CheckpointMeta {
            epoch:    epoch + 1,
            lr:       self.lr,
            min_loss: Some(min_loss),
            model:    Some(model.clone()),
        }
    }

    /// Checkpoints to write after `epoch`, updating `min_loss`.
    ///
    /// "latest" is always written; the periodic slot follows the
    /// configured frequency; with evaluation errors a snapshot is
    /// written below the threshold and "best" on a new minimum.
    pub fn save_plan(&mut self, epoch: usize, errors: Option<(f64, f64)>, policy: &SavePolicy) -> Vec<SaveSlot> {
        let mut slots = vec![SaveSlot { name: latest_name(policy.refine).to_string(), min_loss: self.min_loss }];

        if policy.checkpoint_frequency > 0 && (epoch + 1) % policy.checkpoint_frequency == 0 {
            slots.push(SaveSlot { name: epoch_name(epoch), min_loss: self.min_loss });
        }

        if let Some((e1, e2)) = errors {
            if e1 < policy.snapshot_threshold {
                slots.push(SaveSlot { name: snapshot_name(e1, e2), min_loss: self.min_loss });
            }
            if e1 < self.min_loss {
                self.min_loss = e1;
                slots.push(SaveSlot { name: best_name(policy.refine).to_string(), min_loss: self.min_loss });
            }
        }
        slots
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Trained(TrainingState),
    Evaluated(EvaluationReport),
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    opts: RunOptions,
}

impl TrainUseCase {
    pub fn new(opts: RunOptions) -> Self {
        Self { opts }
    }

    /// Execute the run on the GPU backend
    pub fn execute(&self) -> Result<RunOutcome> {
        // ── Step 1: Load config ─────────────────────────────────────────────
        let cfg = ExperimentConfig::load(&self.opts.config)?;
        tracing::info!("Config: {:?}", cfg);

        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        train_with_config::<TrainBackend>(&cfg, &self.opts, &device)
    }
}

type Loader<B> = Arc<dyn DataLoader<PoseBatch<B>>>;

/// Test-side inputs of an evaluation
pub(crate) struct TestData<B: Backend> {
    pub loader: Loader<B>,
    pub reader: H36mReader,
}

impl<B: Backend> TestData<B> {
    pub(crate) fn load(cfg: &ExperimentConfig, device: &B::Device) -> Result<Self> {
        let dataset = MotionDataset::load(&cfg.data_root, &cfg.subset_list, Split::Test)?;
        check_clip_length(&dataset, cfg.n_frames)?;
        let reader = H36mReader::load(&cfg.dt_root, &cfg.dt_file, cfg.n_frames, cfg.test_stride())?;
        let expected = reader.split_ids().len();
        ensure!(
            dataset.clip_count() == expected,
            "test split has {} clips but the annotations describe {}",
            dataset.clip_count(),
            expected
        );
        // One worker keeps batches in clip order, which the reader relies on
        let loader = DataLoaderBuilder::new(PoseBatcher::<B>::new(device.clone()))
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(dataset);
        Ok(Self { loader, reader })
    }

    pub(crate) fn evaluate(&self, cfg: &ExperimentConfig, model: &PoseLifter<B>) -> Result<EvaluationReport> {
        evaluate(cfg, model, self.loader.as_ref(), &self.reader)
    }
}

fn check_clip_length(dataset: &MotionDataset, n_frames: usize) -> Result<()> {
    if let Some((frames, _, _)) = dataset.clip_shape() {
        ensure!(frames == n_frames, "clips have {frames} frames but n_frames is {n_frames}");
    }
    Ok(())
}

/// Full run on backend `B`.
pub fn train_with_config<B: AutodiffBackend>(cfg: &ExperimentConfig, opts: &RunOptions, device: &B::Device) -> Result<RunOutcome> {
    // ── Step 2: Seed ────────────────────────────────────────────────────────
    B::seed(opts.seed);

    // ── Step 3: Checkpoint directories ──────────────────────────────────────
    let read_ckpt  = CheckpointManager::new(&opts.checkpoint)?;
    let write_ckpt = CheckpointManager::new(opts.write_dir())?;

    // ── Step 4: Start mode ──────────────────────────────────────────────────
    let latest_exists = read_ckpt.exists(latest_name(opts.refine));
    let mode = decide_start_mode(cfg.finetune, opts, latest_exists);
    tracing::info!("Start mode: {:?}", mode);

    if opts.refine {
        println!("Implementing refinement");
    }

    // ── Evaluate-only ───────────────────────────────────────────────────────
    if let StartMode::Evaluate(file) = &mode {
        let test = TestData::<B::InnerBackend>::load(cfg, device)?;
        let model = read_ckpt.load_model(file, cfg.model.init::<B::InnerBackend>(device), device)?;
        return Ok(RunOutcome::Evaluated(test.evaluate(cfg, &model)?));
    }

    // ── Step 5: Data ────────────────────────────────────────────────────────
    let train_set = MotionDataset::load(&cfg.data_root, &cfg.subset_list, Split::Train)?;
    check_clip_length(&train_set, cfg.n_frames)?;
    let train_loader: Loader<B> = DataLoaderBuilder::new(PoseBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(opts.seed)
        .num_workers(opts.num_cpus.max(1))
        .build(train_set);
    let test = if cfg.no_eval {
        None
    } else {
        Some(TestData::<B::InnerBackend>::load(cfg, device)?)
    };

    // ── Step 6: Model, optimiser and training state ─────────────────────────
    let mut model: PoseLifter<B> = cfg.model.init(device);
    let mut optim = AdamWConfig::new()
        .with_weight_decay(cfg.weight_decay as f32)
        .init::<B, PoseLifter<B>>();
    let mut state = TrainingState::fresh(cfg.learning_rate);

    match &mode {
        StartMode::Fresh | StartMode::Evaluate(_) => {}
        StartMode::Resume(file) => {
            model = read_ckpt.load_model(file, model, device)?;
            optim = read_ckpt.load_optimizer::<B, _>(file, optim, device)?;
            state = TrainingState::from_meta(read_ckpt.load_meta(file)?.as_ref(), cfg.learning_rate);
        }
        StartMode::Finetune(path) => {
            model = load_pretrained(cfg, model, path, device)?;
        }
    }

    let param_count = model.num_params();
    tracing::info!("Trainable parameter count: {}", param_count);

    // ── Step 7: Epoch loop ──────────────────────────────────────────────────
    let logger = MetricsLogger::new(write_ckpt.dir())?;
    tracing::info!("Metrics log: {}", logger.csv_path().display());
    let policy = SavePolicy {
        refine:               opts.refine,
        snapshot_threshold:   cfg.snapshot_threshold,
        checkpoint_frequency: cfg.checkpoint_frequency,
    };

    for epoch in state.epoch..cfg.epochs {
        println!("Training epoch {}.", epoch);
        let start = Instant::now();

        let mut meters = LossMeters::new();
        model = train_epoch(cfg, model, train_loader.as_ref(), &mut meters, &mut optim, state.lr);
        let elapsed = start.elapsed().as_secs_f64() / 60.0;

        let mut metrics = EpochMetrics::new(epoch + 1, &meters);
        let errors = match &test {
            None => {
                println!(
                    "[{}] time {:.2} lr {:.6} 3d_train {:.6}",
                    epoch + 1, elapsed, state.lr, meters.avg(LossTerm::Pos3d),
                );
                None
            }
            Some(test) => {
                let report = test.evaluate(cfg, &model.valid())?;
                println!(
                    "[{}] time {:.2} lr {:.6} 3d_train {:.6} e1 {:.6} e2 {:.6}",
                    epoch + 1, elapsed, state.lr, meters.avg(LossTerm::Pos3d), report.mpjpe, report.p_mpjpe,
                );
                metrics = metrics.with_errors(report.mpjpe, report.p_mpjpe, report.acc_error);
                Some((report.mpjpe, report.p_mpjpe))
            }
        };
        logger.log(&metrics)?;
        if metrics.is_improvement(state.min_loss) {
            tracing::info!("New best e1: {:.6} (was {:.6})", metrics.e1.unwrap_or_default(), state.min_loss);
        }

        // Decay learning rate exponentially
        state.decay_lr(cfg.lr_decay);

        for slot in state.save_plan(epoch, errors, &policy) {
            let meta = state.meta(epoch, slot.min_loss, &cfg.model);
            write_ckpt.save(&slot.name, &model, &optim, &meta)?;
        }
        state.epoch = epoch + 1;
    }

    tracing::info!("Training complete!");
    Ok(RunOutcome::Trained(state))
}

/// Relaxed load of a pretrained checkpoint into `model`.
///
/// The source architecture comes from the checkpoint's meta; without
/// one the target architecture is assumed.
fn load_pretrained<B: Backend>(
    cfg:    &ExperimentConfig,
    model:  PoseLifter<B>,
    path:   &std::path::Path,
    device: &B::Device,
) -> Result<PoseLifter<B>> {
    let dir  = path.parent().context("pretrained checkpoint path has no directory")?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("pretrained checkpoint path has no file name")?;
    let source_ckpt = CheckpointManager::open(dir);

    let source_cfg = match source_ckpt.load_meta(name)?.and_then(|m| m.model) {
        Some(source_cfg) => source_cfg,
        None => {
            tracing::warn!("'{}' records no architecture; assuming the configured one", path.display());
            cfg.model.clone()
        }
    };
    let source = source_ckpt.load_model(name, source_cfg.init::<B>(device), device)?;
    let (model, report) = model.load_relaxed(&cfg.model, source, &source_cfg);

    tracing::info!("Transplanted {} parameter groups: {:?}", report.loaded.len(), report.loaded);
    if !report.missing.is_empty() {
        tracing::warn!("Missing in pretrained checkpoint: {:?}", report.missing);
    }
    if !report.unexpected.is_empty() {
        tracing::warn!("Unused from pretrained checkpoint: {:?}", report.unexpected);
    }
    Ok(model)
}
