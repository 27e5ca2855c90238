//! Training loop with validation-based early stopping.
//!
//! Each epoch runs a training pass (forward, loss, backward, step per
//! batch) and an evaluation pass (forward only), then decides:
//!
//! ```text
//! epoch_start ─▶ train_pass ─▶ eval_pass ─▶ checkpoint_decision ─┬─▶ next epoch
//!                                                                └─▶ stop
//! ```
//!
//! A checkpoint is written whenever validation loss strictly improves. The
//! loop stops after `patience` epochs without improvement or at
//! `max_epochs`.

use crate::checkpoint::{CheckpointMeta, Checkpointer};
use crate::config::TrainingConfig;
use crate::early_stopping::{Decision, EarlyStopping};
use crate::error::Result;
use crate::metrics::PassMetrics;
use crate::run::{EpochRecord, RunDirectory, TrainingHistory};
use candle_core::{DType, Device};
use candle_nn::{Optimizer, VarBuilder, VarMap};
use std::fmt;
use topica_core::hetero::EdgeType;
use topica_core::sampling::LinkNeighborLoader;
use topica_nn::loss::binary_cross_entropy_with_logits;
use topica_nn::{Adam, BatchTensors, EncoderConfig, LinkPredictor, ModelMetadata, ParamsAdam};
use tracing::{debug, info};

/// Which pass a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Eval => f.write_str("val"),
        }
    }
}

/// Called after every batch with `(phase, epoch, batches done, batches total)`.
pub type ProgressCallback = Box<dyn Fn(Phase, usize, usize, usize) + Send + Sync>;

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// Epoch of the saved checkpoint, if any epoch improved.
    pub best_epoch: Option<usize>,
    pub best_val_loss: f64,
    pub epochs_run: usize,
    pub stopped_early: bool,
    pub history: TrainingHistory,
}

pub struct Trainer {
    model: LinkPredictor,
    varmap: VarMap,
    optimizer: Adam,
    device: Device,
    config: TrainingConfig,
    progress: Option<ProgressCallback>,
}

impl Trainer {
    /// Build a fresh model and optimizer for `metadata`.
    pub fn new(
        metadata: &ModelMetadata,
        target: EdgeType,
        encoder: &EncoderConfig,
        learning_rate: f64,
        config: TrainingConfig,
        device: Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = LinkPredictor::new(metadata, target, encoder, vb)?;
        let optimizer = Adam::from_varmap(
            &varmap,
            ParamsAdam {
                lr: learning_rate,
                ..ParamsAdam::default()
            },
        )?;
        Ok(Self {
            model,
            varmap,
            optimizer,
            device,
            config,
            progress: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }

    fn report(&self, phase: Phase, epoch: usize, done: usize, total: usize) {
        if let Some(cb) = &self.progress {
            cb(phase, epoch, done, total);
        }
    }

    /// One optimization pass over `loader`.
    pub fn train_pass(&mut self, epoch: usize, loader: &mut LinkNeighborLoader) -> Result<PassMetrics> {
        let mut metrics = PassMetrics::new();
        let total = loader.num_batches();
        for (i, batch) in loader.batches().enumerate() {
            let tensors = BatchTensors::from_batch(&batch, &self.device)?;
            let logits = self.model.forward(&tensors)?;
            let loss = binary_cross_entropy_with_logits(&logits, &tensors.edge_label)?;
            self.optimizer.backward_step(&loss)?;

            metrics.record_batch(
                f64::from(loss.to_scalar::<f32>()?),
                &logits.to_vec1::<f32>()?,
                &batch.edge_label,
            );
            self.report(Phase::Train, epoch, i + 1, total);
        }
        Ok(metrics)
    }

    /// Forward-only pass over `loader`. Inputs are detached before the
    /// encoder and the logits after it, so each batch's graph is dropped
    /// with the batch.
    pub fn eval_pass(&self, epoch: usize, loader: &mut LinkNeighborLoader) -> Result<PassMetrics> {
        let mut metrics = PassMetrics::new();
        let total = loader.num_batches();
        for (i, batch) in loader.batches().enumerate() {
            let tensors = BatchTensors::from_batch(&batch, &self.device)?;
            let logits = self.model.forward_t(&tensors, false)?.detach();
            let loss = binary_cross_entropy_with_logits(&logits, &tensors.edge_label)?;

            metrics.record_batch(
                f64::from(loss.to_scalar::<f32>()?),
                &logits.to_vec1::<f32>()?,
                &batch.edge_label,
            );
            self.report(Phase::Eval, epoch, i + 1, total);
        }
        Ok(metrics)
    }

    /// Train until early stopping or the epoch cap.
    ///
    /// Every epoch is appended to the run manifest; `history.json` is
    /// written once the loop ends.
    pub fn fit<C: Checkpointer>(
        &mut self,
        train: &mut LinkNeighborLoader,
        val: &mut LinkNeighborLoader,
        checkpointer: &mut C,
        run: &mut RunDirectory,
    ) -> Result<TrainingResult> {
        let mut stopper = EarlyStopping::new(self.config.patience);
        let mut history = TrainingHistory::default();
        let mut best_epoch = None;
        let mut stopped_early = false;
        let mut epochs_run = 0;

        for epoch in 1..=self.config.max_epochs {
            let train_metrics = self.train_pass(epoch, train)?;
            let val_metrics = self.eval_pass(epoch, val)?;
            let (t, v) = (train_metrics.summary(), val_metrics.summary());
            epochs_run = epoch;

            let decision = stopper.observe(v.loss);
            if decision == Decision::Improved {
                let meta = CheckpointMeta {
                    epoch,
                    train_loss: t.loss,
                    val_loss: v.loss,
                    val_accuracy: v.accuracy,
                    optimizer_step: self.optimizer.step_count(),
                };
                checkpointer.save(&self.varmap, &self.optimizer, &meta)?;
                best_epoch = Some(epoch);
                debug!(epoch, val_loss = v.loss, "validation loss improved");
            }

            history.push(&t, &v);
            run.append_epoch(EpochRecord {
                epoch,
                train_loss: t.loss,
                train_accuracy: t.accuracy,
                val_loss: v.loss,
                val_accuracy: v.accuracy,
                counter: stopper.counter(),
                improved: decision == Decision::Improved,
            })?;
            info!(
                "Epoch: {epoch:02}, Loss: {:.4} (train) - {:.4} (val), Accuracy: {:.4} (train) - {:.4} (val), Counter: {:02}",
                t.loss,
                v.loss,
                t.accuracy,
                v.accuracy,
                stopper.counter()
            );

            if decision == Decision::Stop {
                info!(epoch, "early stopping");
                stopped_early = true;
                break;
            }
        }

        run.write_history(&history)?;
        Ok(TrainingResult {
            best_epoch,
            best_val_loss: stopper.best(),
            epochs_run,
            stopped_early,
            history,
        })
    }
}
