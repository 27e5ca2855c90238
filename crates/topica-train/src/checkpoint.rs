//! Best-model checkpoints.
//!
//! A checkpoint is three files in one directory, overwritten whenever
//! validation loss improves:
//!
//! - `model.safetensors` - every model variable, embeddings included
//! - `optimizer.safetensors` - Adam moments
//! - `checkpoint.json` - [`CheckpointMeta`]

use crate::error::Result;
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use topica_nn::Adam;
use tracing::debug;

pub const MODEL_FILE: &str = "model.safetensors";
pub const OPTIMIZER_FILE: &str = "optimizer.safetensors";
pub const META_FILE: &str = "checkpoint.json";

/// Scalars saved next to the tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Optimizer steps taken so far.
    pub optimizer_step: usize,
}

/// Persists model and optimizer state.
pub trait Checkpointer {
    fn save(&mut self, varmap: &VarMap, optimizer: &Adam, meta: &CheckpointMeta) -> Result<()>;
}

/// Writes checkpoints into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirCheckpointer {
    dir: PathBuf,
}

impl DirCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Restore a saved checkpoint into `varmap` and `optimizer`.
    pub fn restore(&self, varmap: &mut VarMap, optimizer: &mut Adam) -> Result<CheckpointMeta> {
        let reader = BufReader::new(File::open(self.dir.join(META_FILE))?);
        let meta: CheckpointMeta = serde_json::from_reader(reader)?;
        varmap.load(self.dir.join(MODEL_FILE))?;
        optimizer.load_state(self.dir.join(OPTIMIZER_FILE), meta.optimizer_step)?;
        Ok(meta)
    }
}

impl Checkpointer for DirCheckpointer {
    fn save(&mut self, varmap: &VarMap, optimizer: &Adam, meta: &CheckpointMeta) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        varmap.save(self.dir.join(MODEL_FILE))?;
        optimizer.save_state(self.dir.join(OPTIMIZER_FILE))?;
        let writer = BufWriter::new(File::create(self.dir.join(META_FILE))?);
        serde_json::to_writer_pretty(writer, meta)?;
        debug!(dir = %self.dir.display(), epoch = meta.epoch, "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{linear, Module, Optimizer, VarBuilder};
    use topica_nn::ParamsAdam;

    #[test]
    fn test_save_and_restore() {
        let device = Device::Cpu;
        let dir = tempfile::tempdir().unwrap();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let lin = linear(3, 2, vb.pp("lin")).unwrap();
        let mut opt = Adam::from_varmap(&varmap, ParamsAdam::default()).unwrap();
        let x = Tensor::ones((1, 3), DType::F32, &device).unwrap();
        opt.backward_step(&lin.forward(&x).unwrap().sum_all().unwrap()).unwrap();

        let meta = CheckpointMeta {
            epoch: 3,
            train_loss: 0.5,
            val_loss: 0.6,
            val_accuracy: 0.7,
            optimizer_step: opt.step_count(),
        };
        let mut ckpt = DirCheckpointer::new(dir.path());
        ckpt.save(&varmap, &opt, &meta).unwrap();
        for file in [MODEL_FILE, OPTIMIZER_FILE, META_FILE] {
            assert!(dir.path().join(file).exists());
        }

        let mut varmap2 = VarMap::new();
        let vb2 = VarBuilder::from_varmap(&varmap2, DType::F32, &device);
        let lin2 = linear(3, 2, vb2.pp("lin")).unwrap();
        let mut opt2 = Adam::from_varmap(&varmap2, ParamsAdam::default()).unwrap();
        let restored = ckpt.restore(&mut varmap2, &mut opt2).unwrap();

        assert_eq!(restored, meta);
        assert_eq!(opt2.step_count(), 1);
        assert_eq!(
            lin.weight().to_vec2::<f32>().unwrap(),
            lin2.weight().to_vec2::<f32>().unwrap()
        );
    }
}
