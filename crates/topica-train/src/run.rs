//! Run directory and manifest.
//!
//! Every run gets `<models_dir>/<name>_<YYYY_MM_DD_HH_MM_SS>/` containing:
//!
//! - `info.json` - the run's parameters plus one record per finished epoch
//! - `history.json` - loss/accuracy curves and final confusion matrices
//! - the best checkpoint (see [`crate::checkpoint`])

use crate::checkpoint::DirCheckpointer;
use crate::config::RunConfig;
use crate::error::Result;
use crate::metrics::{ConfusionMatrix, PassSummary};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub const INFO_FILE: &str = "info.json";
pub const HISTORY_FILE: &str = "history.json";

/// One finished epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Epochs since the last improvement, after this one.
    pub counter: usize,
    /// Whether this epoch produced a checkpoint.
    pub improved: bool,
}

/// Contents of `info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub lr: f64,
    pub use_infosphere: bool,
    pub infosphere_expansion: u32,
    pub only_new: bool,
    pub data: Vec<EpochRecord>,
}

impl From<&RunConfig> for RunManifest {
    fn from(run: &RunConfig) -> Self {
        Self {
            lr: run.learning_rate,
            use_infosphere: run.use_infosphere,
            infosphere_expansion: run.infosphere_depth,
            only_new: run.only_new,
            data: Vec::new(),
        }
    }
}

/// Curves for external plotting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub val_accuracy: Vec<f64>,
    /// Confusion counts of the last training pass.
    pub confusion_train: ConfusionMatrix,
    /// Confusion counts of the last validation pass.
    pub confusion_val: ConfusionMatrix,
}

impl TrainingHistory {
    pub fn push(&mut self, train: &PassSummary, val: &PassSummary) {
        self.train_loss.push(train.loss);
        self.val_loss.push(val.loss);
        self.train_accuracy.push(train.accuracy);
        self.val_accuracy.push(val.accuracy);
        self.confusion_train = train.confusion;
        self.confusion_val = val.confusion;
    }

    pub fn len(&self) -> usize {
        self.train_loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train_loss.is_empty()
    }
}

/// A run's output directory.
#[derive(Debug)]
pub struct RunDirectory {
    path: PathBuf,
    manifest: RunManifest,
}

impl RunDirectory {
    /// Create a fresh directory stamped with the current local time.
    pub fn create(models_dir: impl AsRef<Path>, name: &str, run: &RunConfig) -> Result<Self> {
        Self::create_at_time(models_dir, name, run, Local::now())
    }

    /// Create a fresh directory stamped with `time`. Fails if it exists.
    pub fn create_at_time(
        models_dir: impl AsRef<Path>,
        name: &str,
        run: &RunConfig,
        time: DateTime<Local>,
    ) -> Result<Self> {
        let models_dir = models_dir.as_ref();
        fs::create_dir_all(models_dir)?;
        let path = models_dir.join(format!("{name}_{}", time.format("%Y_%m_%d_%H_%M_%S")));
        fs::create_dir(&path)?;
        info!(path = %path.display(), "run directory");

        let dir = Self {
            path,
            manifest: RunManifest::from(run),
        };
        dir.write_manifest()?;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    /// Checkpointer writing into this directory.
    pub fn checkpointer(&self) -> DirCheckpointer {
        DirCheckpointer::new(&self.path)
    }

    /// Append an epoch to `info.json`.
    pub fn append_epoch(&mut self, record: EpochRecord) -> Result<()> {
        self.manifest.data.push(record);
        self.write_manifest()
    }

    /// Write `history.json`.
    pub fn write_history(&self, history: &TrainingHistory) -> Result<()> {
        write_json(&self.path.join(HISTORY_FILE), history)
    }

    fn write_manifest(&self) -> Result<()> {
        write_json(&self.path.join(INFO_FILE), &self.manifest)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}
