//! Run configuration.
//!
//! A run is parameterized by a [`RunConfig`] (the four experiment values
//! given on the command line), an [`ExperimentConfig`] (paths and fixed
//! settings) and a [`TrainingConfig`] (loop limits). Model shape lives in
//! [`topica_nn::EncoderConfig`].

use crate::error::{Error, Result};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use topica_core::target::TargetMode;

/// The experiment being run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Merge the precomputed infosphere edges.
    pub use_infosphere: bool,
    /// Infosphere expansion depth.
    pub infosphere_depth: u32,
    /// Predict only topics the author never wrote about before.
    pub only_new: bool,
}

impl RunConfig {
    pub fn target_mode(&self) -> TargetMode {
        TargetMode::from_only_new(self.only_new)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Paths and settings shared by every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Dataset root (holds `processed/` and `computed_infosphere/`).
    pub root: PathBuf,
    /// Parent of run directories.
    pub models_dir: PathBuf,
    /// Prefix of run directory names.
    pub run_name: String,
    /// Last year visible to training.
    pub year: u16,
    /// Labeled pairs per batch.
    pub batch_size: usize,
    /// Neighbors per hop.
    pub fanout: Vec<usize>,
    /// Seed for splits and sampling.
    pub seed: u64,
    /// Force CPU even when CUDA is available.
    pub cpu: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("../anp_data"),
            models_dir: PathBuf::from("../anp_models"),
            run_name: "topica".to_string(),
            year: 2019,
            batch_size: 1024,
            fanout: vec![20, 10],
            seed: 42,
            cpu: false,
        }
    }
}

impl ExperimentConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = name.into();
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = year;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_fanout(mut self, fanout: Vec<usize>) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cpu(mut self, cpu: bool) -> Self {
        self.cpu = cpu;
        self
    }

    /// CUDA device 0 when available and not disabled, else CPU.
    pub fn device(&self) -> Result<Device> {
        if self.cpu {
            Ok(Device::Cpu)
        } else {
            Ok(Device::cuda_if_available(0)?)
        }
    }
}

/// Training loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Maximum number of epochs (default: 100).
    pub max_epochs: usize,
    /// Epochs without validation improvement before stopping (default: 5).
    pub patience: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 100,
            patience: 5,
        }
    }
}

impl TrainingConfig {
    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_mode() {
        let run = RunConfig {
            learning_rate: 0.01,
            use_infosphere: false,
            infosphere_depth: 0,
            only_new: true,
        };
        assert_eq!(run.target_mode(), TargetMode::OnlyNew);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_learning_rate() {
        let run = RunConfig {
            learning_rate: 0.0,
            use_infosphere: false,
            infosphere_depth: 0,
            only_new: false,
        };
        assert!(matches!(run.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_defaults() {
        let exp = ExperimentConfig::default();
        assert_eq!(exp.year, 2019);
        assert_eq!(exp.batch_size, 1024);
        assert_eq!(exp.fanout, vec![20, 10]);
        assert!(matches!(exp.with_cpu(true).device().unwrap(), Device::Cpu));

        let training = TrainingConfig::default();
        assert_eq!((training.max_epochs, training.patience), (100, 5));
    }
}
