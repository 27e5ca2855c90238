#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

//! Training pipeline for next-topic link prediction.
//!
//! - [`pipeline::prepare`] - dataset root to train/validation loaders
//! - [`trainer::Trainer`] - epoch loop with early stopping
//! - [`metrics::PassMetrics`] - loss, accuracy and confusion counts
//! - [`checkpoint::DirCheckpointer`] - best model + optimizer state
//! - [`run::RunDirectory`] - `info.json` and `history.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use topica_train::config::{ExperimentConfig, RunConfig, TrainingConfig};
//! use topica_train::{pipeline, run::RunDirectory, trainer::Trainer};
//!
//! let run = RunConfig { learning_rate: 1e-3, use_infosphere: false, infosphere_depth: 0, only_new: true };
//! let exp = ExperimentConfig::default().with_root("data");
//! let mut data = pipeline::prepare(&run, &exp)?;
//! let mut dir = RunDirectory::create(&exp.models_dir, &exp.run_name, &run)?;
//! let mut trainer = Trainer::new(&data.metadata, data.target.clone(), &Default::default(),
//!     run.learning_rate, TrainingConfig::default(), exp.device()?)?;
//! let mut ckpt = dir.checkpointer();
//! let result = trainer.fit(&mut data.train_loader, &mut data.val_loader, &mut ckpt, &mut dir)?;
//! ```

pub mod checkpoint;
pub mod config;
pub mod early_stopping;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod run;
pub mod trainer;

pub use config::{ExperimentConfig, RunConfig, TrainingConfig};
pub use error::{Error, Result};
pub use trainer::{Trainer, TrainingResult};
