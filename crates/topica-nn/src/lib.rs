#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

//! Neural components for next-topic link prediction, built on candle.
//!
//! - [`conv::HgtConv`] - heterogeneous graph transformer layer
//! - [`encoder::HgtEncoder`] - per-type input projection + HGT stack
//! - [`decoder::EdgeDecoder`] - MLP scoring head over endpoint pairs
//! - [`embedding::NodeEmbeddings`] - tables for embedded node types
//! - [`model::LinkPredictor`] - the three composed
//! - [`optim::Adam`] - Adam whose moments can be checkpointed
//! - [`loss::binary_cross_entropy_with_logits`]
//!
//! ```text
//! batch ──▶ x_dict ──▶ Linear+ReLU ──▶ HGTConv × L ──▶ z_author, z_topic
//!             ▲                                            │
//!   features or embedding[n_id]                 cat ─▶ MLP ─▶ logit
//! ```

pub mod conv;
pub mod decoder;
pub mod embedding;
pub mod encoder;
pub mod error;
pub mod input;
pub mod loss;
pub mod model;
pub mod optim;

pub use encoder::{EncoderConfig, ModelMetadata, NodeInput};
pub use error::{Error, Result};
pub use input::BatchTensors;
pub use model::LinkPredictor;
pub use optim::{Adam, ParamsAdam};
