// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

//! Temporal heterogeneous graph store for next-topic link prediction.
//!
//! This crate provides the data side of the pipeline:
//!
//! - [`HeteroGraph`] - typed nodes and edges with fold/year attributes
//! - [`temporal::filter`] - fold/year subgraphs with stable node ids
//! - [`transform::undirect`] - reverse relations for message passing
//! - [`target`] - next-topic ground truth, generated once and cached
//! - [`infosphere`] - merge of precomputed auxiliary edge sets
//! - [`split::RandomLinkSplit`] - positive/negative supervision pairs
//! - [`sampling::LinkNeighborLoader`] - mini-batches around labeled pairs
//!
//! # The Academic Graph
//!
//! ```text
//!            writes            about
//!   author ──────────▶ paper ─────────▶ topic
//!      │                │ ▲               ▲
//!      │                └─┘ cites         │
//!      └───────────── next_topic ─────────┘   (prediction target)
//! ```
//!
//! Authors carry a fold tag (0-4) that partitions them into train and
//! validation populations; papers carry a publication year. A training
//! experiment fixes a year `Y`, restricts both populations to papers
//! published up to `Y`, and asks which topics each author will write about
//! next.
//!
//! # Time and Leakage
//!
//! | Mode | Target year | Target edges |
//! |------|-------------|--------------|
//! | all | `Y + 1` | every topic of the author's papers in that year |
//! | only new | `Y` | topics never touched by the author before `Y` |
//!
//! The `next_topic` relation never takes part in message passing: it is
//! excluded from [`transform::undirect`] and stripped from every sampled
//! batch through a [`hetero::StructuralView`]. It does, however, stay in the
//! graph handed to the sampler, so target edges can still be used to
//! discover neighborhood nodes.
//!
//! # References
//!
//! - Hu et al. (2020). "Heterogeneous Graph Transformer" - the encoder.
//! - Hamilton et al. (2017). "Inductive Representation Learning on Large
//!   Graphs" - fanout-limited neighbor sampling.

pub mod dataset;
pub mod error;
pub mod hetero;
pub mod infosphere;
pub mod sampling;
pub mod schema;
pub mod split;
pub mod target;
pub mod temporal;
pub mod transform;

pub use error::{Error, Result};
pub use hetero::{EdgeStore, EdgeType, HeteroGraph, NodeFeatures, NodeStore, NodeType};
pub use sampling::{HeteroBatch, LinkNeighborLoader};
pub use split::{LinkSplitView, RandomLinkSplit};
pub use target::TargetMode;
