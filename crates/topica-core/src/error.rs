//! Error types for topica-core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the graph store, split and sampler.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary (bincode) encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A precomputed infosphere edge set was requested but is not on disk.
    #[error("infosphere file not found: {}", path.display())]
    MissingInfosphere { path: PathBuf },

    /// Node type not present in the graph.
    #[error("node type not found: {0}")]
    NodeTypeNotFound(String),

    /// Edge type not present in the graph.
    #[error("edge type not found: {0}")]
    EdgeTypeNotFound(String),

    /// A node type lacks an attribute an operation depends on.
    #[error("node type {node_type} has no {attribute} attribute")]
    MissingAttribute {
        node_type: String,
        attribute: &'static str,
    },

    /// An edge references a node id outside its endpoint type's range.
    #[error("edge {edge_type} references node {index} but {node_type} has {num_nodes} nodes")]
    DanglingEdge {
        edge_type: String,
        node_type: String,
        index: usize,
        num_nodes: usize,
    },

    /// A per-node vector does not have one entry per node.
    #[error("{node_type}.{attribute} has {got} entries, expected {expected}")]
    LengthMismatch {
        node_type: String,
        attribute: &'static str,
        expected: usize,
        got: usize,
    },

    /// The non-edge space is too small to draw the requested negatives.
    #[error("cannot draw {requested} negative pairs, only {available} non-edges exist")]
    InsufficientNegatives { requested: usize, available: usize },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for topica-core.
pub type Result<T> = std::result::Result<T, Error>;
