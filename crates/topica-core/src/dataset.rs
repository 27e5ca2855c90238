//! Processed dataset on disk.
//!
//! Parsing raw bibliographic records happens elsewhere; this crate consumes
//! the already processed graph at `<root>/processed/graph.bin`.

use crate::error::Result;
use crate::hetero::HeteroGraph;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Location of the processed graph under a dataset root.
pub fn graph_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join("processed").join("graph.bin")
}

/// Load and validate the processed graph.
pub fn load_graph(root: impl AsRef<Path>) -> Result<HeteroGraph> {
    let path = graph_path(root);
    let graph = HeteroGraph::from_binary_file(&path)?;
    graph.validate()?;
    debug!(path = %path.display(), stats = ?graph.stats(), "loaded graph");
    Ok(graph)
}

/// Write the processed graph, creating `processed/` if needed.
pub fn save_graph(root: impl AsRef<Path>, graph: &HeteroGraph) -> Result<()> {
    let path = graph_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    graph.to_binary_file(path)
}
