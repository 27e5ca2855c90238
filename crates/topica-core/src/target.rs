//! Next-topic ground truth.
//!
//! A `next_topic` edge links an author to a topic they publish about in a
//! given year. Generation scans the whole authorship graph, so the result is
//! cached under `<root>/processed/` and reused by later runs.

use crate::error::{Error, Result};
use crate::hetero::{EdgeStore, HeteroGraph, TypedNodeIndex};
use crate::schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which author-topic pairs count as targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMode {
    /// Every topic the author writes about in the target year.
    All,
    /// Only topics the author has not written about in earlier years.
    OnlyNew,
}

impl TargetMode {
    pub fn from_only_new(only_new: bool) -> Self {
        if only_new {
            Self::OnlyNew
        } else {
            Self::All
        }
    }

    /// Year whose activity is predicted when training on papers up to `year`.
    pub fn target_year(self, year: u16) -> u16 {
        match self {
            Self::All => year + 1,
            Self::OnlyNew => year,
        }
    }

    fn cache_stem(self) -> &'static str {
        match self {
            Self::All => "next_topic_edge",
            Self::OnlyNew => "difference_next_topic_edge",
        }
    }
}

/// Cache location for the targets of `target_year`.
pub fn cache_path(root: impl AsRef<Path>, target_year: u16, mode: TargetMode) -> PathBuf {
    root.as_ref()
        .join("processed")
        .join(format!("{}{target_year}.bin", mode.cache_stem()))
}

/// Compute `author -[next_topic]-> topic` edges for `year`.
///
/// Requires `writes`, `about` and per-paper years. The output is coalesced,
/// so repeated calls on the same graph give identical edges.
pub fn generate_target_edges(graph: &HeteroGraph, year: u16, mode: TargetMode) -> Result<EdgeStore> {
    let papers = graph.require_node_store(&schema::paper())?;
    let years = papers.year.as_ref().ok_or_else(|| Error::MissingAttribute {
        node_type: schema::PAPER.to_string(),
        attribute: "year",
    })?;
    let num_authors = graph.require_node_store(&schema::author())?.num_nodes();
    let writes = graph.require_edge_store(&schema::writes())?;
    let about = graph.require_edge_store(&schema::about())?;

    let mut paper_topics: Vec<Vec<TypedNodeIndex>> = vec![Vec::new(); papers.num_nodes()];
    for (p, t) in about.iter() {
        paper_topics[p].push(t);
    }

    let mut current: Vec<BTreeSet<TypedNodeIndex>> = vec![BTreeSet::new(); num_authors];
    let mut earlier: Vec<BTreeSet<TypedNodeIndex>> = vec![BTreeSet::new(); num_authors];
    for (a, p) in writes.iter() {
        let bucket = match years[p].cmp(&year) {
            std::cmp::Ordering::Equal => &mut current[a],
            std::cmp::Ordering::Less if mode == TargetMode::OnlyNew => &mut earlier[a],
            _ => continue,
        };
        bucket.extend(paper_topics[p].iter().copied());
    }

    let mut edges = EdgeStore::new();
    for (a, topics) in current.iter().enumerate() {
        for &t in topics.difference(&earlier[a]) {
            edges.add_edge(a, t);
        }
    }
    // authors ascend and each set is ordered, so this is already coalesced
    Ok(edges)
}

/// Read cached targets, or generate and cache them.
pub fn load_or_generate(
    graph: &HeteroGraph,
    root: impl AsRef<Path>,
    target_year: u16,
    mode: TargetMode,
) -> Result<EdgeStore> {
    let path = cache_path(root, target_year, mode);
    if path.exists() {
        debug!(path = %path.display(), "loading cached target edges");
        let reader = BufReader::new(File::open(&path)?);
        let edges: EdgeStore = bincode::deserialize_from(reader)?;
        return Ok(edges.coalesced());
    }

    info!(
        path = %path.display(),
        year = target_year,
        ?mode,
        "target cache missing, generating"
    );
    let edges = generate_target_edges(graph, target_year, mode)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    bincode::serialize_into(&mut writer, &edges)?;
    Ok(edges)
}
