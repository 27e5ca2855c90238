//! Precomputed infosphere edges.
//!
//! An infosphere is a noisy expansion of the citation/authorship/topic graph
//! computed offline to a given depth. It is only ever read here; when a run
//! asks for one that does not exist the run fails.

use crate::error::{Error, Result};
use crate::hetero::{EdgeStore, EdgeType, HeteroGraph};
use crate::schema;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Folds an infosphere is computed over.
pub const ALL_FOLDS: [u8; 5] = [0, 1, 2, 3, 4];

/// The three auxiliary edge lists of an infosphere file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfosphereEdges {
    /// paper -> paper
    pub cites: EdgeStore,
    /// author -> paper
    pub writes: EdgeStore,
    /// paper -> topic
    pub about: EdgeStore,
}

impl InfosphereEdges {
    /// Read from a bincode file.
    pub fn from_binary_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Write to a bincode file.
    pub fn to_binary_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }
}

/// `<root>/computed_infosphere/<year>/<depth>_infosphere_<folds>_<year>_noisy.bin`
pub fn infosphere_path(root: impl AsRef<Path>, year: u16, depth: u32, folds: &[u8]) -> PathBuf {
    let folds = folds
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("_");
    root.as_ref()
        .join("computed_infosphere")
        .join(year.to_string())
        .join(format!("{depth}_infosphere_{folds}_{year}_noisy.bin"))
}

/// Load the infosphere of `depth` for `year`, computed over all folds.
pub fn load_infosphere(root: impl AsRef<Path>, year: u16, depth: u32) -> Result<InfosphereEdges> {
    let path = infosphere_path(root, year, depth, &ALL_FOLDS);
    if !path.exists() {
        return Err(Error::MissingInfosphere { path });
    }
    info!(path = %path.display(), "loading infosphere");
    InfosphereEdges::from_binary_file(&path)
}

/// Relation types the infosphere edges are merged under.
pub fn infosphere_edge_types() -> [EdgeType; 3] {
    [
        EdgeType::new(schema::PAPER, schema::INFOSPHERE_CITES, schema::PAPER),
        EdgeType::new(schema::AUTHOR, schema::INFOSPHERE_WRITES, schema::PAPER),
        EdgeType::new(schema::PAPER, schema::INFOSPHERE_ABOUT, schema::TOPIC),
    ]
}

/// Add the infosphere edges as `infosphere_*` relations, coalesced.
pub fn merge_infosphere(graph: &mut HeteroGraph, edges: InfosphereEdges) {
    let [cites, writes, about] = infosphere_edge_types();
    graph.insert_edges(cites, edges.cites.coalesced());
    graph.insert_edges(writes, edges.writes.coalesced());
    graph.insert_edges(about, edges.about.coalesced());
}
