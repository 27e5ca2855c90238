//! Fold/year subgraphs.
//!
//! Training and validation graphs are cut from the same frozen root graph:
//! authors are partitioned by fold, papers by publication year. Filtering is
//! a structural copy; the parent graph is never touched.

use crate::error::Result;
use crate::hetero::{EdgeStore, HeteroGraph, NodeStore, TypedNodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which nodes a subgraph keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFilter {
    /// Allowed folds, applied to node types that carry a fold tag.
    pub folds: Vec<u8>,
    /// Inclusive upper bound, applied to node types that carry a year.
    pub max_year: u16,
}

impl TemporalFilter {
    pub fn new(folds: impl Into<Vec<u8>>, max_year: u16) -> Self {
        Self {
            folds: folds.into(),
            max_year,
        }
    }

    /// Folds 0-3 up to `year`.
    pub fn train(year: u16) -> Self {
        Self::new([0, 1, 2, 3], year)
    }

    /// Fold 4 up to `year`.
    pub fn validation(year: u16) -> Self {
        Self::new([4], year)
    }

    fn keeps(&self, store: &NodeStore, idx: TypedNodeIndex) -> bool {
        let fold_ok = store
            .fold
            .as_ref()
            .map_or(true, |f| self.folds.contains(&f[idx]));
        let year_ok = store
            .year
            .as_ref()
            .map_or(true, |y| y[idx] <= self.max_year);
        fold_ok && year_ok
    }
}

/// Derive the subgraph selected by `filter`.
///
/// Surviving nodes are re-indexed densely in their original order and keep
/// their stable ids. An edge survives iff both endpoints survive.
pub fn filter(graph: &HeteroGraph, filter: &TemporalFilter) -> Result<HeteroGraph> {
    graph.validate()?;

    let mut out = HeteroGraph::new();
    let mut remap = BTreeMap::new();

    for (node_type, store) in graph.nodes() {
        let keep: Vec<TypedNodeIndex> = (0..store.num_nodes())
            .filter(|&i| filter.keeps(store, i))
            .collect();
        let mut local = vec![None; store.num_nodes()];
        for (new, &old) in keep.iter().enumerate() {
            local[old] = Some(new);
        }
        debug!(
            node_type = %node_type,
            kept = keep.len(),
            total = store.num_nodes(),
            "filtered nodes"
        );
        out.add_node_type(node_type.clone(), store.select(&keep));
        remap.insert(node_type.clone(), local);
    }

    for (edge_type, store) in graph.edges() {
        let src_map = &remap[&edge_type.src_type];
        let dst_map = &remap[&edge_type.dst_type];
        let kept = EdgeStore::from_pairs(
            store
                .iter()
                .filter_map(|(s, d)| Some((src_map[s]?, dst_map[d]?))),
        );
        out.insert_edges(edge_type.clone(), kept);
    }

    Ok(out)
}
