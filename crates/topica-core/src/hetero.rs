//! Heterogeneous graph storage.
//!
//! A [`HeteroGraph`] holds one [`NodeStore`] per node type and one
//! [`EdgeStore`] per canonical edge type `(src_type, relation, dst_type)`,
//! mirroring PyTorch Geometric's `HeteroData`. Node ids are dense per type
//! (`0..num_nodes`), so edge stores are plain COO index pairs.
//!
//! # Example
//!
//! ```rust
//! use topica_core::hetero::{EdgeStore, EdgeType, HeteroGraph, NodeStore, NodeType};
//!
//! let mut hg = HeteroGraph::new();
//! hg.add_node_type(NodeType::new("author"), NodeStore::new(2));
//! hg.add_node_type(NodeType::new("paper"), NodeStore::new(3));
//!
//! let writes = EdgeType::new("author", "writes", "paper");
//! hg.insert_edges(writes.clone(), EdgeStore::from_pairs([(0, 0), (0, 1), (1, 2)]));
//!
//! assert_eq!(hg.num_node_types(), 2);
//! assert_eq!(hg.num_edges(&writes), 3);
//! assert!(hg.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A node type identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeType(pub String);

impl NodeType {
    /// Create a new node type.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Into<String>> From<S> for NodeType {
    fn from(s: S) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An edge type identifier, represented as (src_type, relation, dst_type).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeType {
    /// Source node type.
    pub src_type: NodeType,
    /// Relation name.
    pub relation: String,
    /// Destination node type.
    pub dst_type: NodeType,
}

/// Prefix given to synthesized reverse relations.
pub const REVERSE_PREFIX: &str = "rev_";

impl EdgeType {
    /// Create a new edge type.
    pub fn new(
        src_type: impl Into<NodeType>,
        relation: impl Into<String>,
        dst_type: impl Into<NodeType>,
    ) -> Self {
        Self {
            src_type: src_type.into(),
            relation: relation.into(),
            dst_type: dst_type.into(),
        }
    }

    /// Get the reverse edge type (`dst -[rev_rel]-> src`).
    pub fn reverse(&self) -> Self {
        Self {
            src_type: self.dst_type.clone(),
            relation: format!("{REVERSE_PREFIX}{}", self.relation),
            dst_type: self.src_type.clone(),
        }
    }

    /// Whether this relation was synthesized by [`EdgeType::reverse`].
    pub fn is_reverse(&self) -> bool {
        self.relation.starts_with(REVERSE_PREFIX)
    }

    /// Whether source and destination node types differ.
    pub fn is_bipartite(&self) -> bool {
        self.src_type != self.dst_type
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.src_type, self.relation, self.dst_type)
    }
}

/// Node index within a specific node type.
pub type TypedNodeIndex = usize;

/// Edge storage for a specific edge type (COO format).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeStore {
    /// Source node indices (local to src_type).
    pub src: Vec<TypedNodeIndex>,
    /// Target node indices (local to dst_type).
    pub dst: Vec<TypedNodeIndex>,
}

impl EdgeStore {
    /// Create an empty edge store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from edge index vectors.
    pub fn from_edges(src: Vec<TypedNodeIndex>, dst: Vec<TypedNodeIndex>) -> Self {
        debug_assert_eq!(src.len(), dst.len());
        Self { src, dst }
    }

    /// Create from `(src, dst)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TypedNodeIndex, TypedNodeIndex)>) -> Self {
        let (src, dst) = pairs.into_iter().unzip();
        Self { src, dst }
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    /// Whether the store holds no edges.
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Add an edge.
    pub fn add_edge(&mut self, src: TypedNodeIndex, dst: TypedNodeIndex) {
        self.src.push(src);
        self.dst.push(dst);
    }

    /// Iterate over (src, dst) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (TypedNodeIndex, TypedNodeIndex)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }

    /// Edges with source and destination swapped.
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }

    /// Sort edges by `(src, dst)` and drop duplicates.
    pub fn coalesce(&mut self) {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable();
        pairs.dedup();
        *self = Self::from_pairs(pairs);
    }

    /// Consuming variant of [`EdgeStore::coalesce`].
    pub fn coalesced(mut self) -> Self {
        self.coalesce();
        self
    }

    /// Union with the reversed edges, coalesced (`to_undirected`).
    pub fn symmetrized(&self) -> Self {
        let mut out = self.clone();
        out.src.extend_from_slice(&self.dst);
        out.dst.extend_from_slice(&self.src);
        out.coalesced()
    }
}

/// Raw node feature matrix, one row per node id.
///
/// Datasets may ship integer-coded features; the encoder only consumes
/// floats, see [`NodeFeatures::to_float`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeFeatures {
    /// Integer features, row-major.
    Int { cols: usize, data: Vec<i64> },
    /// Floating point features, row-major.
    Float { cols: usize, data: Vec<f32> },
}

impl NodeFeatures {
    /// Number of feature columns.
    pub fn num_cols(&self) -> usize {
        match self {
            Self::Int { cols, .. } | Self::Float { cols, .. } => *cols,
        }
    }

    /// Number of rows (nodes).
    pub fn num_rows(&self) -> usize {
        let (cols, len) = match self {
            Self::Int { cols, data } => (*cols, data.len()),
            Self::Float { cols, data } => (*cols, data.len()),
        };
        if cols == 0 {
            0
        } else {
            len / cols
        }
    }

    /// Whether values are already floating point.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float { .. })
    }

    /// Convert to the floating point representation.
    pub fn to_float(&self) -> Self {
        match self {
            Self::Int { cols, data } => Self::Float {
                cols: *cols,
                data: data.iter().map(|&v| v as f32).collect(),
            },
            Self::Float { .. } => self.clone(),
        }
    }

    /// Row-major values as `f32`, casting integers.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::Int { data, .. } => data.iter().map(|&v| v as f32).collect(),
            Self::Float { data, .. } => data.clone(),
        }
    }

    /// Gather the given rows into a new matrix.
    pub fn select_rows(&self, rows: &[TypedNodeIndex]) -> Self {
        match self {
            Self::Int { cols, data } => Self::Int {
                cols: *cols,
                data: gather_rows(data, *cols, rows),
            },
            Self::Float { cols, data } => Self::Float {
                cols: *cols,
                data: gather_rows(data, *cols, rows),
            },
        }
    }
}

fn gather_rows<T: Copy>(data: &[T], cols: usize, rows: &[TypedNodeIndex]) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len() * cols);
    for &r in rows {
        out.extend_from_slice(&data[r * cols..(r + 1) * cols]);
    }
    out
}

/// Node store for a specific node type.
///
/// Besides the optional feature matrix, a node type may carry temporal
/// attributes: a fold tag and a year per node. `global_ids` maps each local
/// id back to the id the node had in the graph it was filtered from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStore {
    num_nodes: usize,
    /// Optional feature matrix.
    pub features: Option<NodeFeatures>,
    /// Optional fold membership (0-4) per node.
    pub fold: Option<Vec<u8>>,
    /// Optional year per node.
    pub year: Option<Vec<u16>>,
    /// Stable ids; `None` means the identity mapping.
    global_ids: Option<Vec<usize>>,
}

impl NodeStore {
    /// Create a node store with `num_nodes` featureless nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            ..Self::default()
        }
    }

    /// Attach a feature matrix.
    pub fn with_features(mut self, features: NodeFeatures) -> Self {
        self.features = Some(features);
        self
    }

    /// Attach fold tags.
    pub fn with_fold(mut self, fold: Vec<u8>) -> Self {
        self.fold = Some(fold);
        self
    }

    /// Attach years.
    pub fn with_year(mut self, year: Vec<u16>) -> Self {
        self.year = Some(year);
        self
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Stable id of a local node.
    pub fn global_id(&self, idx: TypedNodeIndex) -> usize {
        self.global_ids.as_ref().map_or(idx, |ids| ids[idx])
    }

    /// Stable ids of the given local nodes.
    pub fn global_ids_of(&self, indices: &[TypedNodeIndex]) -> Vec<usize> {
        indices.iter().map(|&i| self.global_id(i)).collect()
    }

    /// Keep only `keep` (local ids, ascending), carrying attributes and stable ids.
    pub fn select(&self, keep: &[TypedNodeIndex]) -> Self {
        Self {
            num_nodes: keep.len(),
            features: self.features.as_ref().map(|f| f.select_rows(keep)),
            fold: self
                .fold
                .as_ref()
                .map(|v| keep.iter().map(|&i| v[i]).collect()),
            year: self
                .year
                .as_ref()
                .map(|v| keep.iter().map(|&i| v[i]).collect()),
            global_ids: Some(self.global_ids_of(keep)),
        }
    }

    fn validate(&self, node_type: &NodeType) -> Result<()> {
        let check = |attribute: &'static str, got: usize| {
            if got == self.num_nodes {
                Ok(())
            } else {
                Err(Error::LengthMismatch {
                    node_type: node_type.to_string(),
                    attribute,
                    expected: self.num_nodes,
                    got,
                })
            }
        };
        if let Some(f) = &self.features {
            check("features", f.num_rows())?;
        }
        if let Some(v) = &self.fold {
            check("fold", v.len())?;
        }
        if let Some(v) = &self.year {
            check("year", v.len())?;
        }
        if let Some(v) = &self.global_ids {
            check("global_ids", v.len())?;
        }
        Ok(())
    }
}

/// A heterogeneous graph with typed nodes and edges.
///
/// Types are kept in ordered maps so that iteration (and therefore seeded
/// sampling) is reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeteroGraph {
    node_stores: BTreeMap<NodeType, NodeStore>,
    edge_stores: BTreeMap<EdgeType, EdgeStore>,
}

impl HeteroGraph {
    /// Create an empty heterogeneous graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of node types.
    pub fn num_node_types(&self) -> usize {
        self.node_stores.len()
    }

    /// Number of edge types.
    pub fn num_edge_types(&self) -> usize {
        self.edge_stores.len()
    }

    /// Get all node types.
    pub fn node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.node_stores.keys()
    }

    /// Get all edge types.
    pub fn edge_types(&self) -> impl Iterator<Item = &EdgeType> {
        self.edge_stores.keys()
    }

    /// Iterate over `(edge type, store)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&EdgeType, &EdgeStore)> {
        self.edge_stores.iter()
    }

    /// Iterate over `(node type, store)` pairs.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeType, &NodeStore)> {
        self.node_stores.iter()
    }

    /// Add (or replace) a node type.
    pub fn add_node_type(&mut self, node_type: NodeType, store: NodeStore) {
        self.node_stores.insert(node_type, store);
    }

    /// Insert (or replace) the edges of a type.
    pub fn insert_edges(&mut self, edge_type: EdgeType, store: EdgeStore) {
        self.edge_stores.insert(edge_type, store);
    }

    /// Remove an edge type, returning its edges.
    pub fn remove_edge_type(&mut self, edge_type: &EdgeType) -> Option<EdgeStore> {
        self.edge_stores.remove(edge_type)
    }

    /// Whether an edge type is present.
    pub fn contains_edge_type(&self, edge_type: &EdgeType) -> bool {
        self.edge_stores.contains_key(edge_type)
    }

    /// Get node store for a type.
    pub fn node_store(&self, node_type: &NodeType) -> Option<&NodeStore> {
        self.node_stores.get(node_type)
    }

    /// Get edge store for a type.
    pub fn edge_store(&self, edge_type: &EdgeType) -> Option<&EdgeStore> {
        self.edge_stores.get(edge_type)
    }

    /// Get mutable node store for a type.
    pub fn node_store_mut(&mut self, node_type: &NodeType) -> Option<&mut NodeStore> {
        self.node_stores.get_mut(node_type)
    }

    /// Node store for a type, or an error naming the missing type.
    pub fn require_node_store(&self, node_type: &NodeType) -> Result<&NodeStore> {
        self.node_store(node_type)
            .ok_or_else(|| Error::NodeTypeNotFound(node_type.to_string()))
    }

    /// Edge store for a type, or an error naming the missing type.
    pub fn require_edge_store(&self, edge_type: &EdgeType) -> Result<&EdgeStore> {
        self.edge_store(edge_type)
            .ok_or_else(|| Error::EdgeTypeNotFound(edge_type.to_string()))
    }

    /// Number of nodes of a given type.
    pub fn num_nodes(&self, node_type: &NodeType) -> usize {
        self.node_stores
            .get(node_type)
            .map(|s| s.num_nodes())
            .unwrap_or(0)
    }

    /// Number of edges of a given type.
    pub fn num_edges(&self, edge_type: &EdgeType) -> usize {
        self.edge_stores
            .get(edge_type)
            .map(|s| s.num_edges())
            .unwrap_or(0)
    }

    /// Total number of nodes across all types.
    pub fn total_nodes(&self) -> usize {
        self.node_stores.values().map(|s| s.num_nodes()).sum()
    }

    /// Total number of edges across all types.
    pub fn total_edges(&self) -> usize {
        self.edge_stores.values().map(|s| s.num_edges()).sum()
    }

    /// Replace a node type's features with their floating point form.
    pub fn cast_features_to_float(&mut self, node_type: &NodeType) -> Result<()> {
        let store = self
            .node_stores
            .get_mut(node_type)
            .ok_or_else(|| Error::NodeTypeNotFound(node_type.to_string()))?;
        if let Some(features) = &store.features {
            if !features.is_float() {
                store.features = Some(features.to_float());
            }
        }
        Ok(())
    }

    /// Check that every edge endpoint and per-node attribute is in range.
    pub fn validate(&self) -> Result<()> {
        for (node_type, store) in &self.node_stores {
            store.validate(node_type)?;
        }
        for (edge_type, store) in &self.edge_stores {
            let bounds = [
                (&edge_type.src_type, &store.src),
                (&edge_type.dst_type, &store.dst),
            ];
            for (node_type, indices) in bounds {
                let num_nodes = self.require_node_store(node_type)?.num_nodes();
                if let Some(&index) = indices.iter().find(|&&i| i >= num_nodes) {
                    return Err(Error::DanglingEdge {
                        edge_type: edge_type.to_string(),
                        node_type: node_type.to_string(),
                        index,
                        num_nodes,
                    });
                }
            }
        }
        Ok(())
    }

    /// Read-only projection that hides `excluded` from message passing.
    pub fn structural_view<'a>(&'a self, excluded: &'a EdgeType) -> StructuralView<'a> {
        StructuralView {
            graph: self,
            excluded,
        }
    }

    /// Load from binary file (bincode).
    pub fn from_binary_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Save to binary file (bincode).
    pub fn to_binary_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }
}

/// A graph seen without one edge type.
///
/// Used wherever the prediction target must not act as a message-passing
/// channel: model metadata and per-batch structural edges.
#[derive(Debug, Clone, Copy)]
pub struct StructuralView<'a> {
    graph: &'a HeteroGraph,
    excluded: &'a EdgeType,
}

impl<'a> StructuralView<'a> {
    /// The hidden edge type.
    pub fn excluded(&self) -> &'a EdgeType {
        self.excluded
    }

    /// Node types of the underlying graph.
    pub fn node_types(&self) -> impl Iterator<Item = &'a NodeType> {
        self.graph.node_types()
    }

    /// Visible edge types.
    pub fn edge_types(&self) -> impl Iterator<Item = &'a EdgeType> + '_ {
        self.graph.edge_types().filter(move |et| *et != self.excluded)
    }

    /// Visible edges; `None` for the hidden type.
    pub fn edge_store(&self, edge_type: &EdgeType) -> Option<&'a EdgeStore> {
        if edge_type == self.excluded {
            None
        } else {
            self.graph.edge_store(edge_type)
        }
    }

    /// Node store passthrough.
    pub fn node_store(&self, node_type: &NodeType) -> Option<&'a NodeStore> {
        self.graph.node_store(node_type)
    }
}

/// Statistics for a heterogeneous graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeteroGraphStats {
    /// Number of node types.
    pub num_node_types: usize,
    /// Number of edge types.
    pub num_edge_types: usize,
    /// Total nodes.
    pub total_nodes: usize,
    /// Total edges.
    pub total_edges: usize,
    /// Nodes per type.
    pub nodes_by_type: HashMap<String, usize>,
    /// Edges per type.
    pub edges_by_type: HashMap<String, usize>,
}

impl HeteroGraph {
    /// Get statistics about the graph.
    pub fn stats(&self) -> HeteroGraphStats {
        HeteroGraphStats {
            num_node_types: self.num_node_types(),
            num_edge_types: self.num_edge_types(),
            total_nodes: self.total_nodes(),
            total_edges: self.total_edges(),
            nodes_by_type: self
                .node_stores
                .iter()
                .map(|(t, s)| (t.0.clone(), s.num_nodes()))
                .collect(),
            edges_by_type: self
                .edge_stores
                .iter()
                .map(|(t, s)| (t.to_string(), s.num_edges()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> HeteroGraph {
        let mut hg = HeteroGraph::new();
        hg.add_node_type(NodeType::new("author"), NodeStore::new(2));
        hg.add_node_type(
            NodeType::new("paper"),
            NodeStore::new(3).with_features(NodeFeatures::Int {
                cols: 2,
                data: vec![1, 2, 3, 4, 5, 6],
            }),
        );
        hg.insert_edges(
            EdgeType::new("author", "writes", "paper"),
            EdgeStore::from_pairs([(0, 0), (1, 2)]),
        );
        hg
    }

    #[test]
    fn test_reverse_edge_type() {
        let writes = EdgeType::new("author", "writes", "paper");
        let rev = writes.reverse();
        assert_eq!(rev, EdgeType::new("paper", "rev_writes", "author"));
        assert!(rev.is_reverse());
        assert!(!writes.is_reverse());
        assert!(writes.is_bipartite());
        assert!(!EdgeType::new("paper", "cites", "paper").is_bipartite());
    }

    #[test]
    fn test_coalesce_sorts_and_dedups() {
        let store = EdgeStore::from_pairs([(2, 1), (0, 3), (2, 1), (0, 1)]).coalesced();
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![(0, 1), (0, 3), (2, 1)]);
    }

    #[test]
    fn test_symmetrized() {
        let store = EdgeStore::from_pairs([(0, 1), (1, 0), (1, 2)]).symmetrized();
        assert_eq!(
            store.iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 0), (1, 2), (2, 1)]
        );
    }

    #[test]
    fn test_cast_features_to_float() {
        let mut hg = tiny();
        let paper = NodeType::new("paper");
        hg.cast_features_to_float(&paper).unwrap();
        let features = hg.node_store(&paper).unwrap().features.as_ref().unwrap();
        assert!(features.is_float());
        assert_eq!(features.to_f32_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_validate_detects_dangling_edge() {
        let mut hg = tiny();
        assert!(hg.validate().is_ok());
        hg.insert_edges(
            EdgeType::new("author", "writes", "paper"),
            EdgeStore::from_pairs([(0, 7)]),
        );
        assert!(matches!(
            hg.validate(),
            Err(Error::DanglingEdge { index: 7, .. })
        ));
    }

    #[test]
    fn test_validate_detects_short_attribute() {
        let mut hg = tiny();
        hg.node_store_mut(&NodeType::new("author")).unwrap().fold = Some(vec![0]);
        assert!(matches!(
            hg.validate(),
            Err(Error::LengthMismatch { attribute: "fold", .. })
        ));
    }

    #[test]
    fn test_select_keeps_global_ids() {
        let store = NodeStore::new(4).with_year(vec![2000, 2001, 2002, 2003]);
        let sub = store.select(&[1, 3]);
        assert_eq!(sub.num_nodes(), 2);
        assert_eq!(sub.year, Some(vec![2001, 2003]));
        assert_eq!(sub.global_ids_of(&[0, 1]), vec![1, 3]);

        let subsub = sub.select(&[1]);
        assert_eq!(subsub.global_id(0), 3);
    }

    #[test]
    fn test_structural_view_hides_excluded() {
        let mut hg = tiny();
        let target = EdgeType::new("author", "next_topic", "topic");
        hg.add_node_type(NodeType::new("topic"), NodeStore::new(1));
        hg.insert_edges(target.clone(), EdgeStore::from_pairs([(0, 0)]));

        let view = hg.structural_view(&target);
        assert!(view.edge_store(&target).is_none());
        assert!(view.edge_types().all(|et| et != &target));
        assert_eq!(view.edge_types().count(), 1);
    }

    #[test]
    fn test_binary_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        let hg = tiny();
        hg.to_binary_file(&path).unwrap();
        assert_eq!(HeteroGraph::from_binary_file(&path).unwrap(), hg);
    }
}
