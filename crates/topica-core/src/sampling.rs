//! Mini-batch neighbor sampling around labeled links.
//!
//! Provides GraphSAGE-style fanout sampling for link prediction on
//! heterogeneous graphs, in the spirit of PyG's `LinkNeighborLoader`.
//!
//! # Key Types
//!
//! - [`LinkNeighborLoader`] - splits labeled pairs into batches and samples
//!   a computation subgraph around each batch
//! - [`HeteroBatch`] - one sampled subgraph with batch-local ids
//!
//! # Sampling
//!
//! The endpoints of a batch's labeled pairs are the seed nodes. At hop `k`,
//! every node first reached at hop `k - 1` draws up to `fanout[k]` incoming
//! neighbors through each edge type of the graph. Sampled edges point from
//! the neighbor to the node that drew it (message passing direction).
//!
//! The target relation takes part in node discovery but never appears among
//! a batch's structural edges.

use crate::error::{Error, Result};
use crate::hetero::{EdgeStore, EdgeType, NodeFeatures, NodeType, TypedNodeIndex};
use crate::split::LinkSplitView;
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use std::collections::{BTreeMap, HashMap};

/// Incoming adjacency of one edge type (CSC layout).
#[derive(Debug, Clone)]
struct Incoming {
    indptr: Vec<usize>,
    sources: Vec<TypedNodeIndex>,
}

impl Incoming {
    fn build(store: &EdgeStore, num_dst: usize) -> Self {
        let mut indptr = vec![0; num_dst + 1];
        for &d in &store.dst {
            indptr[d + 1] += 1;
        }
        for i in 0..num_dst {
            indptr[i + 1] += indptr[i];
        }
        let mut fill = indptr.clone();
        let mut sources = vec![0; store.num_edges()];
        for (s, d) in store.iter() {
            sources[fill[d]] = s;
            fill[d] += 1;
        }
        Self { indptr, sources }
    }

    fn of(&self, dst: TypedNodeIndex) -> &[TypedNodeIndex] {
        &self.sources[self.indptr[dst]..self.indptr[dst + 1]]
    }
}

/// Nodes reached so far while sampling one batch.
#[derive(Default)]
struct NodeSet {
    nodes: BTreeMap<NodeType, Vec<TypedNodeIndex>>,
    index: BTreeMap<NodeType, HashMap<TypedNodeIndex, usize>>,
    /// Nodes added since the last hop started.
    frontier: BTreeMap<NodeType, Vec<TypedNodeIndex>>,
}

impl NodeSet {
    /// Get or create the batch-local index of a node.
    fn insert(&mut self, node_type: &NodeType, idx: TypedNodeIndex) -> usize {
        let map = self.index.entry(node_type.clone()).or_default();
        if let Some(&local) = map.get(&idx) {
            return local;
        }
        let list = self.nodes.entry(node_type.clone()).or_default();
        let local = list.len();
        map.insert(idx, local);
        list.push(idx);
        self.frontier
            .entry(node_type.clone())
            .or_default()
            .push(idx);
        local
    }

    fn local(&self, node_type: &NodeType, idx: TypedNodeIndex) -> usize {
        self.index[node_type][&idx]
    }
}

/// Nodes of one type present in a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchNodes {
    /// Node ids local to the sampled graph, in batch order.
    pub node_index: Vec<TypedNodeIndex>,
    /// Stable ids, parallel to `node_index`.
    pub n_id: Vec<usize>,
    /// Gathered feature rows, for types that have features.
    pub features: Option<NodeFeatures>,
}

impl BatchNodes {
    pub fn len(&self) -> usize {
        self.node_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_index.is_empty()
    }
}

/// A sampled subgraph around a batch of labeled pairs.
#[derive(Debug, Clone)]
pub struct HeteroBatch {
    /// Node types with at least one node in the batch.
    pub nodes: BTreeMap<NodeType, BatchNodes>,
    /// Message-passing edges in batch-local ids, non-empty types only.
    pub edges: BTreeMap<EdgeType, EdgeStore>,
    /// The supervised relation.
    pub target: EdgeType,
    /// Labeled pairs in batch-local ids.
    pub edge_label_index: EdgeStore,
    /// Labels parallel to `edge_label_index`.
    pub edge_label: Vec<f32>,
}

impl HeteroBatch {
    /// Number of labeled pairs.
    pub fn num_labels(&self) -> usize {
        self.edge_label.len()
    }

    /// Number of nodes of a type in the batch.
    pub fn num_nodes(&self, node_type: &NodeType) -> usize {
        self.nodes.get(node_type).map_or(0, BatchNodes::len)
    }
}

/// Batches labeled pairs and samples their neighborhoods.
///
/// # Example
///
/// ```rust
/// use topica_core::hetero::{EdgeStore, HeteroGraph, NodeStore};
/// use topica_core::sampling::LinkNeighborLoader;
/// use topica_core::split::RandomLinkSplit;
/// use topica_core::schema;
///
/// let mut hg = HeteroGraph::new();
/// hg.add_node_type(schema::author(), NodeStore::new(4));
/// hg.add_node_type(schema::topic(), NodeStore::new(4));
/// hg.insert_edges(schema::next_topic(), EdgeStore::from_pairs([(0, 1), (2, 3)]));
///
/// let (train, _) = RandomLinkSplit::new(schema::next_topic()).split(&hg).unwrap();
/// let mut loader = LinkNeighborLoader::new(train, vec![20, 10], 3, true, 42).unwrap();
///
/// let batches: Vec<_> = loader.batches().collect();
/// assert_eq!(batches.len(), 2);
/// assert!(batches.iter().all(|b| !b.edges.contains_key(&schema::next_topic())));
/// ```
pub struct LinkNeighborLoader {
    view: LinkSplitView,
    incoming: BTreeMap<EdgeType, Incoming>,
    /// fanout[0] = neighbors of seeds, fanout[1] = 2-hop neighbors, etc.
    fanout: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    epoch: u64,
}

impl LinkNeighborLoader {
    /// Create a loader over the labeled pairs of `view`.
    pub fn new(
        view: LinkSplitView,
        fanout: Vec<usize>,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        view.graph.validate()?;
        let incoming = view
            .graph
            .edges()
            .map(|(et, store)| {
                let num_dst = view.graph.num_nodes(&et.dst_type);
                (et.clone(), Incoming::build(store, num_dst))
            })
            .collect();
        Ok(Self {
            view,
            incoming,
            fanout,
            batch_size,
            shuffle,
            seed,
            epoch: 0,
        })
    }

    /// The split view batches are drawn from.
    pub fn view(&self) -> &LinkSplitView {
        &self.view
    }

    /// Number of labeled pairs.
    pub fn num_labels(&self) -> usize {
        self.view.num_labels()
    }

    /// Number of batches per pass.
    pub fn num_batches(&self) -> usize {
        self.num_labels().div_ceil(self.batch_size)
    }

    /// A fresh pass over all labeled pairs.
    ///
    /// Each call starts over; with `shuffle` the pair order differs between
    /// calls but is reproducible from the loader seed.
    pub fn batches(&mut self) -> Batches<'_> {
        let mut rng = XorShiftRng::seed_from_u64(self.seed.wrapping_add(self.epoch));
        self.epoch += 1;
        let mut order: Vec<usize> = (0..self.num_labels()).collect();
        if self.shuffle {
            order.shuffle(&mut rng);
        }
        Batches {
            loader: self,
            order,
            cursor: 0,
            rng,
        }
    }

    fn sample(&self, pairs: &[usize], rng: &mut XorShiftRng) -> HeteroBatch {
        let graph = &self.view.graph;
        let target = &self.view.target;

        let mut set = NodeSet::default();

        let mut edge_label_index = EdgeStore::new();
        let mut edge_label = Vec::with_capacity(pairs.len());
        for &i in pairs {
            let s = self.view.edge_label_index.src[i];
            let d = self.view.edge_label_index.dst[i];
            let s_local = set.insert(&target.src_type, s);
            let d_local = set.insert(&target.dst_type, d);
            edge_label_index.add_edge(s_local, d_local);
            edge_label.push(self.view.edge_label[i]);
        }

        let mut sampled: BTreeMap<EdgeType, EdgeStore> = BTreeMap::new();
        for &num_neighbors in &self.fanout {
            let current = std::mem::take(&mut set.frontier);
            for (edge_type, adj) in &self.incoming {
                let Some(dsts) = current.get(&edge_type.dst_type) else {
                    continue;
                };
                for &v in dsts {
                    let neighbors = adj.of(v);
                    let chosen: Vec<TypedNodeIndex> = if neighbors.len() <= num_neighbors {
                        neighbors.to_vec()
                    } else {
                        neighbors
                            .choose_multiple(rng, num_neighbors)
                            .copied()
                            .collect()
                    };
                    let v_local = set.local(&edge_type.dst_type, v);
                    for u in chosen {
                        let u_local = set.insert(&edge_type.src_type, u);
                        sampled
                            .entry(edge_type.clone())
                            .or_default()
                            .add_edge(u_local, v_local);
                    }
                }
            }
        }

        let structure = graph.structural_view(target);
        let edges = structure
            .edge_types()
            .filter_map(|et| {
                let store = sampled.remove(et)?;
                (!store.is_empty()).then(|| (et.clone(), store))
            })
            .collect();

        let nodes = set
            .nodes
            .into_iter()
            .map(|(node_type, node_index)| {
                let store = structure.node_store(&node_type);
                let batch_nodes = BatchNodes {
                    n_id: store.map_or_else(
                        || node_index.clone(),
                        |s| s.global_ids_of(&node_index),
                    ),
                    features: store
                        .and_then(|s| s.features.as_ref())
                        .map(|f| f.select_rows(&node_index)),
                    node_index,
                };
                (node_type, batch_nodes)
            })
            .collect();

        HeteroBatch {
            nodes,
            edges,
            target: target.clone(),
            edge_label_index,
            edge_label,
        }
    }
}

/// One pass over a loader's labeled pairs.
pub struct Batches<'a> {
    loader: &'a LinkNeighborLoader,
    order: Vec<usize>,
    cursor: usize,
    rng: XorShiftRng,
}

impl Iterator for Batches<'_> {
    type Item = HeteroBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let batch = self
            .loader
            .sample(&self.order[self.cursor..end], &mut self.rng);
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hetero::{HeteroGraph, NodeStore};
    use crate::schema;
    use crate::split::RandomLinkSplit;
    use crate::transform::undirect;

    // two authors, four papers, three topics, with a next_topic target
    fn view() -> LinkSplitView {
        let mut hg = HeteroGraph::new();
        hg.add_node_type(schema::author(), NodeStore::new(2));
        hg.add_node_type(
            schema::paper(),
            NodeStore::new(4).with_features(NodeFeatures::Float {
                cols: 2,
                data: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            }),
        );
        hg.add_node_type(schema::topic(), NodeStore::new(3));
        hg.insert_edges(
            schema::writes(),
            EdgeStore::from_pairs([(0, 0), (0, 1), (1, 2), (1, 3)]),
        );
        hg.insert_edges(schema::cites(), EdgeStore::from_pairs([(0, 2), (3, 1)]));
        hg.insert_edges(
            schema::about(),
            EdgeStore::from_pairs([(0, 0), (1, 1), (2, 2), (3, 2)]),
        );
        hg.insert_edges(schema::next_topic(), EdgeStore::from_pairs([(0, 2), (1, 0)]));
        let hg = undirect(&hg, &[schema::next_topic()]);
        RandomLinkSplit::new(schema::next_topic())
            .split(&hg)
            .unwrap()
            .0
    }

    #[test]
    fn test_batches_cover_all_labels() {
        let mut loader = LinkNeighborLoader::new(view(), vec![20, 10], 3, true, 1).unwrap();
        assert_eq!(loader.num_batches(), 2);
        let batches: Vec<_> = loader.batches().collect();
        assert_eq!(batches.len(), 2);
        let total: usize = batches.iter().map(HeteroBatch::num_labels).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_target_never_structural() {
        let mut loader = LinkNeighborLoader::new(view(), vec![20, 10], 2, false, 1).unwrap();
        for batch in loader.batches() {
            assert!(!batch.edges.contains_key(&schema::next_topic()));
            assert!(batch.edges.keys().all(|et| et.relation != schema::NEXT_TOPIC));
        }
    }

    #[test]
    fn test_label_index_is_batch_local() {
        let mut loader = LinkNeighborLoader::new(view(), vec![20, 10], 4, false, 1).unwrap();
        let batch = loader.batches().next().unwrap();
        let view = loader.view();
        let authors = &batch.nodes[&schema::author()];
        let topics = &batch.nodes[&schema::topic()];
        for ((a, t), label) in batch.edge_label_index.iter().zip(&batch.edge_label) {
            let pair = (authors.node_index[a], topics.node_index[t]);
            let i = view.edge_label_index.iter().position(|p| p == pair).unwrap();
            assert_eq!(*label, view.edge_label[i]);
        }
    }

    #[test]
    fn test_edges_and_features_in_range() {
        let mut loader = LinkNeighborLoader::new(view(), vec![20, 10], 1, true, 3).unwrap();
        for batch in loader.batches() {
            for (et, store) in &batch.edges {
                let n_src = batch.num_nodes(&et.src_type);
                let n_dst = batch.num_nodes(&et.dst_type);
                assert!(store.iter().all(|(s, d)| s < n_src && d < n_dst));
            }
            if let Some(papers) = batch.nodes.get(&schema::paper()) {
                let features = papers.features.as_ref().unwrap();
                assert_eq!(features.num_rows(), papers.len());
                assert_eq!(features.num_cols(), 2);
            }
        }
    }

    #[test]
    fn test_fanout_limits_neighbors() {
        let mut hg = HeteroGraph::new();
        hg.add_node_type(schema::author(), NodeStore::new(10));
        hg.add_node_type(schema::topic(), NodeStore::new(1));
        hg.insert_edges(
            EdgeType::new(schema::AUTHOR, "likes", schema::TOPIC),
            EdgeStore::from_pairs((0..10).map(|a| (a, 0))),
        );
        hg.insert_edges(schema::next_topic(), EdgeStore::from_pairs([(0, 0)]));
        let view = LinkSplitView {
            graph: hg,
            target: schema::next_topic(),
            edge_label_index: EdgeStore::from_pairs([(0, 0)]),
            edge_label: vec![1.0],
        };
        let mut loader = LinkNeighborLoader::new(view, vec![3], 1, false, 0).unwrap();
        let batch = loader.batches().next().unwrap();
        let likes = &batch.edges[&EdgeType::new(schema::AUTHOR, "likes", schema::TOPIC)];
        assert_eq!(likes.num_edges(), 3);
    }

    #[test]
    fn test_target_edges_discover_nodes_only() {
        // author 2 reaches topic 0 through next_topic alone
        let likes = EdgeType::new(schema::AUTHOR, "likes", schema::TOPIC);
        let mut hg = HeteroGraph::new();
        hg.add_node_type(schema::author(), NodeStore::new(3));
        hg.add_node_type(schema::topic(), NodeStore::new(2));
        hg.insert_edges(likes.clone(), EdgeStore::from_pairs([(0, 0)]));
        hg.insert_edges(schema::next_topic(), EdgeStore::from_pairs([(0, 0), (2, 0)]));
        let view = LinkSplitView {
            graph: hg,
            target: schema::next_topic(),
            edge_label_index: EdgeStore::from_pairs([(0, 0)]),
            edge_label: vec![1.0],
        };
        let mut loader = LinkNeighborLoader::new(view, vec![5], 1, false, 0).unwrap();
        let batch = loader.batches().next().unwrap();

        let authors = &batch.nodes[&schema::author()].node_index;
        assert!(authors.contains(&2));
        assert!(!authors.contains(&1));
        assert!(batch.edges.contains_key(&likes));
        assert!(!batch.edges.contains_key(&schema::next_topic()));
        assert_eq!(batch.edges.len(), 1);
    }

    #[test]
    fn test_restartable() {
        let mut loader = LinkNeighborLoader::new(view(), vec![20, 10], 2, false, 1).unwrap();
        let first: Vec<_> = loader.batches().map(|b| b.edge_label).collect();
        let second: Vec<_> = loader.batches().map(|b| b.edge_label).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(
            LinkNeighborLoader::new(view(), vec![1], 0, false, 0),
            Err(Error::InvalidConfig(_))
        ));
    }
}
