//! Heterogeneous node encoder.

use crate::conv::HgtConv;
use crate::error::{Error, Result};
use crate::input::EdgeIndex;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use topica_core::hetero::{EdgeType, HeteroGraph, NodeType, StructuralView};

/// Where a node type's encoder input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeInput {
    /// Stored feature rows of the given width.
    Features(usize),
    /// A trainable table with one row per node.
    Embedding { num_nodes: usize },
}

/// Graph schema the model is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub node_types: Vec<(NodeType, NodeInput)>,
    /// Message-passing relations; never contains the target.
    pub edge_types: Vec<EdgeType>,
}

impl ModelMetadata {
    /// Schema of `view`: types in `embedded` and featureless types get an
    /// embedding table sized to the node count, the rest read their features.
    pub fn from_view(view: &StructuralView<'_>, embedded: &[NodeType]) -> Self {
        let node_types = view
            .node_types()
            .filter_map(|nt| {
                let store = view.node_store(nt)?;
                let input = match &store.features {
                    Some(f) if !embedded.contains(nt) => NodeInput::Features(f.num_cols()),
                    _ => NodeInput::Embedding {
                        num_nodes: store.num_nodes(),
                    },
                };
                Some((nt.clone(), input))
            })
            .collect();
        Self {
            node_types,
            edge_types: view.edge_types().cloned().collect(),
        }
    }

    /// Schema of `graph` with `target` hidden. Both endpoint types of
    /// `target` are embedded by node id even when they carry features.
    pub fn from_graph(graph: &HeteroGraph, target: &EdgeType) -> Self {
        let embedded = [target.src_type.clone(), target.dst_type.clone()];
        Self::from_view(&graph.structural_view(target), &embedded)
    }

    pub fn node_type_names(&self) -> Vec<NodeType> {
        self.node_types.iter().map(|(nt, _)| nt.clone()).collect()
    }
}

/// Encoder hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Hidden width of every layer.
    pub hidden: usize,
    /// Attention heads.
    pub heads: usize,
    /// Number of HGT layers.
    pub layers: usize,
    /// Width of embedding tables for embedded node types.
    pub embedding_dim: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            hidden: 32,
            heads: 2,
            layers: 1,
            embedding_dim: 32,
        }
    }
}

impl EncoderConfig {
    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_heads(mut self, heads: usize) -> Self {
        self.heads = heads;
        self
    }

    pub fn with_layers(mut self, layers: usize) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }
}

/// Per-type input projection followed by stacked [`HgtConv`] layers.
pub struct HgtEncoder {
    input: BTreeMap<NodeType, Linear>,
    convs: Vec<HgtConv>,
}

impl HgtEncoder {
    pub fn new(metadata: &ModelMetadata, config: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        let mut input = BTreeMap::new();
        for (nt, source) in &metadata.node_types {
            let in_dim = match source {
                NodeInput::Features(cols) => *cols,
                NodeInput::Embedding { .. } => config.embedding_dim,
            };
            input.insert(nt.clone(), linear(in_dim, config.hidden, vb.pp("lin").pp(nt.as_str()))?);
        }

        let node_types = metadata.node_type_names();
        let convs = (0..config.layers)
            .map(|i| {
                HgtConv::new(
                    &node_types,
                    &metadata.edge_types,
                    config.hidden,
                    config.hidden,
                    config.heads,
                    vb.pp("convs").pp(i),
                )
            })
            .collect::<Result<_>>()?;

        Ok(Self { input, convs })
    }

    /// Embed every node type in `x`.
    pub fn forward(
        &self,
        x: &BTreeMap<NodeType, Tensor>,
        edge_index: &BTreeMap<EdgeType, EdgeIndex>,
    ) -> Result<BTreeMap<NodeType, Tensor>> {
        let mut h = BTreeMap::new();
        for (nt, xs) in x {
            let lin = self
                .input
                .get(nt)
                .ok_or_else(|| Error::MissingInput(nt.to_string()))?;
            h.insert(nt.clone(), lin.forward(xs)?.relu()?);
        }
        for conv in &self.convs {
            h = conv.forward(&h, edge_index)?;
        }
        Ok(h)
    }
}
