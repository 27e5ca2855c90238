//! Trainable node embeddings for embedded node types.
//!
//! Tables are indexed by stable node id, so the same author keeps the same
//! row whichever filtered subgraph or batch it shows up in.

use crate::encoder::{ModelMetadata, NodeInput};
use crate::error::Result;
use candle_core::Tensor;
use candle_nn::{embedding, Embedding, Module, VarBuilder};
use std::collections::BTreeMap;
use topica_core::hetero::NodeType;

pub struct NodeEmbeddings {
    tables: BTreeMap<NodeType, Embedding>,
}

impl NodeEmbeddings {
    /// One table per [`NodeInput::Embedding`] type of `metadata`.
    pub fn new(metadata: &ModelMetadata, dim: usize, vb: VarBuilder) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for (nt, input) in &metadata.node_types {
            if let NodeInput::Embedding { num_nodes } = input {
                tables.insert(nt.clone(), embedding(*num_nodes, dim, vb.pp(nt.as_str()))?);
            }
        }
        Ok(Self { tables })
    }

    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.tables.contains_key(node_type)
    }

    /// Rows for `n_id` (`[n]` u32 stable ids), or `None` if the type has no table.
    pub fn lookup(&self, node_type: &NodeType, n_id: &Tensor) -> Result<Option<Tensor>> {
        self.tables
            .get(node_type)
            .map(|table| table.forward(n_id).map_err(Into::into))
            .transpose()
    }
}
