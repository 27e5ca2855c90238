//! Moving sampled batches onto a device.

use crate::error::Result;
use candle_core::{Device, Tensor};
use std::collections::BTreeMap;
use topica_core::hetero::{EdgeStore, EdgeType, NodeType};
use topica_core::sampling::HeteroBatch;

/// COO edge index as two `u32` tensors of shape `[E]`.
#[derive(Debug, Clone)]
pub struct EdgeIndex {
    pub src: Tensor,
    pub dst: Tensor,
}

impl EdgeIndex {
    pub fn from_store(store: &EdgeStore, device: &Device) -> Result<Self> {
        Ok(Self {
            src: index_tensor(&store.src, device)?,
            dst: index_tensor(&store.dst, device)?,
        })
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.src.dims1().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `usize` ids as a `u32` tensor.
pub fn index_tensor(ids: &[usize], device: &Device) -> Result<Tensor> {
    let ids: Vec<u32> = ids.iter().map(|&i| i as u32).collect();
    let n = ids.len();
    Ok(Tensor::from_vec(ids, n, device)?)
}

/// A batch as device tensors.
#[derive(Debug, Clone)]
pub struct BatchTensors {
    /// Nodes per type present in the batch.
    pub num_nodes: BTreeMap<NodeType, usize>,
    /// `[n, cols]` float features for types that carry them.
    pub x: BTreeMap<NodeType, Tensor>,
    /// Stable ids per type, `[n]` u32.
    pub n_id: BTreeMap<NodeType, Tensor>,
    /// Message-passing edges per type.
    pub edge_index: BTreeMap<EdgeType, EdgeIndex>,
    /// The supervised relation.
    pub target: EdgeType,
    /// Candidate pairs.
    pub edge_label_index: EdgeIndex,
    /// `[num_labels]` f32 labels.
    pub edge_label: Tensor,
}

impl BatchTensors {
    pub fn from_batch(batch: &HeteroBatch, device: &Device) -> Result<Self> {
        let mut num_nodes = BTreeMap::new();
        let mut x = BTreeMap::new();
        let mut n_id = BTreeMap::new();
        for (node_type, nodes) in &batch.nodes {
            num_nodes.insert(node_type.clone(), nodes.len());
            n_id.insert(node_type.clone(), index_tensor(&nodes.n_id, device)?);
            if let Some(features) = &nodes.features {
                let t = Tensor::from_vec(
                    features.to_f32_vec(),
                    (nodes.len(), features.num_cols()),
                    device,
                )?;
                x.insert(node_type.clone(), t);
            }
        }

        let edge_index = batch
            .edges
            .iter()
            .map(|(et, store)| Ok((et.clone(), EdgeIndex::from_store(store, device)?)))
            .collect::<Result<_>>()?;

        let edge_label = Tensor::from_slice(&batch.edge_label, batch.edge_label.len(), device)?;

        Ok(Self {
            num_nodes,
            x,
            n_id,
            edge_index,
            target: batch.target.clone(),
            edge_label_index: EdgeIndex::from_store(&batch.edge_label_index, device)?,
            edge_label,
        })
    }

    /// Number of labeled pairs.
    pub fn num_labels(&self) -> usize {
        self.edge_label_index.len()
    }
}
