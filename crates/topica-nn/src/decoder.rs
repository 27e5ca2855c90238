//! Pair scoring head.

use crate::error::Result;
use crate::input::EdgeIndex;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Two-layer MLP over concatenated endpoint embeddings.
///
/// Produces one unnormalized logit per candidate pair.
pub struct EdgeDecoder {
    lin1: Linear,
    lin2: Linear,
}

impl EdgeDecoder {
    pub fn new(hidden: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            lin1: linear(2 * hidden, hidden, vb.pp("lin1"))?,
            lin2: linear(hidden, 1, vb.pp("lin2"))?,
        })
    }

    /// Score pairs `(src[i], dst[i])` of `edge_label_index`.
    ///
    /// # Returns
    /// `[num_pairs]` logits.
    pub fn forward(&self, z_src: &Tensor, z_dst: &Tensor, edge_label_index: &EdgeIndex) -> Result<Tensor> {
        let src = z_src.index_select(&edge_label_index.src, 0)?;
        let dst = z_dst.index_select(&edge_label_index.dst, 0)?;
        let z = Tensor::cat(&[&src, &dst], 1)?;
        let z = self.lin1.forward(&z)?.relu()?;
        Ok(self.lin2.forward(&z)?.flatten_all()?)
    }
}
