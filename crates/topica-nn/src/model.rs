//! Link prediction model: embeddings, encoder and decoder.

use crate::decoder::EdgeDecoder;
use crate::embedding::NodeEmbeddings;
use crate::encoder::{EncoderConfig, HgtEncoder, ModelMetadata};
use crate::error::{Error, Result};
use crate::input::BatchTensors;
use candle_core::Tensor;
use candle_nn::VarBuilder;
use std::collections::BTreeMap;
use topica_core::hetero::EdgeType;

/// Scores `target` pairs of a sampled batch.
pub struct LinkPredictor {
    embeddings: NodeEmbeddings,
    encoder: HgtEncoder,
    decoder: EdgeDecoder,
    target: EdgeType,
}

impl LinkPredictor {
    pub fn new(
        metadata: &ModelMetadata,
        target: EdgeType,
        config: &EncoderConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            embeddings: NodeEmbeddings::new(metadata, config.embedding_dim, vb.pp("embedding"))?,
            encoder: HgtEncoder::new(metadata, config, vb.pp("encoder"))?,
            decoder: EdgeDecoder::new(config.hidden, vb.pp("decoder"))?,
            target,
        })
    }

    /// The relation being scored.
    pub fn target(&self) -> &EdgeType {
        &self.target
    }

    /// One logit per labeled pair of `batch`.
    ///
    /// Embedded node types read their table rows by stable id here, right
    /// before the encoder runs; only the remaining types use `batch.x`.
    pub fn forward(&self, batch: &BatchTensors) -> Result<Tensor> {
        self.forward_t(batch, true)
    }

    /// Like [`forward`](Self::forward), but with `train == false` the encoder
    /// inputs are detached, so embedding gathers and feature rows are not
    /// recorded for backprop. Encoder weights are still variables, so the
    /// per-batch graph through the layers is kept until the logits drop.
    pub fn forward_t(&self, batch: &BatchTensors, train: bool) -> Result<Tensor> {
        let mut x = BTreeMap::new();
        for node_type in batch.num_nodes.keys() {
            let n_id = batch
                .n_id
                .get(node_type)
                .ok_or_else(|| Error::MissingInput(node_type.to_string()))?;
            let input = match self.embeddings.lookup(node_type, n_id)? {
                Some(rows) => rows,
                None => batch
                    .x
                    .get(node_type)
                    .cloned()
                    .ok_or_else(|| Error::MissingInput(node_type.to_string()))?,
            };
            let input = if train { input } else { input.detach() };
            x.insert(node_type.clone(), input);
        }

        let z = self.encoder.forward(&x, &batch.edge_index)?;
        let z_src = z
            .get(&self.target.src_type)
            .ok_or_else(|| Error::MissingNodeType(self.target.src_type.to_string()))?;
        let z_dst = z
            .get(&self.target.dst_type)
            .ok_or_else(|| Error::MissingNodeType(self.target.dst_type.to_string()))?;
        self.decoder.forward(z_src, z_dst, &batch.edge_label_index)
    }
}
