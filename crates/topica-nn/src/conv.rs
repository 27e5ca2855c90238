//! Heterogeneous graph transformer convolution.
//!
//! Implements [`HgtConv`] (Hu et al., 2020): attention-based message passing
//! where every node type has its own key/query/value projections and every
//! relation has its own head-wise attention and message matrices.
//!
//! # Message Passing
//!
//! For an edge `s -[r]-> t` and head `h`:
//!
//! ```text
//! k_e = K_{type(s)} x_s  W^att_{r,h}
//! v_e = V_{type(s)} x_s  W^msg_{r,h}
//! a_e = softmax_t( (Q_{type(t)} x_t . k_e) * mu_{r,h} / sqrt(d) )
//! m_t = sum_e a_e v_e
//! ```
//!
//! The softmax normalizes over all incoming edges of `t` regardless of
//! relation. The update is `gelu -> linear`, blended with the input through
//! a learned sigmoid gate when input and output widths match.

use crate::error::{Error, Result};
use crate::input::EdgeIndex;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Init, Linear, Module, VarBuilder};
use std::collections::BTreeMap;
use topica_core::hetero::{EdgeType, NodeType};

/// Parameter path segment for an edge type.
pub(crate) fn edge_key(edge_type: &EdgeType) -> String {
    format!(
        "{}__{}__{}",
        edge_type.src_type, edge_type.relation, edge_type.dst_type
    )
}

struct Relation {
    /// `[H, D, D]` attention matrices.
    k_rel: Tensor,
    /// `[H, D, D]` message matrices.
    v_rel: Tensor,
    /// `[H]` prior.
    p_rel: Tensor,
}

impl Relation {
    fn new(heads: usize, head_dim: usize, vb: VarBuilder) -> Result<Self> {
        let bound = (6.0 / (2 * head_dim) as f64).sqrt();
        let glorot = Init::Uniform {
            lo: -bound,
            up: bound,
        };
        Ok(Self {
            k_rel: vb.get_with_hints((heads, head_dim, head_dim), "k_rel", glorot)?,
            v_rel: vb.get_with_hints((heads, head_dim, head_dim), "v_rel", glorot)?,
            p_rel: vb.get_with_hints(heads, "p_rel", Init::Const(1.0))?,
        })
    }
}

/// Apply a per-head `[H, D, D]` matrix to `[E, H, D]` rows.
fn per_head(xs: &Tensor, weights: &Tensor) -> Result<Tensor> {
    let out = xs
        .transpose(0, 1)?
        .contiguous()?
        .matmul(weights)?
        .transpose(0, 1)?
        .contiguous()?;
    Ok(out)
}

/// Softmax of `[E, H]` scores within groups of equal `index`.
///
/// `index` is a `[E]` u32 tensor of group ids in `0..num_segments`.
pub fn segment_softmax(scores: &Tensor, index: &Tensor, num_segments: usize) -> Result<Tensor> {
    let heads = scores.dim(1)?;
    // Per-head max over all edges; any per-head constant leaves the
    // in-group softmax unchanged, so it carries no gradient.
    let shift = scores.max_keepdim(0)?.detach();
    let exp = scores.broadcast_sub(&shift)?.exp()?;
    let denom = Tensor::zeros((num_segments, heads), exp.dtype(), exp.device())?
        .index_add(index, &exp, 0)?
        .index_select(index, 0)?;
    Ok(exp.div(&(denom + 1e-16)?)?)
}

/// Heterogeneous Graph Transformer layer.
///
/// # Reference
///
/// Hu, Dong, Wang & Sun, "Heterogeneous Graph Transformer", WWW 2020.
pub struct HgtConv {
    heads: usize,
    head_dim: usize,
    out_dim: usize,
    in_dim: usize,
    kqv: BTreeMap<NodeType, Linear>,
    out_lin: BTreeMap<NodeType, Linear>,
    skip: BTreeMap<NodeType, Tensor>,
    relations: BTreeMap<EdgeType, Relation>,
}

impl HgtConv {
    /// Create a layer for the given graph schema.
    ///
    /// # Arguments
    /// - `node_types`, `edge_types`: schema the layer has parameters for
    /// - `in_dim`: input width, shared by all node types
    /// - `out_dim`: output width, divisible by `heads`
    /// - `vb`: Variable builder for parameter initialization
    pub fn new(
        node_types: &[NodeType],
        edge_types: &[EdgeType],
        in_dim: usize,
        out_dim: usize,
        heads: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        if heads == 0 || out_dim % heads != 0 {
            return Err(Error::InvalidConfig(format!(
                "out_dim {out_dim} not divisible into {heads} heads"
            )));
        }
        let head_dim = out_dim / heads;

        let mut kqv = BTreeMap::new();
        let mut out_lin = BTreeMap::new();
        let mut skip = BTreeMap::new();
        for nt in node_types {
            kqv.insert(nt.clone(), linear(in_dim, 3 * out_dim, vb.pp("kqv").pp(nt.as_str()))?);
            out_lin.insert(nt.clone(), linear(out_dim, out_dim, vb.pp("out_lin").pp(nt.as_str()))?);
            skip.insert(
                nt.clone(),
                vb.pp("skip").get_with_hints((), nt.as_str(), Init::Const(1.0))?,
            );
        }

        let mut relations = BTreeMap::new();
        for et in edge_types {
            relations.insert(
                et.clone(),
                Relation::new(heads, head_dim, vb.pp("rel").pp(edge_key(et)))?,
            );
        }

        Ok(Self {
            heads,
            head_dim,
            out_dim,
            in_dim,
            kqv,
            out_lin,
            skip,
            relations,
        })
    }

    /// Output width.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// - `x`: `[n_t, in_dim]` features per node type
    /// - `edge_index`: edges per type, indices local to `x`
    ///
    /// # Returns
    /// `[n_t, out_dim]` for every node type in `x`. Edge types without
    /// parameters, without edges, or whose endpoint types are missing from
    /// `x` are skipped.
    pub fn forward(
        &self,
        x: &BTreeMap<NodeType, Tensor>,
        edge_index: &BTreeMap<EdgeType, EdgeIndex>,
    ) -> Result<BTreeMap<NodeType, Tensor>> {
        let (h, d) = (self.heads, self.head_dim);

        let mut k = BTreeMap::new();
        let mut q = BTreeMap::new();
        let mut v = BTreeMap::new();
        for (nt, xs) in x {
            let lin = self
                .kqv
                .get(nt)
                .ok_or_else(|| Error::MissingInput(nt.to_string()))?;
            let n = xs.dim(0)?;
            let kqv = lin.forward(xs)?;
            k.insert(nt, kqv.narrow(1, 0, self.out_dim)?.reshape((n, h, d))?);
            q.insert(nt, kqv.narrow(1, self.out_dim, self.out_dim)?.reshape((n, h, d))?);
            v.insert(nt, kqv.narrow(1, 2 * self.out_dim, self.out_dim)?.reshape((n, h, d))?);
        }

        // (scores [E,H], values [E,H,D], dst [E]) grouped by destination type
        let mut incoming: BTreeMap<&NodeType, Vec<(Tensor, Tensor, Tensor)>> = BTreeMap::new();
        for (et, idx) in edge_index {
            let Some(rel) = self.relations.get(et) else {
                continue;
            };
            if idx.is_empty() {
                continue;
            }
            let (Some(k_src), Some(v_src), Some(q_dst)) =
                (k.get(&et.src_type), v.get(&et.src_type), q.get(&et.dst_type))
            else {
                continue;
            };

            let k_e = per_head(&k_src.index_select(&idx.src, 0)?, &rel.k_rel)?;
            let v_e = per_head(&v_src.index_select(&idx.src, 0)?, &rel.v_rel)?;
            let q_e = q_dst.index_select(&idx.dst, 0)?;

            let scores = (q_e * k_e)?
                .sum(D::Minus1)?
                .broadcast_mul(&rel.p_rel)?
                .affine(1.0 / (d as f64).sqrt(), 0.0)?;
            incoming
                .entry(&et.dst_type)
                .or_default()
                .push((scores, v_e, idx.dst.clone()));
        }

        let mut out = BTreeMap::new();
        for (nt, xs) in x {
            let n = xs.dim(0)?;
            let aggregated = match incoming.remove(nt) {
                Some(parts) => aggregate(&parts, n, h, d, xs.device())?,
                None => Tensor::zeros((n, self.out_dim), xs.dtype(), xs.device())?,
            };

            let lin = self
                .out_lin
                .get(nt)
                .ok_or_else(|| Error::MissingInput(nt.to_string()))?;
            let mut o = lin.forward(&aggregated.gelu_erf()?)?;
            if self.in_dim == self.out_dim {
                if let Some(skip) = self.skip.get(nt) {
                    let gate = candle_nn::ops::sigmoid(skip)?;
                    o = (o.broadcast_mul(&gate)? + xs.broadcast_mul(&gate.affine(-1.0, 1.0)?)?)?;
                }
            }
            out.insert(nt.clone(), o);
        }
        Ok(out)
    }
}

/// Joint softmax over all relations pointing into one node type, then sum.
fn aggregate(
    parts: &[(Tensor, Tensor, Tensor)],
    num_nodes: usize,
    heads: usize,
    head_dim: usize,
    device: &Device,
) -> Result<Tensor> {
    let scores = Tensor::cat(&parts.iter().map(|p| &p.0).collect::<Vec<_>>(), 0)?;
    let values = Tensor::cat(&parts.iter().map(|p| &p.1).collect::<Vec<_>>(), 0)?;
    let dst = Tensor::cat(&parts.iter().map(|p| &p.2).collect::<Vec<_>>(), 0)?;

    let alpha = segment_softmax(&scores, &dst, num_nodes)?;
    let messages = values.broadcast_mul(&alpha.unsqueeze(2)?)?;
    let summed = Tensor::zeros((num_nodes, heads, head_dim), messages.dtype(), device)?
        .index_add(&dst, &messages, 0)?;
    Ok(summed.reshape((num_nodes, heads * head_dim))?)
}
