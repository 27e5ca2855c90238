//! Supervision pairs for link prediction.
//!
//! [`RandomLinkSplit`] turns the target relation of a graph into a labeled
//! set: every existing target edge is a positive, and an equal number (by
//! default) of uniformly drawn non-edges are negatives.
//!
//! No edges are held out. The target edges stay in the view's graph so the
//! neighbor sampler can walk them; batches strip them before message passing
//! (see [`crate::hetero::StructuralView`]).

use crate::error::{Error, Result};
use crate::hetero::{EdgeStore, EdgeType, HeteroGraph};
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A graph plus the labeled pairs to supervise on.
#[derive(Debug, Clone)]
pub struct LinkSplitView {
    /// Full structure, target relation included.
    pub graph: HeteroGraph,
    /// The relation being predicted.
    pub target: EdgeType,
    /// Candidate pairs (src local id, dst local id).
    pub edge_label_index: EdgeStore,
    /// 1.0 for positives, 0.0 for negatives; parallel to `edge_label_index`.
    pub edge_label: Vec<f32>,
}

impl LinkSplitView {
    /// Number of labeled pairs.
    pub fn num_labels(&self) -> usize {
        self.edge_label.len()
    }

    /// Number of positive pairs.
    pub fn num_positives(&self) -> usize {
        self.edge_label.iter().filter(|&&l| l > 0.5).count()
    }
}

/// Link split without held-out edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomLinkSplit {
    /// Relation to split.
    pub target: EdgeType,
    /// Negatives drawn per positive.
    pub neg_sampling_ratio: f64,
    /// RNG seed.
    pub seed: u64,
}

impl RandomLinkSplit {
    pub fn new(target: EdgeType) -> Self {
        Self {
            target,
            neg_sampling_ratio: 1.0,
            seed: 42,
        }
    }

    pub fn with_neg_sampling_ratio(mut self, ratio: f64) -> Self {
        self.neg_sampling_ratio = ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Split `graph` into `(train_view, val_view)`.
    ///
    /// The train view labels all target edges plus sampled negatives. The
    /// validation view shares the structure but carries no labels.
    pub fn split(&self, graph: &HeteroGraph) -> Result<(LinkSplitView, LinkSplitView)> {
        let positives = graph.require_edge_store(&self.target)?.clone().coalesced();
        let num_src = graph.require_node_store(&self.target.src_type)?.num_nodes();
        let num_dst = graph.require_node_store(&self.target.dst_type)?.num_nodes();

        let requested = (self.neg_sampling_ratio * positives.num_edges() as f64).round() as usize;
        let mut rng = XorShiftRng::seed_from_u64(self.seed);
        let negatives = sample_negatives(&positives, num_src, num_dst, requested, &mut rng)?;

        debug!(
            target = %self.target,
            positives = positives.num_edges(),
            negatives = negatives.num_edges(),
            "link split"
        );

        let mut edge_label = vec![1.0; positives.num_edges()];
        edge_label.resize(positives.num_edges() + negatives.num_edges(), 0.0);
        let mut edge_label_index = positives;
        edge_label_index.src.extend(negatives.src);
        edge_label_index.dst.extend(negatives.dst);

        let train = LinkSplitView {
            graph: graph.clone(),
            target: self.target.clone(),
            edge_label_index,
            edge_label,
        };
        let val = LinkSplitView {
            graph: graph.clone(),
            target: self.target.clone(),
            edge_label_index: EdgeStore::new(),
            edge_label: Vec::new(),
        };
        Ok((train, val))
    }
}

/// Draw `requested` distinct pairs from `[0, num_src) x [0, num_dst)` that
/// are not in `positives`.
pub fn sample_negatives<R: Rng>(
    positives: &EdgeStore,
    num_src: usize,
    num_dst: usize,
    requested: usize,
    rng: &mut R,
) -> Result<EdgeStore> {
    let taken: HashSet<(usize, usize)> = positives.iter().collect();
    let available = (num_src * num_dst).saturating_sub(taken.len());
    if requested > available {
        return Err(Error::InsufficientNegatives {
            requested,
            available,
        });
    }
    if requested == 0 {
        return Ok(EdgeStore::new());
    }

    // Rejection sampling degrades as the complement shrinks; enumerate it instead.
    if requested * 2 > available {
        warn!(requested, available, "dense pair space, enumerating non-edges");
        let mut complement: Vec<(usize, usize)> = (0..num_src)
            .flat_map(|s| (0..num_dst).map(move |d| (s, d)))
            .filter(|p| !taken.contains(p))
            .collect();
        complement.shuffle(rng);
        complement.truncate(requested);
        return Ok(EdgeStore::from_pairs(complement));
    }

    let mut seen = HashSet::with_capacity(requested);
    let mut out = EdgeStore::new();
    while out.num_edges() < requested {
        let pair = (rng.gen_range(0..num_src), rng.gen_range(0..num_dst));
        if !taken.contains(&pair) && seen.insert(pair) {
            out.add_edge(pair.0, pair.1);
        }
    }
    Ok(out)
}
