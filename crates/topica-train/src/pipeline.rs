//! From dataset root to batch loaders.
//!
//! Setup order:
//!
//! 1. load `processed/graph.bin`
//! 2. merge the infosphere, if requested
//! 3. attach `next_topic` targets (cached)
//! 4. cast paper features to float
//! 5. add reverse relations, target excluded
//! 6. cut the train (folds 0-3) and validation (fold 4) subgraphs
//! 7. link split each, wrap in loaders
//!
//! The model schema is taken from the full graph after step 5, so embedding
//! tables cover every stable node id.

use crate::config::{ExperimentConfig, RunConfig};
use crate::error::Result;
use std::path::Path;
use topica_core::hetero::{EdgeType, HeteroGraph};
use topica_core::infosphere::{load_infosphere, merge_infosphere};
use topica_core::sampling::LinkNeighborLoader;
use topica_core::split::RandomLinkSplit;
use topica_core::temporal::{filter, TemporalFilter};
use topica_core::transform::undirect;
use topica_core::{dataset, schema, target};
use topica_nn::ModelMetadata;
use tracing::{debug, info, warn};

/// Everything the trainer needs.
pub struct PreparedData {
    pub metadata: ModelMetadata,
    pub target: EdgeType,
    pub train_loader: LinkNeighborLoader,
    pub val_loader: LinkNeighborLoader,
}

/// Load the dataset under `exp.root` and build the frozen graph.
pub fn build_graph(run: &RunConfig, exp: &ExperimentConfig) -> Result<HeteroGraph> {
    let mut graph = dataset::load_graph(&exp.root)?;
    info!(
        nodes = graph.total_nodes(),
        edges = graph.total_edges(),
        "dataset loaded"
    );
    attach_inputs(&mut graph, run, exp.year, &exp.root)?;
    graph.cast_features_to_float(&schema::paper())?;

    let graph = undirect(&graph, &[schema::next_topic()]);
    graph.validate()?;
    debug!(stats = ?graph.stats(), "graph frozen");
    Ok(graph)
}

fn attach_inputs(graph: &mut HeteroGraph, run: &RunConfig, year: u16, root: &Path) -> Result<()> {
    if run.use_infosphere {
        let edges = load_infosphere(root, year, run.infosphere_depth)?;
        merge_infosphere(graph, edges);
    }

    let mode = run.target_mode();
    let target_year = mode.target_year(year);
    let targets = target::load_or_generate(graph, root, target_year, mode)?;
    info!(year = target_year, ?mode, edges = targets.num_edges(), "next-topic targets");
    graph.insert_edges(schema::next_topic(), targets);
    Ok(())
}

/// Split the frozen graph and wrap both halves in loaders.
pub fn build_loaders(graph: &HeteroGraph, exp: &ExperimentConfig) -> Result<PreparedData> {
    let target = schema::next_topic();
    let metadata = ModelMetadata::from_graph(graph, &target);

    let train_graph = filter(graph, &TemporalFilter::train(exp.year))?;
    let val_graph = filter(graph, &TemporalFilter::validation(exp.year))?;

    let (train_view, _) = RandomLinkSplit::new(target.clone())
        .with_seed(exp.seed)
        .split(&train_graph)?;
    let (val_view, _) = RandomLinkSplit::new(target.clone())
        .with_seed(exp.seed.wrapping_add(1))
        .split(&val_graph)?;
    info!(
        train = train_view.num_labels(),
        val = val_view.num_labels(),
        "labeled pairs"
    );
    if val_view.num_labels() == 0 {
        warn!("validation split has no labeled pairs");
    }

    let train_loader = LinkNeighborLoader::new(
        train_view,
        exp.fanout.clone(),
        exp.batch_size,
        true,
        exp.seed,
    )?;
    let val_loader = LinkNeighborLoader::new(
        val_view,
        exp.fanout.clone(),
        exp.batch_size,
        false,
        exp.seed,
    )?;

    Ok(PreparedData {
        metadata,
        target,
        train_loader,
        val_loader,
    })
}

/// [`build_graph`] then [`build_loaders`].
pub fn prepare(run: &RunConfig, exp: &ExperimentConfig) -> Result<PreparedData> {
    let graph = build_graph(run, exp)?;
    build_loaders(&graph, exp)
}
