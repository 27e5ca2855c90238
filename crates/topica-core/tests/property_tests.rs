//! Property-based tests for the academic graph pipeline.
//!
//! These tests verify invariants that should hold for any input graph:
//! - Filtered subgraphs stay well-formed
//! - Reverse relations mirror their originals
//! - Target generation is stable
//! - Link splits are balanced and disjoint
//! - Sampled batches never leak the target as structure

use proptest::prelude::*;
use std::collections::HashSet;
use topica_core::hetero::{EdgeStore, HeteroGraph, NodeFeatures, NodeStore};
use topica_core::sampling::LinkNeighborLoader;
use topica_core::schema;
use topica_core::split::RandomLinkSplit;
use topica_core::target::{generate_target_edges, TargetMode};
use topica_core::temporal::{filter, TemporalFilter};
use topica_core::transform::undirect;

prop_compose! {
    fn arb_graph()(
        num_authors in 2usize..12,
        num_papers in 2usize..20,
        num_topics in 2usize..8,
    )(
        folds in prop::collection::vec(0u8..5, num_authors),
        years in prop::collection::vec(2015u16..2022, num_papers),
        writes in prop::collection::vec((0..num_authors, 0..num_papers), 1..40),
        cites in prop::collection::vec((0..num_papers, 0..num_papers), 0..30),
        about in prop::collection::vec((0..num_papers, 0..num_topics), 1..40),
        num_topics in Just(num_topics),
    ) -> HeteroGraph {
        let num_authors = folds.len();
        let num_papers = years.len();
        let mut hg = HeteroGraph::new();
        hg.add_node_type(schema::author(), NodeStore::new(num_authors).with_fold(folds));
        hg.add_node_type(
            schema::paper(),
            NodeStore::new(num_papers)
                .with_year(years)
                .with_features(NodeFeatures::Int { cols: 1, data: (0..num_papers as i64).collect() }),
        );
        hg.add_node_type(schema::topic(), NodeStore::new(num_topics));
        hg.insert_edges(schema::writes(), EdgeStore::from_pairs(writes).coalesced());
        hg.insert_edges(schema::cites(), EdgeStore::from_pairs(cites).coalesced());
        hg.insert_edges(schema::about(), EdgeStore::from_pairs(about).coalesced());
        hg
    }
}

fn with_target(mut hg: HeteroGraph, year: u16) -> HeteroGraph {
    let edges = generate_target_edges(&hg, year, TargetMode::All).unwrap();
    hg.insert_edges(schema::next_topic(), edges);
    undirect(&hg, &[schema::next_topic()])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn filtered_subgraph_has_no_dangling_edges(
        hg in arb_graph(),
        max_year in 2015u16..2022,
        fold in 0u8..5,
    ) {
        let sub = filter(&hg, &TemporalFilter::new([fold], max_year)).unwrap();
        prop_assert!(sub.validate().is_ok());

        let papers = sub.node_store(&schema::paper()).unwrap();
        prop_assert!(papers.year.as_ref().unwrap().iter().all(|&y| y <= max_year));
        let authors = sub.node_store(&schema::author()).unwrap();
        prop_assert!(authors.fold.as_ref().unwrap().iter().all(|&f| f == fold));
    }

    #[test]
    fn undirect_is_idempotent_and_mirrors(hg in arb_graph()) {
        let once = undirect(&hg, &[schema::next_topic()]);
        let twice = undirect(&once, &[schema::next_topic()]);
        prop_assert_eq!(&once, &twice);

        for et in [schema::writes(), schema::about()] {
            let forward: HashSet<_> = once.edge_store(&et).unwrap().iter().collect();
            let backward: HashSet<_> = once
                .edge_store(&et.reverse())
                .unwrap()
                .iter()
                .map(|(s, d)| (d, s))
                .collect();
            prop_assert_eq!(forward, backward);
        }
    }

    #[test]
    fn target_generation_is_deterministic(hg in arb_graph(), year in 2015u16..2022) {
        let a = generate_target_edges(&hg, year, TargetMode::All).unwrap();
        let b = generate_target_edges(&hg, year, TargetMode::All).unwrap();
        prop_assert_eq!(&a, &b.coalesced());
    }

    #[test]
    fn only_new_is_subset_of_all(hg in arb_graph(), year in 2015u16..2022) {
        let all: HashSet<_> = generate_target_edges(&hg, year, TargetMode::All)
            .unwrap()
            .iter()
            .collect();
        let new = generate_target_edges(&hg, year, TargetMode::OnlyNew).unwrap();
        prop_assert!(new.iter().all(|p| all.contains(&p)));
    }

    #[test]
    fn split_is_balanced_and_disjoint(hg in arb_graph(), year in 2015u16..2022, seed in 0u64..1000) {
        let hg = with_target(hg, year);
        let positives: HashSet<_> = hg.edge_store(&schema::next_topic()).unwrap().iter().collect();
        let space = hg.num_nodes(&schema::author()) * hg.num_nodes(&schema::topic());
        prop_assume!(positives.len() * 2 <= space);

        let (train, _) = RandomLinkSplit::new(schema::next_topic())
            .with_seed(seed)
            .split(&hg)
            .unwrap();
        let negatives: Vec<_> = train
            .edge_label_index
            .iter()
            .zip(&train.edge_label)
            .filter(|(_, &l)| l == 0.0)
            .map(|(p, _)| p)
            .collect();
        prop_assert_eq!(negatives.len(), positives.len());
        prop_assert!(negatives.iter().all(|p| !positives.contains(p)));
        prop_assert_eq!(negatives.iter().collect::<HashSet<_>>().len(), negatives.len());
    }

    #[test]
    fn batches_never_carry_target_structure(hg in arb_graph(), year in 2015u16..2022) {
        let hg = with_target(hg, year);
        let positives = hg.num_edges(&schema::next_topic());
        let space = hg.num_nodes(&schema::author()) * hg.num_nodes(&schema::topic());
        prop_assume!(positives * 2 <= space);

        let (train, _) = RandomLinkSplit::new(schema::next_topic()).split(&hg).unwrap();
        let mut loader = LinkNeighborLoader::new(train, vec![20, 10], 4, true, 7).unwrap();
        let mut labels = 0;
        for batch in loader.batches() {
            prop_assert!(!batch.edges.contains_key(&schema::next_topic()));
            for (et, store) in &batch.edges {
                let n_src = batch.num_nodes(&et.src_type);
                let n_dst = batch.num_nodes(&et.dst_type);
                prop_assert!(store.iter().all(|(s, d)| s < n_src && d < n_dst));
            }
            labels += batch.num_labels();
        }
        prop_assert_eq!(labels, positives * 2);
    }
}
