//! Graph transforms applied once during setup.

use crate::hetero::{EdgeType, HeteroGraph};
use tracing::debug;

/// Make every relation traversable in both directions.
///
/// Same-type relations (`paper -[cites]-> paper`) are symmetrized in place.
/// Bipartite relations get a `rev_<rel>` companion holding the flipped
/// edges. Relations in `exclude` and synthesized reverses are left alone, so
/// applying the transform twice is the same as applying it once.
pub fn undirect(graph: &HeteroGraph, exclude: &[EdgeType]) -> HeteroGraph {
    let mut out = graph.clone();
    for (edge_type, store) in graph.edges() {
        if exclude.contains(edge_type) || edge_type.is_reverse() {
            continue;
        }
        if edge_type.is_bipartite() {
            let rev = edge_type.reverse();
            debug!(edge_type = %rev, edges = store.num_edges(), "adding reverse relation");
            out.insert_edges(rev, store.reversed().coalesced());
        } else {
            out.insert_edges(edge_type.clone(), store.symmetrized());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hetero::{EdgeStore, NodeStore};
    use crate::schema;

    fn graph() -> HeteroGraph {
        let mut hg = HeteroGraph::new();
        hg.add_node_type(schema::author(), NodeStore::new(2));
        hg.add_node_type(schema::paper(), NodeStore::new(3));
        hg.add_node_type(schema::topic(), NodeStore::new(2));
        hg.insert_edges(schema::writes(), EdgeStore::from_pairs([(0, 0), (1, 2)]));
        hg.insert_edges(schema::cites(), EdgeStore::from_pairs([(0, 1), (2, 1)]));
        hg.insert_edges(schema::next_topic(), EdgeStore::from_pairs([(0, 1)]));
        hg
    }

    #[test]
    fn test_reverse_relations_added() {
        let hg = undirect(&graph(), &[schema::next_topic()]);
        let rev = hg.edge_store(&schema::writes().reverse()).unwrap();
        assert_eq!(rev.iter().collect::<Vec<_>>(), vec![(0, 0), (2, 1)]);
        assert!(!hg.contains_edge_type(&schema::next_topic().reverse()));
        assert!(hg.contains_edge_type(&schema::next_topic()));
    }

    #[test]
    fn test_same_type_symmetrized_in_place() {
        let hg = undirect(&graph(), &[schema::next_topic()]);
        assert!(!hg.contains_edge_type(&schema::cites().reverse()));
        assert_eq!(
            hg.edge_store(&schema::cites()).unwrap().iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 0), (1, 2), (2, 1)]
        );
    }

    #[test]
    fn test_idempotent() {
        let once = undirect(&graph(), &[schema::next_topic()]);
        let twice = undirect(&once, &[schema::next_topic()]);
        assert_eq!(once, twice);
    }
}
