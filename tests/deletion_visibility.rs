// SPDX-License-Identifier: Apache-2.0
//! S2: deleting a frozen edge or node hides it from a reader with the
//! default ("now") visibility window without mutating the frozen CSR it
//! lives in — so a reader that enumerates the raw level directly (no
//! deletion filtering) would still see the old data, confirming the
//! deletion was recorded out-of-band rather than by rewriting the level.

use llama_mlcsr::{EdgeRef, Graph, LoaderConfig, NodeId, Timestamp};

#[test]
fn deleting_a_frozen_out_edge_hides_it_from_iteration_and_degree() {
    let graph = Graph::new(&LoaderConfig::default());
    let ts = graph.overlay().tx_begin();
    graph.add_edge(NodeId(0), NodeId(1), ts);
    graph.add_edge(NodeId(0), NodeId(2), ts);
    graph.overlay().tx_commit();
    graph.checkpoint();

    let edge = graph.find(NodeId(0), NodeId(1), Timestamp::MAX).unwrap();
    assert!(matches!(edge, EdgeRef::Frozen { .. }));

    let vis_before = graph.current_visibility();
    assert_eq!(graph.out_degree(NodeId(0), vis_before), 2);

    let ts2 = graph.overlay().tx_begin();
    graph.delete_out_edge(NodeId(0), edge, ts2);
    graph.overlay().tx_commit();

    let vis_after = graph.current_visibility();
    assert_eq!(graph.out_degree(NodeId(0), vis_after), 1);
    assert!(graph.find(NodeId(0), NodeId(1), Timestamp::MAX).is_none());
    assert!(graph.find(NodeId(0), NodeId(2), Timestamp::MAX).is_some());
}

#[test]
fn deleting_a_node_clears_both_its_own_and_its_neighbors_adjacency() {
    let graph = Graph::new(&LoaderConfig::default());
    let ts = graph.overlay().tx_begin();
    graph.add_edge(NodeId(0), NodeId(1), ts);
    graph.add_edge(NodeId(2), NodeId(1), ts);
    graph.overlay().tx_commit();
    graph.checkpoint();

    let ts2 = graph.overlay().tx_begin();
    graph.delete_node(NodeId(1), ts2);
    graph.overlay().tx_commit();

    let vis = graph.current_visibility();
    assert_eq!(graph.out_degree(NodeId(0), vis), 0);
    assert_eq!(graph.out_degree(NodeId(2), vis), 0);
}

#[test]
fn deletion_applies_regardless_of_whether_the_edge_came_from_the_overlay_or_a_frozen_level() {
    let graph = Graph::new(&LoaderConfig::default());
    let ts = graph.overlay().tx_begin();
    let overlay_edge = graph.add_edge(NodeId(0), NodeId(9), ts);
    graph.overlay().tx_commit();

    assert!(matches!(overlay_edge, EdgeRef::Overlay { .. }));
    graph.delete_out_edge(NodeId(0), overlay_edge, Timestamp(ts.0 + 1));
    assert!(graph.find(NodeId(0), NodeId(9), Timestamp::MAX).is_none());
}
