// SPDX-License-Identifier: Apache-2.0
//! S3: bulk-loading an edge list straight into a level, bypassing the
//! overlay entirely.

use llama_mlcsr::{Direction, Graph, LoaderConfig, NodeId};

#[test]
fn direct_load_produces_a_level_with_no_overlay_involvement() {
    let graph = Graph::new(&LoaderConfig::default());
    let edges = vec![
        (NodeId(0), NodeId(1)),
        (NodeId(0), NodeId(2)),
        (NodeId(1), NodeId(2)),
        (NodeId(3), NodeId(0)),
    ];
    let level = graph
        .direct_load(4, &edges, &LoaderConfig::default())
        .expect("default config always validates");

    assert_eq!(graph.num_levels(), 1);
    assert_eq!(graph.overlay().max_node_watermark(), 0);

    let vis = graph.current_visibility();
    assert_eq!(vis.max_level, level);
    assert_eq!(graph.out_degree(NodeId(0), vis), 2);
    assert_eq!(graph.out_degree(NodeId(1), vis), 1);
    assert_eq!(graph.out_degree(NodeId(2), vis), 0);
    assert_eq!(graph.out_degree(NodeId(3), vis), 1);
}

#[test]
fn a_second_direct_load_publishes_a_new_level_on_top() {
    let graph = Graph::new(&LoaderConfig::default());
    let first = graph
        .direct_load(2, &[(NodeId(0), NodeId(1))], &LoaderConfig::default())
        .expect("default config always validates");
    let second = graph
        .direct_load(2, &[(NodeId(1), NodeId(0))], &LoaderConfig::default())
        .expect("default config always validates");
    assert_ne!(first, second);
    assert_eq!(graph.num_levels(), 2);
}

#[test]
fn literal_s3_scenario_undirected_ordered_with_dedup() {
    let graph = Graph::new(&LoaderConfig::default());
    let edges = vec![
        (NodeId(2), NodeId(0)),
        (NodeId(0), NodeId(2)),
        (NodeId(2), NodeId(1)),
        (NodeId(1), NodeId(0)),
        (NodeId(0), NodeId(1)),
    ];
    let config = LoaderConfig {
        direction: Direction::UndirectedOrdered,
        deduplicate: true,
        ..LoaderConfig::default()
    };
    let level = graph
        .direct_load(3, &edges, &config)
        .expect("UndirectedOrdered + deduplicate is a supported combination");

    let vis = graph.current_visibility();
    assert_eq!(vis.max_level, level);

    // Expected: one level with edges {(0,1),(0,2),(1,2)}; adjacency of node
    // 0 yields {1,2} in that order.
    assert_eq!(graph.out_degree(NodeId(0), vis), 2);
    assert_eq!(graph.out_degree(NodeId(1), vis), 1);
    assert_eq!(graph.out_degree(NodeId(2), vis), 0);

    let edge_01 = graph
        .find(NodeId(0), NodeId(1), vis.timestamp)
        .expect("(0,1) survives UndirectedOrdered materialization");
    let edge_02 = graph
        .find(NodeId(0), NodeId(2), vis.timestamp)
        .expect("(0,2) survives UndirectedOrdered materialization");
    assert!(graph.find(NodeId(1), NodeId(2), vis.timestamp).is_some());

    // Node 0's adjacency yields {1,2} in that order: within one level,
    // adjacency position is the edge-table index.
    let (llama_mlcsr::EdgeRef::Frozen { index: idx_01, .. }, llama_mlcsr::EdgeRef::Frozen { index: idx_02, .. }) =
        (edge_01, edge_02)
    else {
        unreachable!("direct_load only ever produces Frozen edges");
    };
    assert!(idx_01 < idx_02);
}
