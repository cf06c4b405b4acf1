// SPDX-License-Identifier: Apache-2.0
//! Property-based checks for the invariants carried forward from the
//! distilled specification: degree accounting after a checkpoint, the
//! out/in-CSR mirror relationship when reverse edges are built, and the
//! external sort's permutation property.

use llama_mlcsr::{ExternalSort, ExternalSortConfig, Graph, LoaderConfig, NodeId, Timestamp};
use proptest::prelude::*;
use std::collections::HashMap;

fn edge_strategy(max_nodes: u32) -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0..max_nodes, 0..max_nodes), 0..60)
}

fn counts_by(edges: &[(u32, u32)], pick: impl Fn(&(u32, u32)) -> u32) -> HashMap<u32, u32> {
    let mut counts = HashMap::new();
    for edge in edges {
        *counts.entry(pick(edge)).or_insert(0) += 1;
    }
    counts
}

proptest! {
    /// After one checkpoint, every node's reported out-degree equals the
    /// number of edges ingested with that tail — parallel edges are not
    /// deduplicated by plain `add_edge` (callers that want dedup use
    /// `add_edge_if_not_exists`).
    #[test]
    fn out_degree_matches_ingested_edge_count(edges in edge_strategy(12)) {
        let graph = Graph::new(&LoaderConfig::default());
        let ts = graph.overlay().tx_begin();
        for &(tail, head) in &edges {
            graph.add_edge(NodeId(tail.into()), NodeId(head.into()), ts);
        }
        graph.overlay().tx_commit();
        graph.checkpoint();

        let expected = counts_by(&edges, |&(tail, _)| tail);
        let vis = graph.current_visibility();
        for node in 0..12u32 {
            let want = expected.get(&node).copied().unwrap_or(0) as usize;
            prop_assert_eq!(graph.out_degree(NodeId(node.into()), vis), want);
        }
    }

    /// With `reverse_edges` on, in-degree (backed by the mirrored in-CSR
    /// the checkpoint engine builds) matches the number of edges ingested
    /// with that head — the out/in-CSR mirror invariant, observed from the
    /// in-degree side rather than the out-degree side of the same data.
    #[test]
    fn in_degree_matches_ingested_edge_count_when_reverse_built(edges in edge_strategy(10)) {
        let config = LoaderConfig { reverse_edges: true, ..LoaderConfig::default() };
        let graph = Graph::new(&config);
        let ts = graph.overlay().tx_begin();
        for &(tail, head) in &edges {
            graph.add_edge(NodeId(tail.into()), NodeId(head.into()), ts);
        }
        graph.overlay().tx_commit();
        graph.checkpoint();

        let expected = counts_by(&edges, |&(_, head)| head);
        let vis = graph.current_visibility();
        for node in 0..10u32 {
            let want = expected.get(&node).copied().unwrap_or(0) as usize;
            prop_assert_eq!(graph.in_degree(NodeId(node.into()), vis), want);
        }
    }

    /// The external sort never drops or invents an item, regardless of how
    /// small the in-memory budget forces it to spill.
    #[test]
    fn external_sort_is_a_permutation_of_its_input(values in prop::collection::vec(any::<i32>(), 0..200), budget_items in 1usize..20) {
        let mut xs = ExternalSort::<i32>::new(ExternalSortConfig {
            budget_bytes: budget_items * std::mem::size_of::<i32>(),
            tmp_dirs: Vec::new(),
        });
        for &v in &values {
            xs.push(v).unwrap();
        }
        xs.sort().unwrap();
        let mut out = Vec::new();
        while xs.next_block(&mut out, 17).unwrap() {}

        let mut expected = values;
        expected.sort_unstable();
        prop_assert_eq!(out, expected);
    }

    /// Deleting a frozen out-edge removes exactly one unit of out-degree and
    /// makes `find` stop reporting it.
    #[test]
    fn deleting_one_edge_changes_degree_by_exactly_one(edges in edge_strategy(8)) {
        prop_assume!(!edges.is_empty());
        let graph = Graph::new(&LoaderConfig::default());
        let ts = graph.overlay().tx_begin();
        for &(tail, head) in &edges {
            graph.add_edge(NodeId(tail.into()), NodeId(head.into()), ts);
        }
        graph.overlay().tx_commit();
        graph.checkpoint();

        let (tail, head) = edges[0];
        let tail = NodeId(tail.into());
        let head = NodeId(head.into());
        let vis = graph.current_visibility();
        let before = graph.out_degree(tail, vis);

        let Some(edge) = graph.find(tail, head, Timestamp::MAX) else {
            return Ok(());
        };
        let ts2 = graph.overlay().tx_begin();
        graph.delete_out_edge(tail, edge, ts2);
        graph.overlay().tx_commit();

        let after_vis = graph.current_visibility();
        prop_assert_eq!(graph.out_degree(tail, after_vis), before - 1);
        prop_assert!(graph.find(tail, head, Timestamp::MAX).is_none());
    }
}
