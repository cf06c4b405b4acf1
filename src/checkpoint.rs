// SPDX-License-Identifier: Apache-2.0
//! The checkpoint engine: folds the writable overlay's accumulated changes
//! into one new immutable level (§4.3).
//!
//! Each new level stores only its own delta — the overlay's live edges at
//! checkpoint time — never a re-materialization of adjacency a reader could
//! already see through an older, still-published level. Reading a node's
//! full adjacency is [`crate::iter::AdjacencyIter`]'s job: it unions a
//! node's own-slice across every visible level, newest first. Writing the
//! full union back into the newest level's own-slice would double every
//! edge that predates this checkpoint.
//!
//! Each step is wrapped in a `tracing` span so ingest throughput is
//! observable without a benchmark CLI (out of scope, §1).

use crate::ident::{EdgeRef, LevelId, NodeId, NodeRaw, Timestamp};
use crate::level::{Csr, Level, LevelStack};
use crate::overlay::WritableOverlay;
use crate::property::{ColumnKind, Entity, PropertyRegistry, PropertyValue};
use std::sync::atomic::{AtomicU32, Ordering};

/// Runs the full checkpoint algorithm and publishes the resulting level.
/// Returns the new level's id.
///
/// Steps, matching §4.3: (1) snapshot counters, (2) degree pass, (3) edge
/// table allocation, (4) emit, (5) property promotion, (6) reverse edges,
/// (7) deletion-tracker bookkeeping, (8) retire the overlay.
pub fn run(
    level_stack: &LevelStack,
    overlay: &WritableOverlay,
    properties: &PropertyRegistry,
    build_reverse: bool,
) -> LevelId {
    // Step 1: snapshot counters.
    let levels_snapshot = level_stack.snapshot();
    let new_level_id = levels_snapshot
        .newest_level_id()
        .map_or(LevelId(0), LevelId::next);
    let new_watermark = overlay.max_node_watermark().max(levels_snapshot.max_nodes());
    let span = tracing::info_span!("checkpoint", level = new_level_id.0, max_nodes = new_watermark as u64);
    let _entered = span.enter();

    let n = new_watermark as usize;

    // Step 2: degree pass. `Δ` is the overlay's own live out-degree for each
    // node (§4.3 step 2) — not the node's total adjacency, which may already
    // be represented in an older, still-published level that this
    // checkpoint leaves untouched.
    let out_degrees: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0)).collect();
    crate::parallel::parallel_for(n, 256, |range| {
        for i in range {
            let node = NodeId(i as NodeRaw);
            let delta = overlay.node(node).map_or(0, |arc| arc.lock().live_out_degree());
            out_degrees[i].store(delta, Ordering::Relaxed);
        }
    });
    tracing::debug!(step = "degree_pass", nodes = n, "computed overlay out-degree delta");
    let out_degrees: Vec<u32> = out_degrees.into_iter().map(AtomicU32::into_inner).collect();

    // Step 3: edge table allocation, sized to the delta only.
    let mut out_csr = Csr::init_level_from_degrees(&out_degrees, new_level_id);

    // Step 4: emit. Sequential: Csr::fill_slice needs &mut access per node,
    // and the per-node work here is dominated by the lock acquisition
    // already bounded by step 2, not by the copy itself. Any nonzero weight
    // carried on an overlay edge (§4.2 `add_edge_for_streaming_with_weights`)
    // is re-addressed to this edge's new frozen position and staged into the
    // "weight" column's write shadow, so step 5's generic flush picks it up.
    let weight_col = properties.get(ColumnKind::Edge, "weight");
    let mut heads = Vec::new();
    for i in 0..n {
        let node = NodeId(i as NodeRaw);
        let start = out_csr.vertex(node).map_or(0, |e| e.adjacency_start);
        heads.clear();
        for (offset, edge) in overlay_delta_edges(overlay, node, true).into_iter().enumerate() {
            heads.push(resolve_target(overlay, edge, false));
            if let (EdgeRef::Overlay { index }, Some(col)) = (edge, &weight_col) {
                let weight = overlay.edge(index).weight;
                if weight != 0 {
                    let addr = EdgeRef::Frozen {
                        level: new_level_id,
                        index: start + offset as u32,
                    };
                    col.cow_write(Entity::Edge(addr), PropertyValue::Int64(weight));
                }
            }
        }
        out_csr.fill_slice(node, &heads);
    }
    tracing::debug!(step = "emit", nodes = n, "materialized overlay delta into new level");

    // Step 5: property promotion. Node columns get one slot per node; edge
    // columns get one slot per emitted out-edge, addressed by its new
    // `EdgeRef::Frozen { level: new_level_id, index }` position.
    for name in properties.node_names() {
        if let Some(col) = properties.get(ColumnKind::Node, &name) {
            col.cow_init_level(new_level_id, n);
            col.flush_shadow_into_level(new_level_id);
        }
    }
    for name in properties.edge_names() {
        if let Some(col) = properties.get(ColumnKind::Edge, &name) {
            col.cow_init_level(new_level_id, out_csr.max_edges());
            col.flush_shadow_into_level(new_level_id);
        }
    }
    tracing::debug!(step = "property_promotion", "flushed property shadows");

    // Step 6: reverse edges.
    let (inbound, out_to_in, in_to_out) = if build_reverse {
        build_reverse_csr(overlay, n, new_level_id, &out_csr)
    } else {
        (None, None, None)
    };
    tracing::debug!(step = "reverse_edges", built = build_reverse);

    // Step 7: deletion-tracker bookkeeping. Older frozen levels stay on the
    // stack for readers whose visibility window caps out below
    // `new_level_id`, so their deletion records must not be dropped here —
    // only `delete_level` retires a level's deletions, once nothing can
    // still address it.
    tracing::debug!(step = "deletion_compaction", note = "no-op: historical levels keep their own deletion records");

    // Step 8: retire overlay.
    overlay.drain(new_watermark);
    tracing::info!(step = "retire_overlay", new_watermark = new_watermark as u64);

    level_stack.publish(Level {
        id: new_level_id,
        out: out_csr,
        inbound,
        out_to_in,
        in_to_out,
    });

    new_level_id
}

/// The overlay's own live edges for `node` — the `Δ` this checkpoint
/// folds in, never anything already represented in a frozen level.
fn overlay_delta_edges(overlay: &WritableOverlay, node: NodeId, out_direction: bool) -> Vec<EdgeRef> {
    let Some(arc) = overlay.node(node) else {
        return Vec::new();
    };
    let guard = arc.lock();
    let indices = if out_direction { &guard.out_edges } else { &guard.in_edges };
    indices
        .iter()
        .filter(|&&idx| overlay.edge(idx).is_visible(Timestamp::MAX))
        .map(|&idx| EdgeRef::Overlay { index: idx })
        .collect()
}

/// Resolves an overlay `EdgeRef` yielded by [`overlay_delta_edges`] to the
/// raw neighbor id on the side opposite `node`.
fn resolve_target(overlay: &WritableOverlay, edge: EdgeRef, want_source: bool) -> NodeRaw {
    match edge {
        EdgeRef::Overlay { index } => {
            let e = overlay.edge(index);
            if want_source { e.source.0 } else { e.target.0 }
        }
        EdgeRef::Frozen { .. } | EdgeRef::Nil => {
            crate::invariant!(false, "checkpoint-delta-edge-must-be-overlay-resident");
            NodeId::NIL.0
        }
    }
}

fn build_reverse_csr(
    overlay: &WritableOverlay,
    n: usize,
    new_level_id: LevelId,
    out_csr: &Csr,
) -> (Option<Csr>, Option<Vec<u32>>, Option<Vec<u32>>) {
    let in_degrees: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0)).collect();
    crate::parallel::parallel_for(n, 256, |range| {
        for i in range {
            let node = NodeId(i as NodeRaw);
            let delta = overlay.node(node).map_or(0, |arc| arc.lock().live_in_degree());
            in_degrees[i].store(delta, Ordering::Relaxed);
        }
    });
    let in_degrees: Vec<u32> = in_degrees.into_iter().map(AtomicU32::into_inner).collect();
    let mut in_csr = Csr::init_level_from_degrees(&in_degrees, new_level_id);

    let mut out_to_in = vec![u32::MAX; out_csr.max_edges()];
    let mut in_to_out = vec![u32::MAX; in_csr.max_edges()];
    let mut heads = Vec::new();
    for i in 0..n {
        let node = NodeId(i as NodeRaw);
        heads.clear();
        for edge in overlay_delta_edges(overlay, node, false) {
            heads.push(resolve_target(overlay, edge, true));
        }
        in_csr.fill_slice(node, &heads);

        // Cross-link: for each in-edge we just emitted, find the matching
        // out-edge entry (same (source, target) pair) in this same new
        // level's own slice and record the index translation both ways.
        if let Some(in_entry) = in_csr.vertex(node) {
            let in_start = in_entry.adjacency_start;
            for (offset, &src_raw) in heads.iter().enumerate() {
                let src = NodeId(src_raw);
                if let Some(out_idx) = out_csr.find_in_own_slice(src, node) {
                    let in_idx = in_start + offset as u32;
                    out_to_in[out_idx as usize] = in_idx;
                    in_to_out[in_idx as usize] = out_idx;
                }
            }
        }
    }

    (Some(in_csr), Some(out_to_in), Some(in_to_out))
}
