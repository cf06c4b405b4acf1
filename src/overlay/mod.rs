// SPDX-License-Identifier: Apache-2.0
//! The writable overlay: the append-only, lock-coordinated buffer that
//! accepts structural mutations between checkpoints (§4.2).

mod record;

pub use record::{OverlayEdge, OverlayNode, OverlayNodeState};

use crate::ident::{EdgeRef, NodeId, NodeRaw, Timestamp};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Accept concurrent structural mutations between checkpoints (§4.2).
///
/// Node records live behind an outer `RwLock<FxHashMap<..>>` (the sparse
/// directory) plus a `parking_lot::Mutex` per node (the per-node latch in
/// §4.2/§5); edges live in one dense, append-only arena guarded by its own
/// lock so that `EdgeRef::Overlay { index }` is a single flat integer space
/// independent of which node owns it (§9 "cyclic ownership" note).
pub struct WritableOverlay {
    nodes: RwLock<FxHashMap<NodeId, Arc<Mutex<OverlayNode>>>>,
    edges: RwLock<Vec<Mutex<OverlayEdge>>>,
    /// Serializes allocation of fresh node ids and the `max_nodes` watermark
    /// (§4.2 "a global `new_node_lock`").
    new_node_lock: Mutex<()>,
    next_new_node_id: AtomicU64,
    tx_counter: AtomicU64,
    active_transactions: AtomicI64,
}

impl WritableOverlay {
    /// `watermark` is the `max_nodes` of the level stack at construction (or
    /// immediately after a checkpoint retires the previous overlay) — fresh
    /// ids from `add_node()` start here.
    #[must_use]
    pub fn new(watermark: NodeRaw) -> Self {
        Self {
            nodes: RwLock::new(FxHashMap::default()),
            edges: RwLock::new(Vec::new()),
            new_node_lock: Mutex::new(()),
            next_new_node_id: AtomicU64::new(watermark as u64),
            tx_counter: AtomicU64::new(1),
            active_transactions: AtomicI64::new(0),
        }
    }

    /// `tx_begin`: issue a monotonically increasing per-thread timestamp.
    #[must_use]
    pub fn tx_begin(&self) -> Timestamp {
        self.active_transactions.fetch_add(1, Ordering::AcqRel);
        Timestamp(self.tx_counter.fetch_add(1, Ordering::AcqRel))
    }

    pub fn tx_commit(&self) {
        self.active_transactions.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn tx_abort(&self) {
        self.active_transactions.fetch_sub(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn active_transactions(&self) -> i64 {
        self.active_transactions.load(Ordering::Acquire)
    }

    /// The next id `add_node()` (no explicit id) would hand out.
    #[must_use]
    pub fn max_node_watermark(&self) -> NodeRaw {
        self.next_new_node_id.load(Ordering::Acquire) as NodeRaw
    }

    fn get_or_create(&self, id: NodeId, ts: Timestamp) -> Arc<Mutex<OverlayNode>> {
        if let Some(existing) = self.nodes.read().get(&id) {
            return Arc::clone(existing);
        }
        let mut nodes = self.nodes.write();
        Arc::clone(
            nodes
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(OverlayNode::new(ts)))),
        )
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<Arc<Mutex<OverlayNode>>> {
        self.nodes.read().get(&id).cloned()
    }

    /// `add_node() -> node_t`: allocate a fresh id past the current
    /// `max_nodes` watermark. Serialized by `new_node_lock` (§4.2).
    #[must_use]
    pub fn add_node(&self, ts: Timestamp) -> NodeId {
        let _guard = self.new_node_lock.lock();
        let raw = self.next_new_node_id.fetch_add(1, Ordering::AcqRel);
        let id = NodeId(raw as NodeRaw);
        self.get_or_create(id, ts);
        id
    }

    /// `add_node(id)`: idempotent — returns `true` if `id` did not
    /// previously exist in the overlay. Also advances the watermark if `id`
    /// is past it, so future `add_node()` calls never collide (§4.2/§9 open
    /// question: this implementation treats the watermark bump and the
    /// idempotent-insert check as a single critical section guarded by
    /// `new_node_lock`, so the two paths the distilled spec flags as
    /// possibly disagreeing cannot race against each other here).
    pub fn add_node_with_id(&self, id: NodeId, ts: Timestamp) -> bool {
        let _guard = self.new_node_lock.lock();
        let created = {
            let mut nodes = self.nodes.write();
            if nodes.contains_key(&id) {
                false
            } else {
                nodes.insert(id, Arc::new(Mutex::new(OverlayNode::new(ts))));
                true
            }
        };
        let past_watermark = u64::from(id.0) + 1;
        self.next_new_node_id.fetch_max(past_watermark, Ordering::AcqRel);
        created
    }

    fn push_edge(&self, edge: OverlayEdge) -> u32 {
        let mut edges = self.edges.write();
        let index = edges.len() as u32;
        edges.push(Mutex::new(edge));
        index
    }

    fn new_edge_record(src: NodeId, dst: NodeId, ts: Timestamp) -> OverlayEdge {
        OverlayEdge {
            source: src,
            target: dst,
            deleted: false,
            numerical_id: 0,
            creation_ts: ts,
            deletion_ts: Timestamp::MAX,
            supersedes: EdgeRef::Nil,
            weight: 0,
        }
    }

    /// `add_edge(src, dst) -> edge_t`: append a new overlay edge and link it
    /// into both endpoints' append-vectors, locking the endpoints in
    /// ascending node-id order and locking once for a self-loop (§4.2).
    pub fn add_edge(&self, src: NodeId, dst: NodeId, ts: Timestamp) -> EdgeRef {
        let src_arc = self.get_or_create(src, ts);
        let dst_arc = if dst == src {
            Arc::clone(&src_arc)
        } else {
            self.get_or_create(dst, ts)
        };

        let index = if src == dst {
            let mut g = src_arc.lock();
            crate::invariant!(!g.is_tombstoned(), "add-edge-on-tombstoned-node");
            let index = self.push_edge(Self::new_edge_record(src, dst, ts));
            self.edges.read()[index as usize].lock().numerical_id = index;
            g.out_edges.push(index);
            g.in_edges.push(index);
            g.state = OverlayNodeState::Present;
            index
        } else {
            let (mut gs, mut gd) = if src.0 < dst.0 {
                let gs = src_arc.lock();
                let gd = dst_arc.lock();
                (gs, gd)
            } else {
                let gd = dst_arc.lock();
                let gs = src_arc.lock();
                (gs, gd)
            };
            crate::invariant!(
                !gs.is_tombstoned() && !gd.is_tombstoned(),
                "add-edge-on-tombstoned-node"
            );
            let index = self.push_edge(Self::new_edge_record(src, dst, ts));
            self.edges.read()[index as usize].lock().numerical_id = index;
            gs.out_edges.push(index);
            gs.state = OverlayNodeState::Present;
            gd.in_edges.push(index);
            gd.state = OverlayNodeState::Present;
            index
        };

        EdgeRef::Overlay { index }
    }

    /// Returns the first live overlay edge `(src, dst)`, if any, walking
    /// `src`'s out-edges in insertion order — the "at most one existing
    /// edge" precondition from §4.2's `add_edge_if_not_exists` is the
    /// caller's responsibility; this simply returns the first match.
    #[must_use]
    pub fn find_live_edge(&self, src: NodeId, dst: NodeId, ts_ceiling: Timestamp) -> Option<EdgeRef> {
        let node = self.node(src)?;
        let guard = node.lock();
        let edges = self.edges.read();
        for &idx in &guard.out_edges {
            let e = edges[idx as usize].lock();
            if e.target == dst && e.is_visible(ts_ceiling) {
                return Some(EdgeRef::Overlay { index: idx });
            }
        }
        None
    }

    #[must_use]
    pub fn edge(&self, index: u32) -> OverlayEdge {
        self.edges.read()[index as usize].lock().clone()
    }

    pub fn set_weight(&self, index: u32, weight: i64) {
        self.edges.read()[index as usize].lock().weight = weight;
    }

    pub fn set_supersedes(&self, index: u32, supersedes: EdgeRef) {
        self.edges.read()[index as usize].lock().supersedes = supersedes;
    }

    /// `delete_edge(src, edge)` for an overlay-tagged edge: marks the
    /// overlay record deleted and updates both endpoints' deleted counters.
    /// A no-op if the edge is already deleted (§4.2 failure semantics).
    pub fn delete_overlay_edge(&self, edge: EdgeRef, ts: Timestamp) {
        let EdgeRef::Overlay { index } = edge else {
            crate::invariant!(false, "delete-overlay-edge-on-non-overlay-ref");
            return;
        };
        let (source, target, already_deleted) = {
            let edges = self.edges.read();
            let mut e = edges[index as usize].lock();
            let already = e.deleted;
            if !already {
                e.deleted = true;
                e.deletion_ts = ts;
            }
            (e.source, e.target, already)
        };
        if already_deleted {
            return;
        }
        if let Some(src_node) = self.node(source) {
            src_node.lock().deleted_out_count += 1;
        }
        if let Some(dst_node) = self.node(target) {
            dst_node.lock().deleted_in_count += 1;
        }
    }

    /// `delete_node(n)`: tombstones `n` and marks every overlay edge
    /// incident to it deleted (§4.2). Frozen edges incident to `n` are the
    /// caller's responsibility (the deletion tracker, via `Graph`) since the
    /// overlay has no visibility into frozen levels.
    pub fn delete_node(&self, n: NodeId, ts: Timestamp) {
        let Some(node_arc) = self.node(n) else {
            return;
        };
        let (out_idx, in_idx) = {
            let mut guard = node_arc.lock();
            if guard.is_tombstoned() {
                return;
            }
            guard.state = OverlayNodeState::Tombstoned;
            guard.deletion_ts = ts;
            let out_idx = guard.out_edges.clone();
            let in_idx = guard.in_edges.clone();
            guard.deleted_out_count = out_idx.len() as u32;
            guard.deleted_in_count = in_idx.len() as u32;
            (out_idx, in_idx)
        };

        for idx in out_idx {
            let target = {
                let edges = self.edges.read();
                let mut e = edges[idx as usize].lock();
                if e.deleted {
                    None
                } else {
                    e.deleted = true;
                    e.deletion_ts = ts;
                    Some(e.target)
                }
            };
            if let Some(target) = target {
                if let Some(t) = self.node(target) {
                    t.lock().deleted_in_count += 1;
                }
            }
        }
        for idx in in_idx {
            let source = {
                let edges = self.edges.read();
                let mut e = edges[idx as usize].lock();
                if e.deleted {
                    None
                } else {
                    e.deleted = true;
                    e.deletion_ts = ts;
                    Some(e.source)
                }
            };
            if let Some(source) = source {
                if let Some(s) = self.node(source) {
                    s.lock().deleted_out_count += 1;
                }
            }
        }
    }

    /// Drains every node and edge record, returning them for the checkpoint
    /// engine to fold into a new level (§4.3 step 8 "retire overlay"). After
    /// this call the overlay is empty and its watermark becomes
    /// `new_watermark`.
    pub fn drain(&self, new_watermark: NodeRaw) -> (FxHashMap<NodeId, OverlayNode>, Vec<OverlayEdge>) {
        let mut nodes_map = self.nodes.write();
        let mut edges_vec = self.edges.write();

        let nodes = std::mem::take(&mut *nodes_map)
            .into_iter()
            .map(|(id, arc)| {
                let node = match Arc::try_unwrap(arc) {
                    Ok(mutex) => mutex.into_inner(),
                    // Another handle is still live (e.g. a concurrent reader
                    // holding a clone); copy the current state instead of
                    // panicking mid-checkpoint.
                    Err(arc) => arc.lock().clone(),
                };
                (id, node)
            })
            .collect();

        let edges = std::mem::take(&mut *edges_vec)
            .into_iter()
            .map(Mutex::into_inner)
            .collect();

        self.next_new_node_id
            .fetch_max(new_watermark as u64, Ordering::AcqRel);
        (nodes, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_links_both_endpoints() {
        let overlay = WritableOverlay::new(2);
        let ts = overlay.tx_begin();
        let a = NodeId(0);
        let b = NodeId(1);
        let edge = overlay.add_edge(a, b, ts);
        assert!(matches!(edge, EdgeRef::Overlay { index: 0 }));
        assert_eq!(overlay.node(a).unwrap().lock().out_edges, vec![0]);
        assert_eq!(overlay.node(b).unwrap().lock().in_edges, vec![0]);
        overlay.tx_commit();
    }

    #[test]
    fn add_edge_self_loop_links_once_each_side() {
        let overlay = WritableOverlay::new(1);
        let ts = overlay.tx_begin();
        let a = NodeId(0);
        overlay.add_edge(a, a, ts);
        let guard = overlay.node(a).unwrap();
        let g = guard.lock();
        assert_eq!(g.out_edges, vec![0]);
        assert_eq!(g.in_edges, vec![0]);
    }

    #[test]
    fn delete_node_tombstones_and_marks_incident_edges_deleted() {
        let overlay = WritableOverlay::new(3);
        let ts = overlay.tx_begin();
        let a = NodeId(0);
        let b = NodeId(1);
        let c = NodeId(2);
        overlay.add_edge(a, b, ts);
        overlay.add_edge(c, a, ts);

        overlay.delete_node(a, Timestamp(ts.0 + 1));

        assert!(overlay.node(a).unwrap().lock().is_tombstoned());
        assert_eq!(overlay.node(b).unwrap().lock().deleted_in_count, 1);
        assert_eq!(overlay.node(c).unwrap().lock().deleted_out_count, 1);
        assert!(overlay.edge(0).deleted);
        assert!(overlay.edge(1).deleted);
    }

    #[test]
    fn delete_overlay_edge_is_idempotent() {
        let overlay = WritableOverlay::new(2);
        let ts = overlay.tx_begin();
        let a = NodeId(0);
        let b = NodeId(1);
        let edge = overlay.add_edge(a, b, ts);
        overlay.delete_overlay_edge(edge, Timestamp(ts.0 + 1));
        overlay.delete_overlay_edge(edge, Timestamp(ts.0 + 2));
        assert_eq!(overlay.node(b).unwrap().lock().deleted_in_count, 1);
    }

    #[test]
    fn drain_resets_overlay_and_advances_watermark() {
        let overlay = WritableOverlay::new(2);
        let ts = overlay.tx_begin();
        overlay.add_edge(NodeId(0), NodeId(1), ts);
        let (nodes, edges) = overlay.drain(5);
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(overlay.max_node_watermark(), 5);
        assert!(overlay.node(NodeId(0)).is_none());
    }
}
