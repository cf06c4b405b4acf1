// SPDX-License-Identifier: Apache-2.0
//! The top-level façade wiring the level stack, writable overlay, deletion
//! tracker, and property registry into one graph instance (§2, §9
//! "graph-instance-scoped counters via fields on `Graph` rather than
//! statics").

use crate::config::{Direction, LoaderConfig};
use crate::deletion_tracker::DeletionTracker;
use crate::ident::{EdgeRef, LevelId, NodeId, NodeRaw, Timestamp, Visibility};
use crate::iter::AdjacencyIter;
use crate::level::{Csr, LevelStack};
use crate::overlay::WritableOverlay;
use crate::property::{ColumnKind, Entity, PropertyRegistry, PropertyType, PropertyValue};
use std::sync::atomic::{AtomicU32, Ordering};

/// A single graph instance: one level stack, one writable overlay, one
/// deletion tracker, one property registry. Every counter a C-style port of
/// this system would keep as a global lives here instead (§9).
pub struct Graph {
    levels: LevelStack,
    overlay: WritableOverlay,
    deletions: DeletionTracker,
    properties: PropertyRegistry,
    min_level: AtomicU32,
    reverse_edges: bool,
}

impl Graph {
    #[must_use]
    pub fn new(config: &LoaderConfig) -> Self {
        let properties = PropertyRegistry::new();
        properties
            .create(ColumnKind::Edge, "weight", PropertyType::Int64)
            .expect("fresh property registry cannot already contain \"weight\"");
        Self {
            levels: LevelStack::new(),
            overlay: WritableOverlay::new(0),
            deletions: DeletionTracker::new(),
            properties,
            min_level: AtomicU32::new(0),
            reverse_edges: config.reverse_edges,
        }
    }

    #[must_use]
    pub fn overlay(&self) -> &WritableOverlay {
        &self.overlay
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    #[must_use]
    pub fn deletions(&self) -> &DeletionTracker {
        &self.deletions
    }

    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.snapshot().num_levels()
    }

    /// One past the largest node id known to either the frozen stack or the
    /// overlay.
    #[must_use]
    pub fn max_nodes(&self) -> NodeRaw {
        self.levels.snapshot().max_nodes().max(self.overlay.max_node_watermark())
    }

    /// A visibility window spanning every level this graph currently
    /// retains and every commit so far — the default a reader gets unless it
    /// asks for something narrower.
    #[must_use]
    pub fn current_visibility(&self) -> Visibility {
        let max_level = self.levels.snapshot().newest_level_id().unwrap_or(LevelId(0));
        Visibility {
            min_level: LevelId(self.min_level.load(Ordering::Acquire)),
            max_level,
            timestamp: Timestamp::MAX,
        }
    }

    /// Raises the lowest level future readers' default visibility windows
    /// admit. Does not retire any level's storage; pair with
    /// [`Graph::delete_level`] to actually reclaim it once no reader can
    /// still need it.
    pub fn set_min_level(&self, level: LevelId) {
        self.min_level.fetch_max(level.0, Ordering::AcqRel);
    }

    pub fn add_node(&self, ts: Timestamp) -> NodeId {
        self.overlay.add_node(ts)
    }

    /// `add_edge_if_not_exists(src, dst)`: returns the existing live edge if
    /// one is already visible at `ts`, otherwise inserts and returns the new
    /// one. Only consults the overlay and the newest frozen level's direct
    /// slice (via [`crate::level::LevelStackSnapshot::find_out`]) — matching
    /// §4.1's "newest level first, first match within a level" lookup order
    /// (§9 open question: duplicate frozen-level matches older than the
    /// newest are not de-duplicated against, since frozen levels never gain
    /// new edges after the fact).
    pub fn add_edge_if_not_exists(&self, src: NodeId, dst: NodeId, ts: Timestamp) -> EdgeRef {
        if let Some(existing) = self.overlay.find_live_edge(src, dst, ts) {
            return existing;
        }
        if let Some((level, index)) = self.levels.snapshot().find_out(src, dst) {
            let edge = EdgeRef::Frozen { level, index };
            if !self.deletions.is_deleted_out(edge, ts) {
                return edge;
            }
        }
        self.overlay.add_edge(src, dst, ts)
    }

    pub fn add_edge(&self, src: NodeId, dst: NodeId, ts: Timestamp) -> EdgeRef {
        self.overlay.add_edge(src, dst, ts)
    }

    /// `add_edge_for_streaming_with_weights(src, dst)` (§4.2): the weighted
    /// streaming-dedup path (§8 S4). A live overlay edge `(src, dst)` has its
    /// weight bumped in place; a live frozen edge `(src, dst)` is superseded
    /// by a new overlay edge carrying `frozen_weight + 1` and the frozen
    /// edge is logically deleted via the deletion tracker (both the out- and,
    /// when reverse edges are enabled, the in-side record); otherwise a new
    /// edge of weight 1 is created.
    pub fn add_edge_for_streaming_with_weights(&self, src: NodeId, dst: NodeId, ts: Timestamp) -> EdgeRef {
        if let Some(existing) = self.overlay.find_live_edge(src, dst, ts) {
            let EdgeRef::Overlay { index } = existing else {
                crate::invariant!(false, "find-live-edge-must-return-overlay-ref");
                return existing;
            };
            let bumped = self.overlay.edge(index).weight + 1;
            self.overlay.set_weight(index, bumped);
            return existing;
        }

        let snapshot = self.levels.snapshot();
        if let Some((level, out_idx)) = snapshot.find_out(src, dst) {
            let frozen = EdgeRef::Frozen { level, index: out_idx };
            if !self.deletions.is_deleted_out(frozen, ts) {
                let frozen_weight = self.edge_weight(frozen);
                let new_edge = self.overlay.add_edge(src, dst, ts);
                let EdgeRef::Overlay { index } = new_edge else {
                    crate::invariant!(false, "add-edge-must-return-overlay-ref");
                    return new_edge;
                };
                self.overlay.set_weight(index, frozen_weight + 1);
                self.overlay.set_supersedes(index, frozen);

                self.deletions.mark_deleted_out(src, level, out_idx, ts);
                if self.reverse_edges {
                    let in_idx = snapshot
                        .level(level)
                        .and_then(|l| l.out_to_in.as_ref())
                        .and_then(|map| map.get(out_idx as usize).copied())
                        .filter(|&i| i != u32::MAX);
                    if let Some(in_idx) = in_idx {
                        self.deletions.mark_deleted_in(dst, level, in_idx, ts);
                    }
                }
                return new_edge;
            }
        }

        let new_edge = self.overlay.add_edge(src, dst, ts);
        let EdgeRef::Overlay { index } = new_edge else {
            crate::invariant!(false, "add-edge-must-return-overlay-ref");
            return new_edge;
        };
        self.overlay.set_weight(index, 1);
        new_edge
    }

    /// Reads `edge`'s weight as set by [`Graph::add_edge_for_streaming_with_weights`]:
    /// inline on the overlay record while resident there, promoted to the
    /// "weight" edge property column once frozen. `0` for an edge never
    /// touched by the streaming-dedup path or for `EdgeRef::Nil`.
    #[must_use]
    pub fn edge_weight(&self, edge: EdgeRef) -> i64 {
        match edge {
            EdgeRef::Overlay { index } => self.overlay.edge(index).weight,
            EdgeRef::Frozen { .. } => self
                .properties
                .get(ColumnKind::Edge, "weight")
                .and_then(|col| col.get(Entity::Edge(edge)))
                .map_or(0, |v| match v {
                    PropertyValue::Int64(w) => w,
                    _ => 0,
                }),
            EdgeRef::Nil => 0,
        }
    }

    /// Tombstones `n` in the overlay and marks every frozen edge still
    /// incident to it (in either direction, across every visible level) as
    /// deleted in the tracker, so `out_degree`/`in_degree` and iteration both
    /// stop reporting them without mutating any frozen CSR.
    pub fn delete_node(&self, n: NodeId, ts: Timestamp) {
        self.overlay.delete_node(n, ts);
        let snapshot = self.levels.snapshot();
        let vis = self.current_visibility();
        for level in snapshot.newest_to_oldest() {
            if !vis.admits_level(level.id) {
                continue;
            }
            if let Some((owner, _)) = snapshot.resolve_out_slice(level.id, n) {
                if let Some(entry) = snapshot.level(owner).and_then(|l| l.out.vertex(n)) {
                    for idx in entry.adjacency_start..entry.adjacency_start + entry.length {
                        self.deletions.mark_deleted_out(n, owner, idx, ts);
                    }
                }
            }
            if self.reverse_edges {
                if let Some((owner, _)) = snapshot.resolve_in_slice(level.id, n) {
                    let entry = snapshot
                        .level(owner)
                        .and_then(|l| l.inbound.as_ref())
                        .and_then(|csr| csr.vertex(n));
                    if let Some(entry) = entry {
                        for idx in entry.adjacency_start..entry.adjacency_start + entry.length {
                            self.deletions.mark_deleted_in(n, owner, idx, ts);
                        }
                    }
                }
            }
        }
    }

    /// Deletes a single frozen out-edge owned by `owner`, or an overlay edge
    /// (owner is ignored for the overlay case — the record already knows its
    /// own endpoints).
    pub fn delete_out_edge(&self, owner: NodeId, edge: EdgeRef, ts: Timestamp) {
        match edge {
            EdgeRef::Overlay { .. } => self.overlay.delete_overlay_edge(edge, ts),
            EdgeRef::Frozen { level, index } => self.deletions.mark_deleted_out(owner, level, index, ts),
            EdgeRef::Nil => {}
        }
    }

    pub fn delete_in_edge(&self, owner: NodeId, edge: EdgeRef, ts: Timestamp) {
        match edge {
            EdgeRef::Overlay { .. } => self.overlay.delete_overlay_edge(edge, ts),
            EdgeRef::Frozen { level, index } => self.deletions.mark_deleted_in(owner, level, index, ts),
            EdgeRef::Nil => {}
        }
    }

    #[must_use]
    pub fn iter_out(&self, node: NodeId, visibility: Visibility) -> AdjacencyIter<'_> {
        AdjacencyIter::new(&self.overlay, self.levels.snapshot(), &self.deletions, node, visibility, true)
    }

    #[must_use]
    pub fn iter_in(&self, node: NodeId, visibility: Visibility) -> AdjacencyIter<'_> {
        AdjacencyIter::new(&self.overlay, self.levels.snapshot(), &self.deletions, node, visibility, false)
    }

    #[must_use]
    pub fn out_degree(&self, node: NodeId, visibility: Visibility) -> usize {
        self.iter_out(node, visibility).count()
    }

    #[must_use]
    pub fn in_degree(&self, node: NodeId, visibility: Visibility) -> usize {
        self.iter_in(node, visibility).count()
    }

    /// `find(u, v)`: the overlay's live edges take priority over frozen
    /// ones, matching iteration order (§4.1).
    #[must_use]
    pub fn find(&self, u: NodeId, v: NodeId, ts_ceiling: Timestamp) -> Option<EdgeRef> {
        if let Some(edge) = self.overlay.find_live_edge(u, v, ts_ceiling) {
            return Some(edge);
        }
        let snapshot = self.levels.snapshot();
        let (level, index) = snapshot.find_out(u, v)?;
        let edge = EdgeRef::Frozen { level, index };
        if self.deletions.is_deleted_out(edge, ts_ceiling) {
            None
        } else {
            Some(edge)
        }
    }

    /// Folds the overlay and every visible frozen level into a new level
    /// (§4.3).
    pub fn checkpoint(&self) -> LevelId {
        crate::checkpoint::run(&self.levels, &self.overlay, &self.properties, self.reverse_edges)
    }

    /// `delete_level(k)`: retires level `k` and its deletion-tracker and
    /// property-extent bookkeeping. The caller is responsible for ensuring
    /// no outstanding [`Visibility`] window still names `k` (§3 Lifecycle).
    pub fn delete_level(&self, id: LevelId) {
        self.levels.remove(id);
        self.deletions.drop_level(id);
        for name in self.properties.node_names() {
            if let Some(col) = self.properties.get(crate::property::ColumnKind::Node, &name) {
                col.drop_extent(id);
            }
        }
        for name in self.properties.edge_names() {
            if let Some(col) = self.properties.get(crate::property::ColumnKind::Edge, &name) {
                col.drop_extent(id);
            }
        }
    }

    /// Loads `source` directly into the overlay, honoring `config`'s
    /// `max_edges` cap (§6, the incremental-ingest path).
    ///
    /// # Errors
    /// Returns [`crate::error::GraphError::UnsupportedConfig`] if `config`
    /// fails [`LoaderConfig::validate`].
    pub fn load(
        &self,
        source: &mut dyn crate::datasource::PullSource,
        config: &LoaderConfig,
        ts: Timestamp,
    ) -> Result<(), crate::error::GraphError> {
        config.validate()?;
        let cap = config.max_edges.unwrap_or(usize::MAX);
        source.pull(&self.overlay, ts, cap);
        Ok(())
    }

    /// `direct_load`: builds a level straight from an edge list without ever
    /// touching the overlay, the "already-sorted bulk ingest" path in §2.
    /// `edges` need not be pre-sorted: `config.direction` is materialized
    /// (`UndirectedDouble` emits both `(a,b)` and `(b,a)`; `UndirectedOrdered`
    /// reorders each pair so the smaller id is the tail) and the result is
    /// sorted by `(tail, head)` before allocation, then `config.deduplicate`
    /// collapses exact repeats (§6 "enumerated options", §8 S3).
    ///
    /// # Errors
    /// Returns [`crate::error::GraphError::UnsupportedConfig`] if `config`
    /// fails [`LoaderConfig::validate`].
    pub fn direct_load(
        &self,
        max_nodes: usize,
        edges: &[(NodeId, NodeId)],
        config: &LoaderConfig,
    ) -> Result<LevelId, crate::error::GraphError> {
        config.validate()?;
        let mut materialized: Vec<(NodeId, NodeId)> = match config.direction {
            Direction::Directed => edges.to_vec(),
            Direction::UndirectedDouble => edges.iter().flat_map(|&(a, b)| [(a, b), (b, a)]).collect(),
            Direction::UndirectedOrdered => edges
                .iter()
                .map(|&(a, b)| if a.0 <= b.0 { (a, b) } else { (b, a) })
                .collect(),
        };
        materialized.sort_by_key(|&(tail, head)| (tail.0, head.0));
        if config.deduplicate {
            materialized.dedup();
        }
        let edges = &materialized;

        let mut degrees = vec![0u32; max_nodes];
        for &(tail, _) in edges {
            degrees[tail.as_usize()] += 1;
        }
        let level_id = self
            .levels
            .snapshot()
            .newest_level_id()
            .map_or(LevelId(0), LevelId::next);
        let mut csr = Csr::init_level_from_degrees(&degrees, level_id);

        let mut cursor = 0usize;
        let mut heads = Vec::new();
        for node_raw in 0..max_nodes {
            let node = NodeId(node_raw as NodeRaw);
            heads.clear();
            while cursor < edges.len() && edges[cursor].0 == node {
                heads.push(edges[cursor].1 .0);
                cursor += 1;
            }
            csr.fill_slice(node, &heads);
        }

        self.levels.publish(crate::level::Level {
            id: level_id,
            out: csr,
            inbound: None,
            out_to_in: None,
            in_to_out: None,
        });
        Ok(level_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::VecSource;

    #[test]
    fn checkpoint_folds_overlay_into_a_queryable_level() {
        let graph = Graph::new(&LoaderConfig::default());
        let ts = graph.overlay().tx_begin();
        graph.add_edge(NodeId(0), NodeId(1), ts);
        graph.add_edge(NodeId(1), NodeId(2), ts);
        graph.overlay().tx_commit();

        let level = graph.checkpoint();
        assert_eq!(level, LevelId(0));
        assert_eq!(graph.num_levels(), 1);

        let vis = graph.current_visibility();
        assert_eq!(graph.out_degree(NodeId(0), vis), 1);
        assert!(graph.find(NodeId(0), NodeId(1), Timestamp::MAX).is_some());
    }

    #[test]
    fn delete_node_removes_it_from_both_overlay_and_frozen_adjacency() {
        let graph = Graph::new(&LoaderConfig::default());
        let ts = graph.overlay().tx_begin();
        graph.add_edge(NodeId(0), NodeId(1), ts);
        graph.overlay().tx_commit();
        graph.checkpoint();

        let ts2 = graph.overlay().tx_begin();
        graph.delete_node(NodeId(1), ts2);
        graph.overlay().tx_commit();

        let vis = graph.current_visibility();
        assert_eq!(graph.out_degree(NodeId(0), vis), 0);
    }

    #[test]
    fn direct_load_builds_a_queryable_level_from_sorted_edges() {
        let graph = Graph::new(&LoaderConfig::default());
        let level = graph
            .direct_load(
                3,
                &[(NodeId(0), NodeId(1)), (NodeId(0), NodeId(2))],
                &LoaderConfig::default(),
            )
            .expect("default config always validates");
        assert_eq!(level, LevelId(0));
        let vis = graph.current_visibility();
        assert_eq!(graph.out_degree(NodeId(0), vis), 2);
    }

    #[test]
    fn load_pulls_a_source_into_the_overlay() {
        let graph = Graph::new(&LoaderConfig::default());
        let mut source = VecSource::new(vec![(NodeId(0), NodeId(1))]);
        let ts = graph.overlay().tx_begin();
        graph.load(&mut source, &LoaderConfig::default(), ts).unwrap();
        graph.overlay().tx_commit();
        assert_eq!(graph.out_degree(NodeId(0), graph.current_visibility()), 1);
    }
}
