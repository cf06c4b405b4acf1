// SPDX-License-Identifier: Apache-2.0
//! The compressed-sparse-row layout for a single immutable level (§3
//! "Level", §4.1).

use crate::ident::{LevelId, NodeId, NodeRaw};
use bytemuck::{Pod, Zeroable};

/// A sentinel meaning "this vertex entry does not delegate to an earlier
/// level" (§4.1 "Continuations").
const NO_CONTINUATION: u32 = u32::MAX;

/// Fixed-stride vertex-table record (§3): `{ adjacency_start, length,
/// max_visible_level }`, plus an optional continuation pointer (§4.1).
///
/// `#[derive(Pod, Zeroable)]` makes this record mmap-safe for the persisted
/// layout in §6 ("memory-mappable and little-endian with a small header").
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct VertexEntry {
    /// Index into the owning edge table (this level's, unless
    /// `continuation_level` is set) where this node's adjacency begins.
    pub adjacency_start: u32,
    /// Number of edges in this node's adjacency slice.
    pub length: u32,
    /// Highest level at which this node's full (undeleted) adjacency is
    /// still faithfully represented; lowered by the deletion tracker when an
    /// incident frozen edge is marked deleted (§4.4).
    pub max_visible_level: u32,
    /// If not `NO_CONTINUATION`, this node's adjacency slice physically
    /// lives in that earlier level's edge table instead of this level's
    /// (§4.1). Only populated when the `continuations` feature is enabled.
    continuation_level: u32,
}

impl VertexEntry {
    const EMPTY: Self = Self {
        adjacency_start: 0,
        length: 0,
        max_visible_level: 0,
        continuation_level: NO_CONTINUATION,
    };

    #[must_use]
    pub const fn continuation(&self) -> Option<LevelId> {
        if self.continuation_level == NO_CONTINUATION {
            None
        } else {
            Some(LevelId(self.continuation_level))
        }
    }

    pub(crate) fn set_continuation(&mut self, level: Option<LevelId>) {
        self.continuation_level = level.map_or(NO_CONTINUATION, |l| l.0);
    }
}

/// One direction's (out or in) CSR for a level: a vertex table plus a packed
/// edge table of neighbor node ids, grouped by owning node (§3 "edge
/// table").
#[derive(Clone, Debug)]
pub struct Csr {
    vertices: Vec<VertexEntry>,
    /// Packed neighbor ids, grouped by owning node in the order they were
    /// emitted at checkpoint time (tail order for `out`, head order for
    /// `in`); optionally sorted within each group (§4.5 "sorted-within-level
    /// variant").
    targets: Vec<NodeRaw>,
    sorted_within_group: bool,
}

impl Csr {
    /// `init_level_from_degrees`: allocate a vertex table sized to
    /// `max_nodes` and an edge table sized to `sum(degrees)`, with each
    /// node's `adjacency_start` set via prefix sum. The caller then streams
    /// head ids into the returned edge table in tail order via
    /// [`Csr::fill_slice`].
    #[must_use]
    pub fn init_level_from_degrees(degrees: &[u32], level: LevelId) -> Self {
        let max_nodes = degrees.len();
        let mut vertices = vec![VertexEntry::EMPTY; max_nodes];
        let mut offset: u32 = 0;
        for (i, &deg) in degrees.iter().enumerate() {
            vertices[i] = VertexEntry {
                adjacency_start: offset,
                length: deg,
                max_visible_level: level.0,
                continuation_level: NO_CONTINUATION,
            };
            offset = offset
                .checked_add(deg)
                .unwrap_or_else(|| panic!("edge table offset overflow at node {i}"));
        }
        Self {
            vertices,
            targets: vec![NodeRaw::default(); offset as usize],
            sorted_within_group: false,
        }
    }

    /// Writes `heads` into this node's adjacency slice. `heads.len()` must
    /// equal the degree passed to `init_level_from_degrees` for this node.
    pub fn fill_slice(&mut self, node: NodeId, heads: &[NodeRaw]) {
        let entry = self.vertices[node.as_usize()];
        crate::invariant!(
            entry.continuation().is_none(),
            "fill-slice-on-continuation-entry"
        );
        let start = entry.adjacency_start as usize;
        let len = entry.length as usize;
        crate::invariant!(heads.len() == len, "fill-slice-length-mismatch");
        self.targets[start..start + len].copy_from_slice(heads);
    }

    pub fn mark_sorted_within_group(&mut self) {
        self.sorted_within_group = true;
    }

    #[must_use]
    pub const fn is_sorted_within_group(&self) -> bool {
        self.sorted_within_group
    }

    #[must_use]
    pub fn max_nodes(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn max_edges(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn vertex(&self, node: NodeId) -> Option<&VertexEntry> {
        self.vertices.get(node.as_usize())
    }

    pub(crate) fn vertex_mut(&mut self, node: NodeId) -> Option<&mut VertexEntry> {
        self.vertices.get_mut(node.as_usize())
    }

    /// This level's own slice for `node` (does not follow a continuation —
    /// callers that need to resolve continuations walk the level stack).
    #[must_use]
    pub fn own_slice(&self, node: NodeId) -> &[NodeRaw] {
        let Some(entry) = self.vertices.get(node.as_usize()) else {
            return &[];
        };
        let start = entry.adjacency_start as usize;
        let end = start + entry.length as usize;
        &self.targets[start..end]
    }

    /// Locates the first occurrence of `target` in `node`'s own slice, in
    /// insertion order, returning its index within the edge table.
    #[must_use]
    pub fn find_in_own_slice(&self, node: NodeId, target: NodeId) -> Option<u32> {
        let Some(entry) = self.vertices.get(node.as_usize()) else {
            return None;
        };
        let start = entry.adjacency_start as usize;
        let len = entry.length as usize;
        self.targets[start..start + len]
            .iter()
            .position(|&h| h == target.0)
            .map(|i| (start + i) as u32)
    }

    #[must_use]
    pub fn target_at(&self, index: u32) -> NodeRaw {
        self.targets[index as usize]
    }

    /// Exposes the raw vertex table for the `persistence` feature's
    /// POD table writer.
    #[cfg(feature = "persistence")]
    #[must_use]
    pub(crate) fn vertices_for_persistence(&self) -> &[VertexEntry] {
        &self.vertices
    }

    /// Exposes the raw edge table for the `persistence` feature's POD table
    /// writer.
    #[cfg(feature = "persistence")]
    #[must_use]
    pub(crate) fn targets_for_persistence(&self) -> &[NodeRaw] {
        &self.targets
    }

    /// Rebuilds a `Csr` from table contents read back off disk. `level` is
    /// only used to validate continuation pointers make sense relative to
    /// the level this CSR is being restored into, via the same invariant
    /// `init_level_from_degrees` upholds at construction time.
    #[cfg(feature = "persistence")]
    #[must_use]
    pub(crate) fn from_parts(vertices: Vec<VertexEntry>, targets: Vec<NodeRaw>, level: LevelId) -> Self {
        let _ = level;
        Self {
            vertices,
            targets,
            sorted_within_group: false,
        }
    }

    /// Appends a freshly built extension to `self`'s vertex table so later
    /// levels can widen `max_nodes` without reallocating earlier levels
    /// (used by the checkpoint engine when `overlay_max_node + 1` exceeds
    /// the previous level's `max_nodes`, §4.3 step 2). Only ever grows the
    /// level currently under construction, never a published one.
    pub(crate) fn extend_vertices(&mut self, additional: usize) {
        self.vertices
            .resize(self.vertices.len() + additional, VertexEntry::EMPTY);
    }
}
