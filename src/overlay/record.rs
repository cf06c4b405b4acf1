// SPDX-License-Identifier: Apache-2.0
//! Per-node and per-edge records held by the writable overlay (§3).

use crate::ident::{EdgeRef, NodeId, Timestamp};

/// Lifecycle state of a node's overlay record (§4.2 state machine).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OverlayNodeState {
    /// `add_node` has run but no edge has touched this node yet.
    PresentNoEdges,
    /// At least one edge has been added (or removed) for this node.
    Present,
    /// `delete_node` has run; the record is retained so iteration can still
    /// observe the deletion rather than silently vanishing.
    Tombstoned,
}

/// A node's mutable overlay state, guarded by a per-node lock (§4.2
/// "Concurrency: each node record owns a spinlock").
///
/// `out_edges`/`in_edges` hold indices into [`crate::overlay::WritableOverlay`]'s
/// global edge arena rather than full records — the arena-of-records design
/// from §9's "cyclic ownership" note, generalized from per-node arenas to one
/// overlay-wide arena so an `EdgeRef::Overlay { index }` is a single dense
/// integer regardless of which node owns it.
#[derive(Clone)]
pub struct OverlayNode {
    pub state: OverlayNodeState,
    pub out_edges: Vec<u32>,
    pub in_edges: Vec<u32>,
    pub deleted_out_count: u32,
    pub deleted_in_count: u32,
    pub creation_ts: Timestamp,
    pub deletion_ts: Timestamp,
}

impl OverlayNode {
    pub(crate) fn new(creation_ts: Timestamp) -> Self {
        Self {
            state: OverlayNodeState::PresentNoEdges,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            deleted_out_count: 0,
            deleted_in_count: 0,
            creation_ts,
            deletion_ts: Timestamp::MAX,
        }
    }

    #[must_use]
    pub const fn is_tombstoned(&self) -> bool {
        matches!(self.state, OverlayNodeState::Tombstoned)
    }

    /// Live (non-deleted) out-degree contributed by this node's overlay
    /// edges — the `Δ` used by the checkpoint engine's degree pass (§4.3
    /// step 2).
    #[must_use]
    pub fn live_out_degree(&self) -> u32 {
        (self.out_edges.len() as u32).saturating_sub(self.deleted_out_count)
    }

    #[must_use]
    pub fn live_in_degree(&self) -> u32 {
        (self.in_edges.len() as u32).saturating_sub(self.deleted_in_count)
    }
}

/// One directed edge record living in the overlay's global arena (§3
/// "overlay edge record").
#[derive(Clone, Debug)]
pub struct OverlayEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub deleted: bool,
    /// The overlay-local dense index of this edge (its own arena slot,
    /// mirrored here for convenience when only a `&OverlayEdge` is at hand).
    pub numerical_id: u32,
    pub creation_ts: Timestamp,
    pub deletion_ts: Timestamp,
    /// If this edge was created by `add_edge_for_streaming_with_weights` as
    /// a dedup-and-bump against an existing frozen edge, the frozen edge it
    /// supersedes (and logically deletes). `EdgeRef::Nil` otherwise.
    pub supersedes: EdgeRef,
    /// Scalar weight column inlined on the overlay edge record so the
    /// streaming-dedup path (§4.2 `add_edge_for_streaming_with_weights`) can
    /// bump it without a separate property-column round trip.
    pub weight: i64,
}

impl OverlayEdge {
    #[must_use]
    pub const fn is_visible(&self, ts_ceiling: Timestamp) -> bool {
        !self.deleted && self.creation_ts.0 <= ts_ceiling.0
    }
}
