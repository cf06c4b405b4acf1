// SPDX-License-Identifier: Apache-2.0
//! Unified forward/reverse edge iteration (§4.5).
//!
//! Iteration order is overlay-first (most recently added edge first, since
//! this walks the overlay's append vector in reverse), then frozen levels
//! newest-to-oldest, each resolved through any continuation chain. Deleted
//! edges — overlay-tombstoned or tracked in the [`DeletionTracker`] — are
//! skipped transparently; there is no cancellation token (§4.5 "no early
//! termination hook": callers that want to stop early just stop calling
//! `next`).

use crate::deletion_tracker::DeletionTracker;
use crate::ident::{EdgeRef, LevelId, NodeId, Visibility};
use crate::level::LevelStackSnapshot;
use crate::overlay::WritableOverlay;

enum Stage {
    Overlay,
    Frozen,
    Done,
}

/// Walks one node's adjacency (out or in) across the overlay and every
/// visible frozen level, newest data first.
pub struct AdjacencyIter<'a> {
    overlay: &'a WritableOverlay,
    levels: LevelStackSnapshot,
    deletions: &'a DeletionTracker,
    node: NodeId,
    visibility: Visibility,
    out_direction: bool,
    stage: Stage,
    overlay_indices: std::vec::IntoIter<u32>,
    remaining_levels: std::vec::IntoIter<LevelId>,
    /// `(owning level, next edge-table index, end index)` for the slice
    /// currently being walked.
    frozen_cursor: Option<(LevelId, u32, u32)>,
}

impl<'a> AdjacencyIter<'a> {
    pub(crate) fn new(
        overlay: &'a WritableOverlay,
        levels: LevelStackSnapshot,
        deletions: &'a DeletionTracker,
        node: NodeId,
        visibility: Visibility,
        out_direction: bool,
    ) -> Self {
        let overlay_indices = overlay
            .node(node)
            .map(|arc| {
                let guard = arc.lock();
                let mut indices = if out_direction {
                    guard.out_edges.clone()
                } else {
                    guard.in_edges.clone()
                };
                indices.reverse();
                indices
            })
            .unwrap_or_default();
        let remaining_levels: Vec<LevelId> = levels.newest_to_oldest().map(|l| l.id).collect();

        Self {
            overlay,
            levels,
            deletions,
            node,
            visibility,
            out_direction,
            stage: Stage::Overlay,
            overlay_indices: overlay_indices.into_iter(),
            remaining_levels: remaining_levels.into_iter(),
            frozen_cursor: None,
        }
    }

    fn advance_frozen_cursor(&mut self) -> bool {
        while let Some(level_id) = self.remaining_levels.next() {
            if !self.visibility.admits_level(level_id) {
                continue;
            }
            let resolved = if self.out_direction {
                self.levels.resolve_out_slice(level_id, self.node)
            } else {
                self.levels.resolve_in_slice(level_id, self.node)
            };
            let Some((owner, slice)) = resolved else {
                continue;
            };
            if slice.is_empty() {
                continue;
            }
            let owner_level = self
                .levels
                .level(owner)
                .expect("resolve_*_slice only returns levels present in this snapshot");
            let csr = if self.out_direction {
                &owner_level.out
            } else {
                owner_level
                    .inbound
                    .as_ref()
                    .expect("resolve_in_slice implies an in-CSR exists at the owner level")
            };
            let entry = csr
                .vertex(self.node)
                .expect("resolve_*_slice already confirmed this vertex entry exists");
            let start = entry.adjacency_start;
            self.frozen_cursor = Some((owner, start, start + entry.length));
            return true;
        }
        false
    }

    fn next_frozen(&mut self) -> Option<EdgeRef> {
        loop {
            if self.frozen_cursor.is_none() && !self.advance_frozen_cursor() {
                return None;
            }
            let (owner, cur, end) = self.frozen_cursor.as_mut().expect("just populated above");
            if *cur >= *end {
                self.frozen_cursor = None;
                continue;
            }
            let index = *cur;
            *cur += 1;
            let edge = EdgeRef::Frozen {
                level: *owner,
                index,
            };
            let ts_ceiling = self.visibility.timestamp;
            let deleted = if self.out_direction {
                self.deletions.is_deleted_out(edge, ts_ceiling)
            } else {
                self.deletions.is_deleted_in(edge, ts_ceiling)
            };
            if deleted {
                continue;
            }
            return Some(edge);
        }
    }
}

impl Iterator for AdjacencyIter<'_> {
    type Item = EdgeRef;

    fn next(&mut self) -> Option<EdgeRef> {
        loop {
            match self.stage {
                Stage::Overlay => {
                    let Some(idx) = self.overlay_indices.next() else {
                        self.stage = Stage::Frozen;
                        continue;
                    };
                    let edge = self.overlay.edge(idx);
                    if edge.is_visible(self.visibility.timestamp) {
                        return Some(EdgeRef::Overlay { index: idx });
                    }
                }
                Stage::Frozen => {
                    let Some(edge) = self.next_frozen() else {
                        self.stage = Stage::Done;
                        continue;
                    };
                    return Some(edge);
                }
                Stage::Done => return None,
            }
        }
    }
}
