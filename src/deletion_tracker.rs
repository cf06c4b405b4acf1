// SPDX-License-Identifier: Apache-2.0
//! Deletion bookkeeping for frozen edges (§4.4).
//!
//! Frozen levels are immutable, so a deletion against a frozen edge cannot
//! touch the level's own CSR tables. Instead it is recorded here, keyed by
//! the edge's `(level, index)` identity, and every degree/iteration query
//! consults this tracker to subtract deleted edges from what the frozen
//! tables would otherwise report (§4.1 Invariant 2).

use crate::ident::{EdgeRef, LevelId, NodeId, Timestamp};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Tracks deletions of frozen edges, split into an out-side and an in-side
/// map so a reader walking only one direction never pays for the other
/// (§4.4 "two maps"). Each side also keeps a per-node affected-edge index so
/// `out_degree`/`in_degree` don't have to scan every deletion on record.
pub struct DeletionTracker {
    out_deletions: Mutex<FxHashMap<(LevelId, u32), Timestamp>>,
    in_deletions: Mutex<FxHashMap<(LevelId, u32), Timestamp>>,
    out_affected: Mutex<FxHashMap<NodeId, u32>>,
    in_affected: Mutex<FxHashMap<NodeId, u32>>,
}

impl Default for DeletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DeletionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            out_deletions: Mutex::new(FxHashMap::default()),
            in_deletions: Mutex::new(FxHashMap::default()),
            out_affected: Mutex::new(FxHashMap::default()),
            in_affected: Mutex::new(FxHashMap::default()),
        }
    }

    /// Records that the frozen out-edge `(level, index)`, owned by `owner`,
    /// is deleted as of `ts`. A no-op if already recorded.
    pub fn mark_deleted_out(&self, owner: NodeId, level: LevelId, index: u32, ts: Timestamp) {
        let mut deletions = self.out_deletions.lock();
        if deletions.insert((level, index), ts).is_none() {
            *self.out_affected.lock().entry(owner).or_insert(0) += 1;
        }
    }

    pub fn mark_deleted_in(&self, owner: NodeId, level: LevelId, index: u32, ts: Timestamp) {
        let mut deletions = self.in_deletions.lock();
        if deletions.insert((level, index), ts).is_none() {
            *self.in_affected.lock().entry(owner).or_insert(0) += 1;
        }
    }

    /// Whether `edge` (a frozen `EdgeRef`) is deleted as of `reader_ts`.
    /// Overlay and nil refs are never tracked here and read as "not
    /// deleted" — the overlay tracks its own edges' `deleted` flag.
    #[must_use]
    pub fn is_deleted_out(&self, edge: EdgeRef, reader_ts: Timestamp) -> bool {
        let EdgeRef::Frozen { level, index } = edge else {
            return false;
        };
        self.out_deletions
            .lock()
            .get(&(level, index))
            .is_some_and(|&ts| ts <= reader_ts)
    }

    #[must_use]
    pub fn is_deleted_in(&self, edge: EdgeRef, reader_ts: Timestamp) -> bool {
        let EdgeRef::Frozen { level, index } = edge else {
            return false;
        };
        self.in_deletions
            .lock()
            .get(&(level, index))
            .is_some_and(|&ts| ts <= reader_ts)
    }

    #[must_use]
    pub fn deleted_out_count(&self, node: NodeId) -> u32 {
        self.out_affected.lock().get(&node).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn deleted_in_count(&self, node: NodeId) -> u32 {
        self.in_affected.lock().get(&node).copied().unwrap_or(0)
    }

    /// Drops every deletion recorded against `level` (`delete_level`): once
    /// the level itself is gone there is nothing left to subtract from.
    pub fn drop_level(&self, level: LevelId) {
        self.out_deletions.lock().retain(|&(l, _), _| l != level);
        self.in_deletions.lock().retain(|&(l, _), _| l != level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_query_out_deletion() {
        let tracker = DeletionTracker::new();
        let owner = NodeId(3);
        let edge = EdgeRef::Frozen {
            level: LevelId(0),
            index: 7,
        };
        assert!(!tracker.is_deleted_out(edge, Timestamp::MAX));

        tracker.mark_deleted_out(owner, LevelId(0), 7, Timestamp(5));
        assert!(tracker.is_deleted_out(edge, Timestamp::MAX));
        assert!(!tracker.is_deleted_out(edge, Timestamp(4)));
        assert_eq!(tracker.deleted_out_count(owner), 1);
    }

    #[test]
    fn double_mark_does_not_double_count() {
        let tracker = DeletionTracker::new();
        let owner = NodeId(1);
        tracker.mark_deleted_out(owner, LevelId(0), 2, Timestamp(1));
        tracker.mark_deleted_out(owner, LevelId(0), 2, Timestamp(2));
        assert_eq!(tracker.deleted_out_count(owner), 1);
    }

    #[test]
    fn drop_level_clears_its_deletions() {
        let tracker = DeletionTracker::new();
        tracker.mark_deleted_out(NodeId(0), LevelId(0), 0, Timestamp(1));
        tracker.drop_level(LevelId(0));
        assert!(!tracker.is_deleted_out(
            EdgeRef::Frozen {
                level: LevelId(0),
                index: 0
            },
            Timestamp::MAX
        ));
    }
}
