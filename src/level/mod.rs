// SPDX-License-Identifier: Apache-2.0
//! The append-only sequence of frozen levels (§4.1).
//!
//! Publication is a single atomic pointer swap (`ArcSwap`), matching §5's
//! "Checkpoint publishes the new level via an atomic pointer swap after all
//! writes and fences; readers that start after the publish see the new
//! stack." A reader that already holds a [`LevelStackSnapshot`] (an
//! `Arc`-backed clone of the stack at the moment it was taken) keeps
//! observing that snapshot even if a concurrent checkpoint publishes a new
//! one — exactly the "reader that begins iteration before the publish point
//! observes the old stack" contract from §4.3.

mod csr;

pub use csr::{Csr, VertexEntry};

use crate::ident::{LevelId, NodeId, NodeRaw};
use arc_swap::ArcSwap;
use std::sync::Arc;

/// One immutable frozen snapshot: an out-CSR and an optional mirrored
/// in-CSR, plus the edge-translation columns between them (§4.1 "Edge
/// translation maps").
pub struct Level {
    pub id: LevelId,
    pub out: Csr,
    pub inbound: Option<Csr>,
    /// `out_to_in(e)`: out-edge-table index -> in-edge-table index, present
    /// only when both directions and reverse maps were requested.
    pub out_to_in: Option<Vec<u32>>,
    /// `in_to_out(e)`: the mirror of `out_to_in`.
    pub in_to_out: Option<Vec<u32>>,
}

impl Level {
    #[must_use]
    pub fn max_nodes(&self) -> usize {
        self.out.max_nodes()
    }

    #[must_use]
    pub fn max_out_edges(&self) -> usize {
        self.out.max_edges()
    }

    #[must_use]
    pub fn max_in_edges(&self) -> usize {
        self.inbound.as_ref().map_or(0, Csr::max_edges)
    }
}

/// An `Arc`-backed, point-in-time view of the level stack. Cloning is O(1)
/// (it clones the `Arc`, not the levels) and holding one keeps every level
/// it references alive even if a concurrent `checkpoint()`/`delete_level`
/// moves the published stack on.
#[derive(Clone)]
pub struct LevelStackSnapshot {
    levels: Arc<Vec<Arc<Level>>>,
}

impl LevelStackSnapshot {
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn level(&self, id: LevelId) -> Option<&Arc<Level>> {
        self.levels.iter().find(|l| l.id == id)
    }

    /// Levels newest-to-oldest, the iteration order required by §4.5.
    pub fn newest_to_oldest(&self) -> impl Iterator<Item = &Arc<Level>> {
        self.levels.iter().rev()
    }

    #[must_use]
    pub fn newest_level_id(&self) -> Option<LevelId> {
        self.levels.last().map(|l| l.id)
    }

    /// One past the largest known node id across every level in this
    /// snapshot (§4.1 `max_nodes`).
    #[must_use]
    pub fn max_nodes(&self) -> NodeRaw {
        self.levels
            .last()
            .map_or(0, |l| l.max_nodes() as NodeRaw)
    }

    /// Resolves `node`'s adjacency slice at `level`, following a
    /// continuation pointer if one is set (§4.1). Returns the level that
    /// physically owns the slice and the slice itself.
    #[must_use]
    pub fn resolve_out_slice(&self, level: LevelId, node: NodeId) -> Option<(LevelId, &[NodeRaw])> {
        self.resolve_slice(level, node, true)
    }

    #[must_use]
    pub fn resolve_in_slice(&self, level: LevelId, node: NodeId) -> Option<(LevelId, &[NodeRaw])> {
        self.resolve_slice(level, node, false)
    }

    fn resolve_slice(
        &self,
        mut level: LevelId,
        node: NodeId,
        out_direction: bool,
    ) -> Option<(LevelId, &[NodeRaw])> {
        // Bounded by num_levels: a continuation chain can never be longer
        // than the stack itself, so this loop always terminates.
        for _ in 0..=self.levels.len() {
            let lvl = self.level(level)?;
            let csr = if out_direction {
                &lvl.out
            } else {
                lvl.inbound.as_ref()?
            };
            let entry = csr.vertex(node)?;
            match entry.continuation() {
                Some(earlier) => level = earlier,
                None => return Some((level, csr.own_slice(node))),
            }
        }
        crate::invariant!(false, "continuation-chain-cycle");
        None
    }

    /// `find(u, v)`: newest level first, first match in insertion order
    /// within a level (§4.1).
    #[must_use]
    pub fn find_out(&self, u: NodeId, v: NodeId) -> Option<(LevelId, u32)> {
        for lvl in self.newest_to_oldest() {
            if let Some((owner, _slice)) = self.resolve_out_slice(lvl.id, u) {
                let owner_csr = &self.level(owner)?.out;
                if let Some(idx) = owner_csr.find_in_own_slice(u, v) {
                    return Some((owner, idx));
                }
            }
        }
        None
    }
}

/// Owns the append-only sequence of frozen levels behind an atomic publish
/// pointer.
pub struct LevelStack {
    inner: ArcSwap<Vec<Arc<Level>>>,
}

impl Default for LevelStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelStack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Takes a consistent, `Arc`-backed point-in-time view (§4.3 "a reader
    /// that begins iteration before the publish point observes the old
    /// stack").
    #[must_use]
    pub fn snapshot(&self) -> LevelStackSnapshot {
        LevelStackSnapshot {
            levels: self.inner.load_full(),
        }
    }

    /// Appends `level` and atomically publishes the new stack
    /// (`checkpoint()`/`load_direct` are the only callers, §3 Lifecycle).
    pub fn publish(&self, level: Level) {
        let level = Arc::new(level);
        self.inner.rcu(|levels| {
            let mut next = (**levels).clone();
            next.push(Arc::clone(&level));
            next
        });
    }

    /// Removes level `id` from the published stack (`delete_level`). Does
    /// not check that no snapshot still needs it — that invariant is the
    /// caller's responsibility per §3 Lifecycle ("a level may be deleted
    /// only if no iterator holds a visibility window that requires it").
    pub fn remove(&self, id: LevelId) {
        self.inner
            .rcu(|levels| levels.iter().filter(|l| l.id != id).cloned().collect::<Vec<_>>());
    }
}
