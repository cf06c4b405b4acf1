// SPDX-License-Identifier: Apache-2.0
//! Typed node/edge property columns (§4.6).
//!
//! A column is a named, typed array addressed by [`NodeId`] (node columns)
//! or [`EdgeRef`] (edge columns). Per level the column has an *extent* sized
//! to that level's vertex or edge table; writes before a checkpoint land in
//! a copy-on-write overlay shadow and are flushed into a fresh level extent
//! at checkpoint time (§4.3 step 5).
//!
//! Reads walk extents newest-to-oldest and the first level with a
//! non-default value wins — mirroring how [`crate::level`] itself resolves
//! continuations newest-first.

mod column;

pub use column::{PropertyColumn, PropertyValue, TypedColumn};

use crate::error::GraphError;
use crate::ident::{EdgeRef, NodeId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Scalar type tag for a property column, per §3's "Property column" list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PropertyType {
    Int32,
    Int64,
    Float,
    Double,
    /// Opaque payload stored by reference; the column owns a `Bytes` handle
    /// rather than a raw pointer plus destructor (see SPEC_FULL.md §4.6).
    StringPtr,
}

/// Which table a column is addressed against.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColumnKind {
    Node,
    Edge,
}

/// Registry of named node/edge property columns.
///
/// The registration lock (§4.2 "Property creation") guards only the rare
/// act of adding a new named column; reads and per-entity writes against an
/// already-registered column do not take it.
pub struct PropertyRegistry {
    node_columns: RwLock<FxHashMap<String, Arc<PropertyColumn>>>,
    edge_columns: RwLock<FxHashMap<String, Arc<PropertyColumn>>>,
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            node_columns: RwLock::new(FxHashMap::default()),
            edge_columns: RwLock::new(FxHashMap::default()),
        }
    }

    fn table(&self, kind: ColumnKind) -> &RwLock<FxHashMap<String, Arc<PropertyColumn>>> {
        match kind {
            ColumnKind::Node => &self.node_columns,
            ColumnKind::Edge => &self.edge_columns,
        }
    }

    /// `create_uninitialized_node_property_{32,64}` / edge equivalents.
    ///
    /// # Errors
    /// Returns [`GraphError::UnsupportedConfig`] if a column with this name
    /// already exists (property-column schema evolution is append-only,
    /// §1 Non-goals — re-registration under the same name is rejected rather
    /// than silently resized).
    pub fn create(
        &self,
        kind: ColumnKind,
        name: &str,
        ty: PropertyType,
    ) -> Result<Arc<PropertyColumn>, GraphError> {
        let mut table = self.table(kind).write();
        if table.contains_key(name) {
            return Err(GraphError::UnsupportedConfig(
                "property column already registered under this name",
            ));
        }
        let col = Arc::new(PropertyColumn::new(name.to_string(), kind, ty));
        table.insert(name.to_string(), Arc::clone(&col));
        Ok(col)
    }

    /// `get_node_property_{32,64}` / `get_edge_property_{32,64}`.
    #[must_use]
    pub fn get(&self, kind: ColumnKind, name: &str) -> Option<Arc<PropertyColumn>> {
        self.table(kind).read().get(name).cloned()
    }

    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.node_columns.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn edge_names(&self) -> Vec<String> {
        self.edge_columns.read().keys().cloned().collect()
    }
}

/// Either half of the entity space a column can be addressed by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Entity {
    Node(NodeId),
    Edge(EdgeRef),
}

impl From<NodeId> for Entity {
    fn from(n: NodeId) -> Self {
        Self::Node(n)
    }
}

impl From<EdgeRef> for Entity {
    fn from(e: EdgeRef) -> Self {
        Self::Edge(e)
    }
}
