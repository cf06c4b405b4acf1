// SPDX-License-Identifier: Apache-2.0
//! A multi-level CSR graph storage engine: a mutable write overlay sitting
//! atop a stack of immutable, versioned compressed-sparse-row snapshots.
//!
//! Ingest lands in [`overlay::WritableOverlay`]; [`checkpoint::run`] folds its
//! delta into a new [`level::Level`] and publishes it atomically, leaving
//! older levels untouched. [`iter::AdjacencyIter`] unions a node's adjacency
//! across every still-visible level at read time. [`graph::Graph`] is the
//! façade most callers want.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod config;
pub mod datasource;
pub mod deletion_tracker;
pub mod error;
pub mod graph;
pub mod ident;
pub mod iter;
pub mod external_sort;
pub mod level;
pub mod overlay;
#[cfg(feature = "persistence")]
pub mod persistence;
pub mod parallel;
pub mod property;

pub use config::{Direction, LoaderConfig};
pub use datasource::{ConcatSource, PullSource, RequestQueue, VecSource};
pub use deletion_tracker::DeletionTracker;
pub use error::GraphError;
pub use external_sort::{ExternalSort, ExternalSortConfig};
pub use graph::Graph;
pub use ident::{EdgeRef, LevelId, NodeId, NodeRaw, Timestamp, Visibility};
pub use iter::AdjacencyIter;
pub use level::{Csr, Level, LevelStack, LevelStackSnapshot, VertexEntry};
pub use overlay::{OverlayEdge, OverlayNode, OverlayNodeState, WritableOverlay};
pub use property::{ColumnKind, Entity, PropertyColumn, PropertyRegistry, PropertyType, PropertyValue, TypedColumn};
