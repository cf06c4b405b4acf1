// SPDX-License-Identifier: Apache-2.0
//! Loader configuration (§6 "enumerated options table").
//!
//! `LoaderConfig` itself is inert data; `validate()` is where *not-supported*
//! combinations (§7) are rejected before any loading work starts.

use crate::error::GraphError;
use std::path::PathBuf;

/// How a data source's edges should be materialized into the graph.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    /// Only the direction the source provides.
    #[default]
    Directed,
    /// Each input edge is materialized twice, once in each direction.
    UndirectedDouble,
    /// Each input edge is materialized once, with endpoints ordered so the
    /// smaller node id is always the tail (deduplicates mirrored input).
    UndirectedOrdered,
}

/// Options controlling a bulk or incremental load (§6).
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    pub direction: Direction,
    /// Build the mirrored in-CSR alongside the out-CSR for each level.
    pub reverse_edges: bool,
    /// Build `out_to_in`/`in_to_out` translation columns. Requires
    /// `reverse_edges`.
    pub reverse_maps: bool,
    /// Collapse repeated `(tail, head)` pairs from the source into one edge.
    pub deduplicate: bool,
    /// Skip property-column population entirely (structure-only load).
    pub no_properties: bool,
    /// Directories `ExternalSort` rotates spill files across.
    pub tmp_dirs: Vec<PathBuf>,
    /// In-memory buffer size (bytes) for external sort; `0` selects a
    /// conservative fixed default rather than probing system memory.
    pub xs_buffer_size: usize,
    /// Stop after this many edges; `None` means "until the source is
    /// exhausted".
    pub max_edges: Option<usize>,
    /// This load handles only 1-of-`partial_load_num_parts` of the source,
    /// selected by `partial_load_part` (0-indexed) — used to shard a single
    /// bulk load across independent worker processes upstream of this crate.
    pub partial_load_part: usize,
    pub partial_load_num_parts: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Directed,
            reverse_edges: false,
            reverse_maps: false,
            deduplicate: false,
            no_properties: false,
            tmp_dirs: Vec::new(),
            xs_buffer_size: 0,
            max_edges: None,
            partial_load_part: 0,
            partial_load_num_parts: 1,
        }
    }
}

impl LoaderConfig {
    /// Rejects combinations that cannot be satisfied (§7 "not-supported"
    /// errors are fatal at configuration time, not buried in a load failure
    /// partway through a multi-gigabyte source).
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.reverse_maps && !self.reverse_edges {
            return Err(GraphError::UnsupportedConfig(
                "reverse_maps requires reverse_edges",
            ));
        }
        if self.partial_load_num_parts == 0 {
            return Err(GraphError::UnsupportedConfig(
                "partial_load_num_parts must be at least 1",
            ));
        }
        if self.partial_load_part >= self.partial_load_num_parts {
            return Err(GraphError::UnsupportedConfig(
                "partial_load_part must be less than partial_load_num_parts",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(LoaderConfig::default().validate().is_ok());
    }

    #[test]
    fn reverse_maps_without_reverse_edges_is_rejected() {
        let cfg = LoaderConfig {
            reverse_maps: true,
            ..LoaderConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(GraphError::UnsupportedConfig(_))
        ));
    }

    #[test]
    fn partial_load_part_out_of_range_is_rejected() {
        let cfg = LoaderConfig {
            partial_load_part: 2,
            partial_load_num_parts: 2,
            ..LoaderConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
