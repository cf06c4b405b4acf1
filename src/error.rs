// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the storage engine (§7: capacity, invariant-violation,
//! parse, I/O, not-supported, user).
//!
//! Capacity and user errors are ordinary return values. Invariant violations
//! are never returned: they panic via [`invariant`], because the engine has
//! no way to recover a torn level or vertex table into a consistent state.

use crate::ident::NodeId;
use thiserror::Error;

/// Errors surfaced as return values by the storage engine.
///
/// One `#[derive(Error)]` enum per failure domain, rather than a single
/// catch-all error type.
#[derive(Debug, Error)]
pub enum GraphError {
    /// `add_node` found the node table full (§4.2 failure semantics).
    #[error("node table is full: max_nodes = {max_nodes}")]
    NodeTableFull {
        /// The configured ceiling that was hit.
        max_nodes: u64,
    },
    /// `add_node(id)` was given an id that already exists (non-idempotent
    /// collision against a *different* prior insert generation).
    #[error("node {0} already exists")]
    NodeAlreadyExists(NodeId),
    /// A `LoaderConfig` combination is unsupported (§7: not-supported errors
    /// are fatal at configuration time, not at runtime).
    #[error("unsupported loader configuration: {0}")]
    UnsupportedConfig(&'static str),
    /// A malformed line was seen by a line-oriented loader adapter beyond
    /// the tolerated threshold (§7: parse errors are tolerated up to a
    /// bound, then fatal).
    #[error("too many malformed lines: {bad} exceeds threshold {threshold}")]
    TooManyParseErrors {
        /// Number of malformed lines actually seen.
        bad: usize,
        /// The configured tolerance.
        threshold: usize,
    },
    /// External-sort or persistence I/O failed (§7: I/O errors are fatal).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A persisted level or catalog failed to decode.
    #[cfg(feature = "persistence")]
    #[error("corrupt persisted level: {0}")]
    CorruptLevel(String),
}

/// Panics with a message naming the violated invariant, per §9's "structured
/// panics carrying the violated invariant's name" design note (the Rust
/// replacement for the source's exception-free `abort()` style).
///
/// ```should_panic
/// llama_mlcsr::invariant!(1 == 2, "one-equals-two");
/// ```
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $name:expr) => {
        if !$cond {
            panic!(
                "invariant violated: {} ({}:{}:{})",
                $name,
                file!(),
                line!(),
                column!()
            );
        }
    };
    ($cond:expr, $name:expr, $($arg:tt)+) => {
        if !$cond {
            panic!(
                "invariant violated: {} ({}): {}",
                $name,
                format_args!("{}:{}:{}", file!(), line!(), column!()),
                format_args!($($arg)+)
            );
        }
    };
}
