// SPDX-License-Identifier: Apache-2.0
//! Persisted level layout (§6, feature `persistence`).
//!
//! A level's vertex and edge tables round-trip as little-endian, fixed-stride
//! `bytemuck`-POD records behind a small header; a CBOR catalog records
//! which level numbers and named property columns exist on disk. Concrete
//! file-format loaders (X-Stream, SNAP, FGF) stay out of scope — this module
//! only models the record layouts those loaders and this crate's own
//! checkpoint output must agree on.

use crate::error::GraphError;
use crate::ident::{LevelId, NodeRaw};
use crate::level::{Csr, VertexEntry};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const MAGIC: [u8; 8] = *b"LLAMAv1\0";
const FORMAT_VERSION: u32 = 1;

/// Fixed 64-byte header prefixing every persisted table file.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct TableHeader {
    magic: [u8; 8],
    format_version: u32,
    stride: u32,
    count: u64,
    content_hash: [u8; 32],
    _reserved: [u8; 8],
}

/// Catalog entry for one level present on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LevelManifestEntry {
    pub level: u32,
    pub max_nodes: u64,
    pub has_inbound: bool,
    pub node_properties: Vec<String>,
    pub edge_properties: Vec<String>,
}

/// The CBOR-encoded catalog for an entire persisted level stack.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Catalog {
    pub levels: Vec<LevelManifestEntry>,
}

impl Catalog {
    /// # Errors
    /// Propagates any I/O failure from writing to `writer`, or a CBOR
    /// encoding failure (treated as [`GraphError::CorruptLevel`]).
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), GraphError> {
        ciborium::into_writer(self, writer).map_err(|e| GraphError::CorruptLevel(e.to_string()))
    }

    /// # Errors
    /// Propagates any I/O failure from `reader`, or a CBOR decoding failure
    /// as [`GraphError::CorruptLevel`].
    pub fn read_from<R: Read>(reader: R) -> Result<Self, GraphError> {
        ciborium::from_reader(reader).map_err(|e| GraphError::CorruptLevel(e.to_string()))
    }
}

fn write_table<W: Write, T: Pod>(mut writer: W, records: &[T]) -> Result<(), GraphError> {
    let bytes = bytemuck::cast_slice(records);
    let header = TableHeader {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        stride: u32::try_from(std::mem::size_of::<T>()).unwrap_or(0),
        count: records.len() as u64,
        content_hash: *blake3::hash(bytes).as_bytes(),
        _reserved: [0; 8],
    };
    writer.write_all(bytemuck::bytes_of(&header))?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_table<R: Read, T: Pod + Zeroable>(mut reader: R) -> Result<Vec<T>, GraphError> {
    let mut header_bytes = [0u8; std::mem::size_of::<TableHeader>()];
    reader.read_exact(&mut header_bytes)?;
    let header: TableHeader = bytemuck::pod_read_unaligned(&header_bytes);
    if header.magic != MAGIC {
        return Err(GraphError::CorruptLevel("bad magic".to_string()));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(GraphError::CorruptLevel(format!(
            "unsupported format version {}",
            header.format_version
        )));
    }
    let stride = header.stride as usize;
    if stride != std::mem::size_of::<T>() {
        return Err(GraphError::CorruptLevel(format!(
            "stride mismatch: file has {stride}, expected {}",
            std::mem::size_of::<T>()
        )));
    }
    let mut raw = vec![0u8; stride * header.count as usize];
    reader.read_exact(&mut raw)?;
    if *blake3::hash(&raw).as_bytes() != header.content_hash {
        return Err(GraphError::CorruptLevel(
            "content hash mismatch".to_string(),
        ));
    }
    Ok(bytemuck::cast_slice(&raw).to_vec())
}

/// Writes one direction's CSR (vertex table + edge table) as two sibling
/// table files: `vertices.bin` and `edges.bin` under `dir`.
///
/// # Errors
/// Any I/O failure opening or writing the two files under `dir`.
pub fn write_csr(dir: &std::path::Path, csr: &Csr) -> Result<(), GraphError> {
    std::fs::create_dir_all(dir)?;
    write_table(
        std::fs::File::create(dir.join("vertices.bin"))?,
        csr.vertices_for_persistence(),
    )?;
    write_table(
        std::fs::File::create(dir.join("edges.bin"))?,
        csr.targets_for_persistence(),
    )?;
    Ok(())
}

/// Reads back a CSR written by [`write_csr`]. Does not mark any vertex as
/// sorted-within-group; callers that persisted a sorted CSR must call
/// [`Csr::mark_sorted_within_group`] again after loading.
///
/// # Errors
/// Any I/O failure, or [`GraphError::CorruptLevel`] if either file's header
/// is malformed or its content hash does not match.
pub fn read_csr(dir: &std::path::Path, level: LevelId) -> Result<Csr, GraphError> {
    let vertices: Vec<VertexEntry> = read_table(std::fs::File::open(dir.join("vertices.bin"))?)?;
    let targets: Vec<NodeRaw> = read_table(std::fs::File::open(dir.join("edges.bin"))?)?;
    Ok(Csr::from_parts(vertices, targets, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::NodeId;

    #[test]
    fn csr_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut csr = Csr::init_level_from_degrees(&[1, 1, 0], LevelId(0));
        csr.fill_slice(NodeId(0), &[1]);
        csr.fill_slice(NodeId(1), &[2]);
        csr.fill_slice(NodeId(2), &[]);

        write_csr(dir.path(), &csr).unwrap();
        let loaded = read_csr(dir.path(), LevelId(0)).unwrap();
        assert_eq!(loaded.own_slice(NodeId(0)), csr.own_slice(NodeId(0)));
        assert_eq!(loaded.own_slice(NodeId(1)), csr.own_slice(NodeId(1)));
        assert_eq!(loaded.max_edges(), csr.max_edges());
    }

    #[test]
    fn catalog_round_trips_through_cbor() {
        let catalog = Catalog {
            levels: vec![LevelManifestEntry {
                level: 0,
                max_nodes: 3,
                has_inbound: false,
                node_properties: vec!["rank".to_string()],
                edge_properties: vec![],
            }],
        };
        let mut buf = Vec::new();
        catalog.write_to(&mut buf).unwrap();
        let decoded = Catalog::read_from(buf.as_slice()).unwrap();
        assert_eq!(decoded.levels, catalog.levels);
    }
}
