// SPDX-License-Identifier: Apache-2.0
//! Bounded-memory external merge sort (§4.7).
//!
//! Items accumulate in an in-memory buffer until it reaches
//! [`ExternalSortConfig::budget_bytes`], at which point the buffer is sorted
//! and spilled to a temp file. `sort()` spills whatever remains and prepares
//! a K-way merge across every spill file (or, if nothing was ever spilled,
//! just sorts the buffer in place and skips the file machinery entirely).
//!
//! Spill files are opened with [`tempfile::tempfile_in`], which on Unix
//! unlinks the inode immediately, satisfying §5's "unlinked immediately
//! after open" policy without hand-rolled `open`+`unlink`.

use crate::error::GraphError;
use bytemuck::Pod;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// One megabyte; the conservative fixed default used when
/// `budget_bytes == 0` (§4.7: a library should not probe `/proc/meminfo` by
/// default).
const DEFAULT_BUDGET_BYTES: usize = 16 * 1024 * 1024;
const READ_CHUNK_ITEMS: usize = 8192;

#[derive(Clone, Debug)]
pub struct ExternalSortConfig {
    /// In-memory buffer ceiling, in bytes, before a spill. `0` selects
    /// [`DEFAULT_BUDGET_BYTES`].
    pub budget_bytes: usize,
    /// Directories spill files are rotated across. Empty uses the system
    /// temp directory.
    pub tmp_dirs: Vec<PathBuf>,
}

impl Default for ExternalSortConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 0,
            tmp_dirs: Vec::new(),
        }
    }
}

impl ExternalSortConfig {
    fn effective_budget_bytes(&self) -> usize {
        if self.budget_bytes == 0 {
            DEFAULT_BUDGET_BYTES
        } else {
            self.budget_bytes
        }
    }
}

/// Reads fixed-stride `T` records back out of one spill file, a chunk at a
/// time, so merge never holds more than [`READ_CHUNK_ITEMS`] records from any
/// single file in memory.
struct SpillReader<T> {
    reader: BufReader<File>,
    chunk: Vec<T>,
    pos: usize,
}

impl<T: Pod> SpillReader<T> {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::new(file),
            chunk: Vec::new(),
            pos: 0,
        }
    }

    fn rewind(&mut self) -> std::io::Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.chunk.clear();
        self.pos = 0;
        Ok(())
    }

    fn refill(&mut self) -> std::io::Result<()> {
        let stride = std::mem::size_of::<T>();
        let mut raw = vec![0u8; stride * READ_CHUNK_ITEMS];
        let mut filled = 0;
        loop {
            let n = self.reader.read(&mut raw[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == raw.len() {
                break;
            }
        }
        let whole_items = filled / stride;
        raw.truncate(whole_items * stride);
        self.chunk = bytemuck::cast_slice(&raw).to_vec();
        self.pos = 0;
        Ok(())
    }

    fn peek(&mut self) -> std::io::Result<Option<T>> {
        if self.pos >= self.chunk.len() {
            self.refill()?;
        }
        Ok(self.chunk.get(self.pos).copied())
    }

    fn advance(&mut self) {
        self.pos += 1;
    }
}

enum Source<T: Pod> {
    /// Nothing was ever spilled: the whole data set fit in memory.
    InMemory { sorted: Vec<T>, pos: usize },
    /// One merge cursor per spill file, combined with a min-heap.
    Merging {
        readers: Vec<SpillReader<T>>,
        heap: BinaryHeap<Reverse<(T, usize)>>,
    },
}

pub struct ExternalSort<T: Pod + Ord> {
    config: ExternalSortConfig,
    buffer: Vec<T>,
    spill_paths_used: usize,
    spills: Vec<File>,
    source: Option<Source<T>>,
}

impl<T: Pod + Ord + Send> ExternalSort<T> {
    #[must_use]
    pub fn new(config: ExternalSortConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            spill_paths_used: 0,
            spills: Vec::new(),
            source: None,
        }
    }

    /// `push(item)`: append one item to the active buffer, spilling if the
    /// buffer has grown past the configured budget.
    pub fn push(&mut self, item: T) -> Result<(), GraphError> {
        self.source = None;
        self.buffer.push(item);
        if self.buffer.len() * std::mem::size_of::<T>() >= self.config.effective_budget_bytes() {
            self.spill()?;
        }
        Ok(())
    }

    fn open_spill_file(&mut self) -> Result<File, GraphError> {
        if self.config.tmp_dirs.is_empty() {
            return Ok(tempfile::tempfile()?);
        }
        let dir = &self.config.tmp_dirs[self.spill_paths_used % self.config.tmp_dirs.len()];
        self.spill_paths_used += 1;
        Ok(tempfile::tempfile_in(dir)?)
    }

    fn spill(&mut self) -> Result<(), GraphError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer.sort_unstable();
        let mut file = self.open_spill_file()?;
        file.write_all(bytemuck::cast_slice(&self.buffer))?;
        file.flush()?;
        self.buffer.clear();
        self.spills.push(file);
        Ok(())
    }

    /// `sort()`: finalize ingestion and prepare for `next_block` reads.
    pub fn sort(&mut self) -> Result<(), GraphError> {
        if self.spills.is_empty() {
            self.buffer.sort_unstable();
            self.source = Some(Source::InMemory {
                sorted: std::mem::take(&mut self.buffer),
                pos: 0,
            });
            return Ok(());
        }

        self.spill()?;
        let mut readers: Vec<SpillReader<T>> = Vec::with_capacity(self.spills.len());
        for file in self.spills.drain(..) {
            let mut file = file;
            file.seek(SeekFrom::Start(0))?;
            readers.push(SpillReader::new(file));
        }

        let mut heap = BinaryHeap::new();
        for (idx, reader) in readers.iter_mut().enumerate() {
            if let Some(v) = reader.peek()? {
                heap.push(Reverse((v, idx)));
            }
        }
        self.source = Some(Source::Merging { readers, heap });
        Ok(())
    }

    /// `next_block(&mut buf, max_items)`: appends up to `max_items` sorted
    /// items to `buf`, returning `true` if any were appended. Must be called
    /// after [`ExternalSort::sort`].
    pub fn next_block(&mut self, out: &mut Vec<T>, max_items: usize) -> Result<bool, GraphError> {
        let source = self
            .source
            .as_mut()
            .expect("next_block called before sort()");
        let mut produced = false;
        match source {
            Source::InMemory { sorted, pos } => {
                let end = (*pos + max_items).min(sorted.len());
                out.extend_from_slice(&sorted[*pos..end]);
                produced = end > *pos;
                *pos = end;
            }
            Source::Merging { readers, heap } => {
                for _ in 0..max_items {
                    let Some(Reverse((value, idx))) = heap.pop() else {
                        break;
                    };
                    out.push(value);
                    produced = true;
                    readers[idx].advance();
                    if let Some(next_value) = readers[idx].peek()? {
                        heap.push(Reverse((next_value, idx)));
                    }
                }
            }
        }
        Ok(produced)
    }

    /// `rewind_sorted()`: reset the read cursor to the beginning without
    /// re-sorting, so the same sorted sequence can be replayed.
    pub fn rewind_sorted(&mut self) -> Result<(), GraphError> {
        match self.source.as_mut().expect("rewind_sorted before sort()") {
            Source::InMemory { pos, .. } => *pos = 0,
            Source::Merging { readers, heap } => {
                heap.clear();
                for (idx, reader) in readers.iter_mut().enumerate() {
                    reader.rewind()?;
                    if let Some(v) = reader.peek()? {
                        heap.push(Reverse((v, idx)));
                    }
                }
            }
        }
        Ok(())
    }

    /// `clear()`: drop all buffered and spilled data, returning to a fresh
    /// empty state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.spills.clear();
        self.source = None;
        self.spill_paths_used = 0;
    }
}
