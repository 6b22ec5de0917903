//! The backing image cache: a memory-mapped byte buffer standing in for the
//! abstract "mutable byte buffer... flushed on teardown" of the concurrency
//! model. Grounded directly on the teacher's `MmapTablespaceReader`/
//! `MmapTablespaceWriter` in `tablespace.rs`, which open a file, map it
//! `SHARED` with `mmap-rs`, and expose `flush`/`flush_all`.

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use mmap_rs::{MmapFlags, MmapMut, MmapOptions};

pub struct Image {
    mmap: MmapMut,
    // Kept open for the engine's lifetime; the cache is only valid as long
    // as the descriptor backing it is. Never read directly after mapping.
    _file: File,
    offset: usize,
    len: usize,
}

impl Image {
    /// Create a new backing file of exactly `total_len` bytes and map it.
    pub fn create(path: &Path, total_len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("creating image file {}", path.display()))?;
        file.set_len(total_len).with_context(|| {
            format!("sizing image file {} to {total_len} bytes", path.display())
        })?;
        Self::map_whole(file, total_len as usize)
    }

    /// Open an existing backing file and map it at its current size.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening image file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("statting image file {}", path.display()))?
            .len() as usize;
        Self::map_whole(file, len)
    }

    fn map_whole(file: File, len: usize) -> Result<Self> {
        let mmap = MmapOptions::new(len)
            .context("computing mmap size")?
            .with_file(&file, 0)
            .with_flags(MmapFlags::SHARED)
            .map_mut()
            .context("mapping image file")?;
        Ok(Image {
            mmap,
            _file: file,
            offset: 0,
            len,
        })
    }

    /// Narrow the addressable window to a partition found by the MBR codec.
    /// Called at most once, right after open/create, before any other
    /// engine operation touches the buffer.
    pub fn set_window(&mut self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).is_none_or(|end| end > self.mmap.len()) {
            anyhow::bail!("partition window out of range of backing file");
        }
        self.offset = offset;
        self.len = len;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[self.offset..self.offset + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap[self.offset..self.offset + self.len]
    }

    /// The whole backing file, ignoring any partition window. Used only by
    /// the MBR codec, which runs before the window is established.
    pub fn whole_file(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn whole_file_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flush the whole mapping to the backing file. Called once, at
    /// teardown.
    pub fn flush(&self) -> Result<()> {
        self.mmap
            .flush(0..self.mmap.len())
            .context("flushing image to backing file")
    }
}
