//! Fixed-size paged file I/O.
//!
//! `PageStore<F>` is generic over `Read + Write + Seek` so the exact same
//! code path backs an on-disk index file and an in-memory `Cursor<Vec<u8>>`
//! used by fast unit tests.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Default page size used when none is given explicitly.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// Page id 0 is reserved for the index's own metadata and is never handed
/// out as a node page.
pub const METADATA_PID: i32 = 0;

/// Whether a store is opened for reading only or for reading and writing,
/// creating the backing file if it does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Fixed-size page I/O over any `Read + Write + Seek` backend.
///
/// Pages are addressed by a non-negative [`PageId`](crate::types::PageId).
/// `end_pid` reports one past the highest page ever written; writing to
/// `end_pid` is the implementation's allocation contract - it extends the
/// backing store by exactly one page.
pub struct PageStore<F> {
    file: F,
    page_size: usize,
}

impl<F: Read + Write + Seek> PageStore<F> {
    /// Wrap an already-open backend. Used directly by tests to back a store
    /// with an in-memory `Cursor<Vec<u8>>`.
    pub fn new(file: F, page_size: usize) -> Self {
        PageStore { file, page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Read the page at `pid` into `buf`, which must be exactly
    /// `page_size()` bytes.
    pub fn read(&mut self, pid: i32, buf: &mut [u8]) -> Result<()> {
        if pid < 0 {
            return Err(Error::InvalidPid);
        }
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = (pid as u64) * (self.page_size as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write `buf` (exactly `page_size()` bytes) to the page at `pid`.
    /// Writing at `pid == end_pid()` extends the store by one page.
    pub fn write(&mut self, pid: i32, buf: &[u8]) -> Result<()> {
        if pid < 0 {
            return Err(Error::InvalidPid);
        }
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = (pid as u64) * (self.page_size as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// One past the last allocated page id. `0` means the store is empty
    /// (not even the metadata page has been written).
    pub fn end_pid(&mut self) -> Result<i32> {
        let len = self.file.seek(SeekFrom::End(0))?;
        Ok((len / self.page_size as u64) as i32)
    }

    /// Allocate a fresh, zero-filled page and return its id.
    pub fn allocate(&mut self) -> Result<i32> {
        let pid = self.end_pid()?;
        self.write(pid, &vec![0u8; self.page_size])?;
        Ok(pid)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

impl PageStore<File> {
    /// Open (or create, in [`OpenMode::ReadWrite`]) a file-backed store at
    /// the reference page size.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        Self::open_with_page_size(path, mode, DEFAULT_PAGE_SIZE)
    }

    pub fn open_with_page_size(path: &Path, mode: OpenMode, page_size: usize) -> Result<Self> {
        let file = match mode {
            OpenMode::ReadOnly => OpenOptions::new().read(true).open(path)?,
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?,
        };
        Ok(PageStore::new(file, page_size))
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl PageStore<Cursor<Vec<u8>>> {
    /// An empty in-memory store, handy for unit tests and property tests
    /// that would otherwise spend most of their time on file I/O.
    pub fn in_memory(page_size: usize) -> Self {
        PageStore::new(Cursor::new(Vec::new()), page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_extends_and_roundtrips() {
        let mut store = PageStore::in_memory(64);
        assert_eq!(store.end_pid().unwrap(), 0);

        let pid = store.allocate().unwrap();
        assert_eq!(pid, 0);
        assert_eq!(store.end_pid().unwrap(), 1);

        let mut buf = vec![0xABu8; 64];
        store.write(pid, &buf).unwrap();
        buf.fill(0);
        store.read(pid, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn negative_pid_is_rejected() {
        let mut store = PageStore::in_memory(64);
        let buf = vec![0u8; 64];
        assert!(matches!(store.write(-1, &buf), Err(Error::InvalidPid)));
    }

    #[test]
    fn write_at_end_pid_allocates() {
        let mut store = PageStore::in_memory(32);
        let buf = vec![1u8; 32];
        let end = store.end_pid().unwrap();
        store.write(end, &buf).unwrap();
        assert_eq!(store.end_pid().unwrap(), end + 1);
    }
}
