//! Append-only heap table.
//!
//! Records are packed into fixed-size pages with a slot directory, the same
//! layout discipline as a Btrieve data page, without the free-list/deletion
//! bookkeeping - this store never deletes or updates a record in place.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::Cursor as IoCursor;
use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::storage::page_store::{OpenMode, PageStore};
use crate::types::RecordId;

/// Size of a slot directory entry: `(offset: u16, length: u16)`.
const SLOT_SIZE: usize = 4;
/// Page header: `slot_count: u16`.
const HEADER_SIZE: usize = 2;

/// Append-only heap of `(key, value)` tuples.
pub struct RecordStore<F> {
    store: PageStore<F>,
    /// Page currently being appended to; `None` until the first append or
    /// after reopening (lazily located on first use).
    tail_pid: Option<i32>,
}

impl<F: Read + Write + Seek> RecordStore<F> {
    pub fn new(store: PageStore<F>) -> Self {
        RecordStore {
            store,
            tail_pid: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Append `(key, value)`, returning the assigned record id.
    pub fn append(&mut self, key: i32, value: &str) -> Result<RecordId> {
        let encoded = encode_record(key, value);
        let page_size = self.page_size();

        let tail = self.locate_tail()?;
        let mut buf = vec![0u8; page_size];
        let mut slot_count = 0u16;
        if tail < self.store.end_pid()? {
            self.store.read(tail, &mut buf)?;
            slot_count = (&buf[0..2]).read_u16::<LittleEndian>()?;
        }

        if let Some(sid) = try_insert(&mut buf, slot_count, &encoded) {
            self.store.write(tail, &buf)?;
            self.tail_pid = Some(tail);
            return Ok(RecordId::new(tail, sid as i32));
        }

        let fresh = self.store.allocate()?;
        let mut buf = vec![0u8; page_size];
        let sid = try_insert(&mut buf, 0, &encoded).ok_or_else(|| {
            Error::InvalidArgument("record does not fit in an empty page")
        })?;
        self.store.write(fresh, &buf)?;
        self.tail_pid = Some(fresh);
        Ok(RecordId::new(fresh, sid as i32))
    }

    /// Read the `(key, value)` tuple stored at `rid`.
    pub fn read(&mut self, rid: RecordId) -> Result<(i32, String)> {
        let page_size = self.page_size();
        let mut buf = vec![0u8; page_size];
        self.store.read(rid.pid, &mut buf)?;
        let slot_count = (&buf[0..2]).read_u16::<LittleEndian>()?;
        if rid.sid < 0 || rid.sid as u16 >= slot_count {
            return Err(Error::InvalidArgument("record id out of range"));
        }
        let slot_offset = page_size - SLOT_SIZE * (rid.sid as usize + 1);
        let offset = (&buf[slot_offset..slot_offset + 2]).read_u16::<LittleEndian>()? as usize;
        let length =
            (&buf[slot_offset + 2..slot_offset + 4]).read_u16::<LittleEndian>()? as usize;
        decode_record(&buf[offset..offset + length])
    }

    /// One past the highest record id ever appended; `rid < end_rid()`
    /// reaches every live record via `(pid, sid)` lexicographic order.
    pub fn end_rid(&mut self) -> Result<RecordId> {
        let end_pid = self.store.end_pid()?;
        if end_pid == 0 {
            return Ok(RecordId::new(0, 0));
        }
        let last_pid = end_pid - 1;
        let page_size = self.page_size();
        let mut buf = vec![0u8; page_size];
        self.store.read(last_pid, &mut buf)?;
        let slot_count = (&buf[0..2]).read_u16::<LittleEndian>()?;
        Ok(RecordId::new(last_pid, slot_count as i32))
    }

    /// Sequential scan over every `(rid, key, value)` from the start of the
    /// heap.
    pub fn scan(&mut self) -> Result<Vec<(RecordId, i32, String)>> {
        let end = self.end_rid()?;
        let mut out = Vec::new();
        let page_size = self.page_size();
        for pid in 0..self.store.end_pid()? {
            let mut buf = vec![0u8; page_size];
            self.store.read(pid, &mut buf)?;
            let slot_count = (&buf[0..2]).read_u16::<LittleEndian>()?;
            for sid in 0..slot_count {
                let slot_offset = page_size - SLOT_SIZE * (sid as usize + 1);
                let offset =
                    (&buf[slot_offset..slot_offset + 2]).read_u16::<LittleEndian>()? as usize;
                let length = (&buf[slot_offset + 2..slot_offset + 4])
                    .read_u16::<LittleEndian>()? as usize;
                let (key, value) = decode_record(&buf[offset..offset + length])?;
                let rid = RecordId::new(pid, sid as i32);
                if rid < end {
                    out.push((rid, key, value));
                }
            }
        }
        Ok(out)
    }

    fn locate_tail(&mut self) -> Result<i32> {
        if let Some(pid) = self.tail_pid {
            return Ok(pid);
        }
        let end = self.store.end_pid()?;
        let tail = if end == 0 { 0 } else { end - 1 };
        Ok(tail)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}

impl RecordStore<File> {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let store = PageStore::<File>::open(path, mode)?;
        Ok(RecordStore::new(store))
    }

    pub fn open_with_page_size(path: &Path, mode: OpenMode, page_size: usize) -> Result<Self> {
        let store = PageStore::<File>::open_with_page_size(path, mode, page_size)?;
        Ok(RecordStore::new(store))
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl RecordStore<IoCursor<Vec<u8>>> {
    pub fn in_memory(page_size: usize) -> Self {
        RecordStore::new(PageStore::in_memory(page_size))
    }
}

/// `key: i32` then `value_len: u16` then the value bytes.
fn encode_record(key: i32, value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(6 + value.len());
    buf.write_i32::<LittleEndian>(key).unwrap();
    buf.write_u16::<LittleEndian>(value.len() as u16).unwrap();
    buf.extend_from_slice(value.as_bytes());
    buf
}

fn decode_record(bytes: &[u8]) -> Result<(i32, String)> {
    let mut cursor = IoCursor::new(bytes);
    let key = cursor
        .read_i32::<LittleEndian>()
        .map_err(|e| Error::FormatError(e.to_string()))?;
    let len = cursor
        .read_u16::<LittleEndian>()
        .map_err(|e| Error::FormatError(e.to_string()))? as usize;
    let start = 6;
    let value = String::from_utf8(bytes[start..start + len].to_vec())
        .map_err(|e| Error::FormatError(e.to_string()))?;
    Ok((key, value))
}

/// Attempt to place `encoded` into `buf` (a full page, header already
/// populated with the existing `slot_count`). Returns the new slot id on
/// success, leaving `buf` updated; leaves `buf` untouched on failure.
fn try_insert(buf: &mut [u8], slot_count: u16, encoded: &[u8]) -> Option<u16> {
    let page_size = buf.len();
    let data_start = HEADER_SIZE + existing_data_len(buf, slot_count);
    let slot_dir_start = page_size - SLOT_SIZE * (slot_count as usize + 1);
    if data_start + encoded.len() > slot_dir_start {
        return None;
    }

    buf[data_start..data_start + encoded.len()].copy_from_slice(encoded);
    (&mut buf[slot_dir_start..slot_dir_start + 2])
        .write_u16::<LittleEndian>(data_start as u16)
        .unwrap();
    (&mut buf[slot_dir_start + 2..slot_dir_start + 4])
        .write_u16::<LittleEndian>(encoded.len() as u16)
        .unwrap();
    (&mut buf[0..2])
        .write_u16::<LittleEndian>(slot_count + 1)
        .unwrap();
    Some(slot_count)
}

/// Sum of record lengths already stored in the page's data area, derived
/// from the slot directory so the data area can be appended to
/// contiguously.
fn existing_data_len(buf: &[u8], slot_count: u16) -> usize {
    let page_size = buf.len();
    let mut max_end = 0usize;
    for sid in 0..slot_count {
        let slot_offset = page_size - SLOT_SIZE * (sid as usize + 1);
        let offset = (&buf[slot_offset..slot_offset + 2])
            .read_u16::<LittleEndian>()
            .unwrap() as usize;
        let length = (&buf[slot_offset + 2..slot_offset + 4])
            .read_u16::<LittleEndian>()
            .unwrap() as usize;
        max_end = max_end.max(offset + length);
    }
    max_end.max(HEADER_SIZE) - HEADER_SIZE
}
