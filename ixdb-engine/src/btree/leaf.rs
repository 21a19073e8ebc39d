//! Leaf node codec: `[keyCount: i32][ (key, rid.pid, rid.sid): i32×3 ]*`,
//! zero padding, `[nextPid: i32]` in the trailing four bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::types::RecordId;

/// Size in bytes of one `(key, rid)` entry.
const ENTRY_SIZE: usize = 12;
/// `keyCount` header.
const HEADER_SIZE: usize = 4;
/// Trailing `nextPid`.
const TRAILER_SIZE: usize = 4;

/// Maximum number of entries a leaf of `page_size` bytes can hold.
pub const fn capacity(page_size: usize) -> usize {
    (page_size - HEADER_SIZE - TRAILER_SIZE) / ENTRY_SIZE
}

/// A leaf page of the index, loaded into memory for the duration of one
/// operation.
pub struct LeafNode {
    buf: Vec<u8>,
}

impl LeafNode {
    /// A fresh, empty leaf with `next_pid` left at `0` (sentinel).
    pub fn empty(page_size: usize) -> Self {
        LeafNode {
            buf: vec![0u8; page_size],
        }
    }

    pub fn from_bytes(buf: Vec<u8>) -> Self {
        LeafNode { buf }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn capacity(&self) -> usize {
        capacity(self.buf.len())
    }

    pub fn key_count(&self) -> i32 {
        (&self.buf[0..4]).read_i32::<LittleEndian>().unwrap()
    }

    fn set_key_count(&mut self, n: i32) {
        (&mut self.buf[0..4])
            .write_i32::<LittleEndian>(n)
            .unwrap();
    }

    fn entry_offset(eid: usize) -> usize {
        HEADER_SIZE + eid * ENTRY_SIZE
    }

    /// Read the `eid`-th `(key, rid)` pair. Fails `InvalidCursor` if `eid`
    /// is out of `[0, key_count())`.
    pub fn read_entry(&self, eid: i32) -> Result<(i32, RecordId)> {
        if eid < 0 || eid >= self.key_count() {
            return Err(Error::InvalidCursor);
        }
        let off = Self::entry_offset(eid as usize);
        let mut cur = Cursor::new(&self.buf[off..off + ENTRY_SIZE]);
        let key = cur.read_i32::<LittleEndian>().unwrap();
        let pid = cur.read_i32::<LittleEndian>().unwrap();
        let sid = cur.read_i32::<LittleEndian>().unwrap();
        Ok((key, RecordId::new(pid, sid)))
    }

    fn write_entry(&mut self, eid: usize, key: i32, rid: RecordId) {
        let off = Self::entry_offset(eid);
        let mut slice = &mut self.buf[off..off + ENTRY_SIZE];
        slice.write_i32::<LittleEndian>(key).unwrap();
        slice.write_i32::<LittleEndian>(rid.pid).unwrap();
        slice.write_i32::<LittleEndian>(rid.sid).unwrap();
    }

    /// Smallest `eid` with `entries[eid].key == search_key` (found), or the
    /// smallest `eid` with `entries[eid].key > search_key` (not found), or
    /// `key_count()` if `search_key` exceeds every key.
    pub fn locate(&self, search_key: i32) -> (i32, bool) {
        let n = self.key_count();
        for eid in 0..n {
            let (key, _) = self.read_entry(eid).unwrap();
            if key == search_key {
                return (eid, true);
            }
            if key > search_key {
                return (eid, false);
            }
        }
        (n, false)
    }

    pub fn get_next_pid(&self) -> i32 {
        let off = self.buf.len() - TRAILER_SIZE;
        (&self.buf[off..off + 4]).read_i32::<LittleEndian>().unwrap()
    }

    pub fn set_next_pid(&mut self, pid: i32) -> Result<()> {
        if pid < 0 {
            return Err(Error::InvalidPid);
        }
        let off = self.buf.len() - TRAILER_SIZE;
        (&mut self.buf[off..off + 4])
            .write_i32::<LittleEndian>(pid)
            .unwrap();
        Ok(())
    }

    /// Insert `(key, rid)` in sorted position. Fails `NodeFull` if the leaf
    /// is already at capacity.
    pub fn insert(&mut self, key: i32, rid: RecordId) -> Result<()> {
        let n = self.key_count();
        if n as usize >= self.capacity() {
            return Err(Error::NodeFull);
        }
        let (i, _) = self.locate(key);
        self.shift_right(i as usize, n as usize);
        self.write_entry(i as usize, key, rid);
        self.set_key_count(n + 1);
        Ok(())
    }

    fn shift_right(&mut self, from: usize, len: usize) {
        for eid in (from..len).rev() {
            let src = Self::entry_offset(eid);
            let dst = Self::entry_offset(eid + 1);
            let bytes = self.buf[src..src + ENTRY_SIZE].to_vec();
            self.buf[dst..dst + ENTRY_SIZE].copy_from_slice(&bytes);
        }
    }

    /// Split a full leaf with `sibling` (which must be empty). Returns the
    /// first key of `sibling` - the leaf's copy-up separator.
    ///
    /// Pivot rule: insertion index `i <= cap/2` goes left of the split
    /// (pivot at `cap/2`); otherwise it goes right (pivot at `cap/2 + 1`).
    /// `sibling.next_pid` inherits `self.next_pid`; the caller links
    /// `self.next_pid` to the sibling's assigned page id once it knows it.
    pub fn insert_and_split(
        &mut self,
        key: i32,
        rid: RecordId,
        sibling: &mut LeafNode,
    ) -> Result<i32> {
        let cap = self.capacity();
        if self.key_count() as usize != cap {
            return Err(Error::InvalidArgument("leaf is not full"));
        }
        if sibling.key_count() != 0 {
            return Err(Error::InvalidArgument("sibling is not empty"));
        }

        let (i, _) = self.locate(key);
        let i = i as usize;
        // Whichever side absorbs the new entry, splitting the augmented
        // (cap + 1)-entry sequence at this fixed point always lands the
        // insertion on the correct side.
        let split_point = cap / 2 + 1;

        let mut entries: Vec<(i32, RecordId)> = (0..cap as i32)
            .map(|eid| self.read_entry(eid).unwrap())
            .collect();
        entries.insert(i, (key, rid));

        let (left, right) = entries.split_at(split_point);
        let left = left.to_vec();
        let right = right.to_vec();

        for (eid, (k, r)) in left.iter().enumerate() {
            self.write_entry(eid, *k, *r);
        }
        self.set_key_count(left.len() as i32);

        for (eid, (k, r)) in right.iter().enumerate() {
            sibling.write_entry(eid, *k, *r);
        }
        sibling.set_key_count(right.len() as i32);
        sibling.set_next_pid(self.get_next_pid())?;

        Ok(right[0].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: i32) -> RecordId {
        RecordId::new(n, n)
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let mut leaf = LeafNode::empty(128);
        leaf.insert(5, rid(5)).unwrap();
        leaf.insert(1, rid(1)).unwrap();
        leaf.insert(3, rid(3)).unwrap();
        let keys: Vec<i32> = (0..leaf.key_count())
            .map(|eid| leaf.read_entry(eid).unwrap().0)
            .collect();
        assert_eq!(keys, vec![1, 3, 5]);
    }

    #[test]
    fn locate_distinguishes_found_and_insertion_point() {
        let mut leaf = LeafNode::empty(128);
        for k in [10, 20, 30] {
            leaf.insert(k, rid(k)).unwrap();
        }
        assert_eq!(leaf.locate(20), (1, true));
        assert_eq!(leaf.locate(15), (1, false));
        assert_eq!(leaf.locate(99), (3, false));
    }

    #[test]
    fn insert_past_capacity_fails_node_full() {
        let cap = capacity(128);
        let mut leaf = LeafNode::empty(128);
        for k in 0..cap as i32 {
            leaf.insert(k, rid(k)).unwrap();
        }
        assert!(matches!(leaf.insert(cap as i32, rid(0)), Err(Error::NodeFull)));
    }

    #[test]
    fn split_distributes_entries_and_links_sibling() {
        let page_size = 128;
        let cap = capacity(page_size);
        let mut leaf = LeafNode::empty(page_size);
        for k in 0..cap as i32 {
            leaf.insert(k * 2, rid(k)).unwrap();
        }
        leaf.set_next_pid(77).unwrap();

        let mut sibling = LeafNode::empty(page_size);
        let sep = leaf
            .insert_and_split(1, rid(1), &mut sibling)
            .unwrap();

        assert_eq!(leaf.key_count() + sibling.key_count(), cap as i32 + 1);
        assert_eq!(sibling.get_next_pid(), 77);

        let mut all_keys = Vec::new();
        for eid in 0..leaf.key_count() {
            all_keys.push(leaf.read_entry(eid).unwrap().0);
        }
        for eid in 0..sibling.key_count() {
            all_keys.push(sibling.read_entry(eid).unwrap().0);
        }
        let mut sorted = all_keys.clone();
        sorted.sort();
        assert_eq!(all_keys, sorted, "left/right halves stay sorted end to end");
        assert_eq!(sep, sibling.read_entry(0).unwrap().0);
    }
}
