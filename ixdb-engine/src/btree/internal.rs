//! Internal node codec:
//! `[keyCount: i32][firstChild: i32][ (key, childPid): i32×2 ]*`, zero
//! padding to the page boundary.
//!
//! Child `i` (0-based, `i == 0` being `firstChild`) covers every key less
//! than `entries[i].key` (or everything, for `firstChild`); child
//! `keyCount` covers everything `>= entries[keyCount - 1].key`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::types::PageId;

const ENTRY_SIZE: usize = 8;
const HEADER_SIZE: usize = 8; // keyCount + firstChild

pub const fn capacity(page_size: usize) -> usize {
    (page_size - HEADER_SIZE) / ENTRY_SIZE
}

pub struct InternalNode {
    buf: Vec<u8>,
}

impl InternalNode {
    pub fn empty(page_size: usize) -> Self {
        InternalNode {
            buf: vec![0u8; page_size],
        }
    }

    pub fn from_bytes(buf: Vec<u8>) -> Self {
        InternalNode { buf }
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
        (&mut self.buf[0..4]).write_i32::<LittleEndian>(n).unwrap();
    }

    pub fn first_child(&self) -> PageId {
        (&self.buf[4..8]).read_i32::<LittleEndian>().unwrap()
    }

    fn set_first_child(&mut self, pid: PageId) {
        (&mut self.buf[4..8]).write_i32::<LittleEndian>(pid).unwrap();
    }

    fn entry_offset(eid: usize) -> usize {
        HEADER_SIZE + eid * ENTRY_SIZE
    }

    pub fn read_entry(&self, eid: i32) -> Result<(i32, PageId)> {
        if eid < 0 || eid >= self.key_count() {
            return Err(Error::InvalidCursor);
        }
        let off = Self::entry_offset(eid as usize);
        let mut cur = Cursor::new(&self.buf[off..off + ENTRY_SIZE]);
        let key = cur.read_i32::<LittleEndian>().unwrap();
        let pid = cur.read_i32::<LittleEndian>().unwrap();
        Ok((key, pid))
    }

    fn write_entry(&mut self, eid: usize, key: i32, pid: PageId) {
        let off = Self::entry_offset(eid);
        let mut slice = &mut self.buf[off..off + ENTRY_SIZE];
        slice.write_i32::<LittleEndian>(key).unwrap();
        slice.write_i32::<LittleEndian>(pid).unwrap();
    }

    /// Same contract as `LeafNode::locate`.
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

    /// The child pointer to descend into for `search_key`, per the
    /// subtree-range invariant: child `i` holds everything in
    /// `[entries[i-1].key, entries[i].key)` (with `entries[-1].key = -inf`
    /// standing for `first_child`, and `entries[keyCount].key = +inf`).
    pub fn locate_child(&self, search_key: i32) -> PageId {
        let n = self.key_count();
        for eid in 0..n {
            let (key, _) = self.read_entry(eid).unwrap();
            if search_key < key {
                return if eid == 0 {
                    self.first_child()
                } else {
                    self.read_entry(eid - 1).unwrap().1
                };
            }
        }
        if n == 0 {
            self.first_child()
        } else {
            self.read_entry(n - 1).unwrap().1
        }
    }

    pub fn children(&self) -> Vec<PageId> {
        let mut out = vec![self.first_child()];
        for eid in 0..self.key_count() {
            out.push(self.read_entry(eid).unwrap().1);
        }
        out
    }

    fn shift_right(&mut self, from: usize, len: usize) {
        for eid in (from..len).rev() {
            let src = Self::entry_offset(eid);
            let dst = Self::entry_offset(eid + 1);
            let bytes = self.buf[src..src + ENTRY_SIZE].to_vec();
            self.buf[dst..dst + ENTRY_SIZE].copy_from_slice(&bytes);
        }
    }

    pub fn insert(&mut self, key: i32, child_pid: PageId) -> Result<()> {
        let n = self.key_count();
        if n as usize >= self.capacity() {
            return Err(Error::NodeFull);
        }
        let (i, _) = self.locate(key);
        self.shift_right(i as usize, n as usize);
        self.write_entry(i as usize, key, child_pid);
        self.set_key_count(n + 1);
        Ok(())
    }

    pub fn initialize_root(&mut self, left_pid: PageId, key: i32, right_pid: PageId) {
        self.buf.iter_mut().for_each(|b| *b = 0);
        self.set_first_child(left_pid);
        self.write_entry(0, key, right_pid);
        self.set_key_count(1);
    }

    /// Split a full internal node with `sibling` (must be empty). Returns
    /// the separator key that the caller inserts into the parent.
    ///
    /// Unlike a leaf split, a separator is *consumed*, not copied: the
    /// median entry's key moves up to the parent and its child pointer
    /// becomes `sibling.first_child`. Mixing this push-up discipline with
    /// the leaf's copy-up discipline corrupts routing, so the three cases
    /// below are kept distinct even though they look similar.
    pub fn insert_and_split(
        &mut self,
        key: i32,
        child_pid: PageId,
        sibling: &mut InternalNode,
    ) -> Result<i32> {
        let cap = self.capacity();
        if self.key_count() as usize != cap {
            return Err(Error::InvalidArgument("internal node is not full"));
        }
        if sibling.key_count() != 0 {
            return Err(Error::InvalidArgument("sibling is not empty"));
        }

        let (i, _) = self.locate(key);
        let i = i as usize;
        let pivot = cap / 2;

        let mut entries: Vec<(i32, PageId)> = (0..cap as i32)
            .map(|eid| self.read_entry(eid).unwrap())
            .collect();

        let (mid_key, mid_child, left, right);
        if i == pivot {
            // The inserted key is itself the separator.
            mid_key = key;
            mid_child = child_pid;
            left = entries[..pivot].to_vec();
            right = entries[pivot..].to_vec();
        } else if i < pivot {
            entries.insert(i, (key, child_pid));
            mid_key = entries[pivot].0;
            mid_child = entries[pivot].1;
            left = entries[..pivot].to_vec();
            right = entries[pivot + 1..].to_vec();
        } else {
            entries.insert(i, (key, child_pid));
            // `i` was computed before the insert but `entries` now has one
            // extra element ahead of the split point, so the separator
            // sits one earlier than a naive `pivot` index would suggest.
            let sep = pivot;
            mid_key = entries[sep].0;
            mid_child = entries[sep].1;
            left = entries[..sep].to_vec();
            right = entries[sep + 1..].to_vec();
        }

        for (eid, (k, p)) in left.iter().enumerate() {
            self.write_entry(eid, *k, *p);
        }
        self.set_key_count(left.len() as i32);

        sibling.set_first_child(mid_child);
        for (eid, (k, p)) in right.iter().enumerate() {
            sibling.write_entry(eid, *k, *p);
        }
        sibling.set_key_count(right.len() as i32);

        Ok(mid_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_child_routes_by_range() {
        let mut node = InternalNode::empty(64);
        node.initialize_root(100, 50, 200);
        assert_eq!(node.locate_child(10), 100);
        assert_eq!(node.locate_child(50), 200);
        assert_eq!(node.locate_child(999), 200);
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let mut node = InternalNode::empty(64);
        node.initialize_root(1, 50, 2);
        node.insert(20, 3).unwrap();
        node.insert(80, 4).unwrap();
        let keys: Vec<i32> = (0..node.key_count())
            .map(|eid| node.read_entry(eid).unwrap().0)
            .collect();
        assert_eq!(keys, vec![20, 50, 80]);
    }

    #[test]
    fn split_preserves_routing_invariant() {
        let page_size = 64;
        let cap = capacity(page_size);
        let mut node = InternalNode::empty(page_size);
        node.initialize_root(0, 10, 1);
        for i in 1..cap {
            node.insert((i as i32 + 1) * 10, (i as i32) + 1).unwrap();
        }
        assert_eq!(node.key_count() as usize, cap);

        let mut sibling = InternalNode::empty(page_size);
        let new_key = (cap as i32 + 2) * 10;
        let mid = node
            .insert_and_split(new_key, 999, &mut sibling)
            .unwrap();

        assert_eq!(
            node.key_count() + sibling.key_count(),
            cap as i32,
            "the median key is consumed as the separator, not duplicated"
        );

        let left_keys: Vec<i32> = (0..node.key_count())
            .map(|eid| node.read_entry(eid).unwrap().0)
            .collect();
        let right_keys: Vec<i32> = (0..sibling.key_count())
            .map(|eid| sibling.read_entry(eid).unwrap().0)
            .collect();
        assert!(left_keys.iter().all(|&k| k < mid));
        assert!(right_keys.iter().all(|&k| k > mid));
    }
}
