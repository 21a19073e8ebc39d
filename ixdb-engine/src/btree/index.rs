//! The B+Tree index itself: open/close lifecycle, insertion with
//! bottom-up split propagation and root growth, point locate, and
//! forward-scanning cursors.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Cursor as IoCursor, Read, Seek, Write};
use std::path::Path;

use crate::btree::internal::InternalNode;
use crate::btree::leaf::LeafNode;
use crate::error::{Error, Result};
use crate::storage::page_store::{OpenMode, PageStore};
use crate::types::{IndexCursor, PageId, RecordId};

/// What an insert at one tree level hands back to its caller: either it
/// was absorbed without a split, or it overflowed and the caller must try
/// to insert `(key, pid)` itself (and may overflow in turn).
enum SplitOutcome {
    Done,
    Overflow { key: i32, pid: PageId },
}

/// A disk-resident B+Tree secondary index over an integer key.
pub struct BTreeIndex<F> {
    store: PageStore<F>,
    root_pid: PageId,
    height: i32,
}

impl<F: Read + Write + Seek> BTreeIndex<F> {
    /// Adopt persisted metadata from `store`. `(root_pid: -1, height: 0)` is
    /// the valid empty-index sentinel a clean `close` writes; anything else
    /// that fails the sanity check is treated as corrupt and the index
    /// falls back to empty with a warning. Opening an empty store
    /// read-only fails.
    pub fn open_store(mut store: PageStore<F>, mode: OpenMode) -> Result<Self> {
        let end = store.end_pid()?;
        if end == 0 {
            if mode == OpenMode::ReadOnly {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "cannot open an empty index read-only",
                )));
            }
            return Ok(BTreeIndex {
                store,
                root_pid: -1,
                height: 0,
            });
        }

        let page_size = store.page_size();
        let mut buf = vec![0u8; page_size];
        store.read(0, &mut buf)?;
        let root_pid = (&buf[0..4]).read_i32::<LittleEndian>().unwrap();
        let height = (&buf[4..8]).read_i32::<LittleEndian>().unwrap();

        if (root_pid > 0 && height >= 0) || (root_pid == -1 && height == 0) {
            Ok(BTreeIndex {
                store,
                root_pid,
                height,
            })
        } else {
            tracing::warn!(root_pid, height, "index metadata failed sanity check, starting empty");
            Ok(BTreeIndex {
                store,
                root_pid: -1,
                height: 0,
            })
        }
    }

    /// Persist `(root_pid, height)` to page 0 and flush the backing store.
    pub fn flush(&mut self) -> Result<()> {
        let page_size = self.store.page_size();
        let mut buf = vec![0u8; page_size];
        (&mut buf[0..4]).write_i32::<LittleEndian>(self.root_pid).unwrap();
        (&mut buf[4..8]).write_i32::<LittleEndian>(self.height).unwrap();
        self.store.write(0, &buf)?;
        self.store.flush()
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    pub fn root_pid(&self) -> PageId {
        self.root_pid
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Insert `(key, rid)`. Creates the first leaf and grows the root
    /// exactly once per overflow that bubbles all the way up, at depth 1.
    pub fn insert(&mut self, key: i32, rid: RecordId) -> Result<()> {
        if self.height == 0 {
            let page_size = self.page_size();
            let pid = self.store.end_pid()?.max(1);
            let mut leaf = LeafNode::empty(page_size);
            leaf.insert(key, rid)?;
            self.store.write(pid, &leaf.into_bytes())?;
            self.root_pid = pid;
            self.height = 1;
            return Ok(());
        }

        match self.insert_recursive(self.root_pid, 1, key, rid)? {
            SplitOutcome::Done => Ok(()),
            SplitOutcome::Overflow { key: sep, pid: sibling_pid } => {
                let page_size = self.page_size();
                let new_root_pid = self.store.end_pid()?;
                let mut new_root = InternalNode::empty(page_size);
                new_root.initialize_root(self.root_pid, sep, sibling_pid);
                self.store.write(new_root_pid, &new_root.into_bytes())?;
                self.root_pid = new_root_pid;
                self.height += 1;
                Ok(())
            }
        }
    }

    fn insert_recursive(
        &mut self,
        pid: PageId,
        depth: i32,
        key: i32,
        rid: RecordId,
    ) -> Result<SplitOutcome> {
        let page_size = self.page_size();

        if depth == self.height {
            let mut buf = vec![0u8; page_size];
            self.store.read(pid, &mut buf)?;
            let mut leaf = LeafNode::from_bytes(buf);

            match leaf.insert(key, rid) {
                Ok(()) => {
                    self.store.write(pid, &leaf.into_bytes())?;
                    Ok(SplitOutcome::Done)
                }
                Err(Error::NodeFull) => {
                    let mut sibling = LeafNode::empty(page_size);
                    let sep_key = leaf.insert_and_split(key, rid, &mut sibling)?;
                    let sibling_pid = self.store.end_pid()?;
                    leaf.set_next_pid(sibling_pid)?;
                    self.store.write(sibling_pid, &sibling.into_bytes())?;
                    self.store.write(pid, &leaf.into_bytes())?;
                    Ok(SplitOutcome::Overflow { key: sep_key, pid: sibling_pid })
                }
                Err(e) => Err(e),
            }
        } else {
            let mut buf = vec![0u8; page_size];
            self.store.read(pid, &mut buf)?;
            let mut node = InternalNode::from_bytes(buf);
            let child = node.locate_child(key);

            match self.insert_recursive(child, depth + 1, key, rid)? {
                SplitOutcome::Done => Ok(SplitOutcome::Done),
                SplitOutcome::Overflow { key: ok, pid: opid } => match node.insert(ok, opid) {
                    Ok(()) => {
                        self.store.write(pid, &node.into_bytes())?;
                        Ok(SplitOutcome::Done)
                    }
                    Err(Error::NodeFull) => {
                        let mut sibling = InternalNode::empty(page_size);
                        let mid_key = node.insert_and_split(ok, opid, &mut sibling)?;
                        let sibling_pid = self.store.end_pid()?;
                        self.store.write(sibling_pid, &sibling.into_bytes())?;
                        self.store.write(pid, &node.into_bytes())?;
                        Ok(SplitOutcome::Overflow { key: mid_key, pid: sibling_pid })
                    }
                    Err(e) => Err(e),
                },
            }
        }
    }

    /// Descend to the leaf that should hold `key`, populating `cursor`
    /// regardless of outcome. Returns `NoSuchRecord` if `key` is absent -
    /// the cursor is still valid and points just past it.
    pub fn locate(&mut self, key: i32, cursor: &mut IndexCursor) -> Result<()> {
        if self.height == 0 {
            *cursor = IndexCursor::EXHAUSTED;
            return Err(Error::NoSuchRecord);
        }

        let page_size = self.page_size();
        let mut pid = self.root_pid;
        for _ in 1..self.height {
            let mut buf = vec![0u8; page_size];
            self.store.read(pid, &mut buf)?;
            let node = InternalNode::from_bytes(buf);
            pid = node.locate_child(key);
        }

        let mut buf = vec![0u8; page_size];
        self.store.read(pid, &mut buf)?;
        let leaf = LeafNode::from_bytes(buf);
        let (eid, found) = leaf.locate(key);
        cursor.pid = pid;
        cursor.eid = eid;
        if found {
            Ok(())
        } else {
            Err(Error::NoSuchRecord)
        }
    }

    /// Emit the entry `cursor` currently points at, then advance it to the
    /// next entry in key order (rolling over to the next leaf via
    /// `nextPid` when the current leaf is exhausted).
    pub fn read_forward(&mut self, cursor: &mut IndexCursor) -> Result<(i32, RecordId)> {
        if cursor.pid == 0 {
            return Err(Error::InvalidCursor);
        }

        let page_size = self.page_size();
        let mut buf = vec![0u8; page_size];
        self.store.read(cursor.pid, &mut buf)?;
        let leaf = LeafNode::from_bytes(buf);
        let entry = leaf.read_entry(cursor.eid)?;

        cursor.eid += 1;
        if cursor.eid >= leaf.key_count() {
            cursor.pid = leaf.get_next_pid();
            cursor.eid = 0;
        }
        Ok(entry)
    }

    /// Sum of `keyCount` across every leaf, via a breadth-first traversal
    /// of the tree. Used for `count(*)` with no predicates.
    pub fn total_entries(&mut self) -> Result<i64> {
        if self.height == 0 {
            return Ok(0);
        }
        let page_size = self.page_size();
        let mut total = 0i64;
        let mut queue = VecDeque::new();
        queue.push_back((self.root_pid, 1));

        while let Some((pid, depth)) = queue.pop_front() {
            let mut buf = vec![0u8; page_size];
            self.store.read(pid, &mut buf)?;
            if depth == self.height {
                let leaf = LeafNode::from_bytes(buf);
                total += leaf.key_count() as i64;
            } else {
                let node = InternalNode::from_bytes(buf);
                for child in node.children() {
                    queue.push_back((child, depth + 1));
                }
            }
        }
        Ok(total)
    }
}

impl BTreeIndex<File> {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let store = PageStore::<File>::open(path, mode)?;
        Self::open_store(store, mode)
    }

    pub fn open_with_page_size(path: &Path, mode: OpenMode, page_size: usize) -> Result<Self> {
        let store = PageStore::<File>::open_with_page_size(path, mode, page_size)?;
        Self::open_store(store, mode)
    }
}

impl BTreeIndex<IoCursor<Vec<u8>>> {
    /// A fresh, empty in-memory index at the reference page size.
    pub fn in_memory(page_size: usize) -> Self {
        BTreeIndex {
            store: PageStore::in_memory(page_size),
            root_pid: -1,
            height: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: i32) -> RecordId {
        RecordId::new(n, n)
    }

    /// Matches the first concrete scenario: a single insert builds a
    /// depth-one tree rooted at page 1.
    #[test]
    fn single_insert_creates_root_leaf() {
        let mut idx = BTreeIndex::in_memory(1024);
        idx.insert(10, rid(2)).unwrap();
        assert_eq!(idx.root_pid(), 1);
        assert_eq!(idx.height(), 1);
    }

    #[test]
    fn locate_and_read_forward_walk_in_key_order() {
        let mut idx = BTreeIndex::in_memory(1024);
        idx.insert(10, rid(2)).unwrap();
        idx.insert(7, rid(5)).unwrap();

        let mut cursor = IndexCursor::EXHAUSTED;
        idx.locate(7, &mut cursor).unwrap();
        assert_eq!(idx.read_forward(&mut cursor).unwrap(), (7, rid(5)));
        assert_eq!(idx.read_forward(&mut cursor).unwrap(), (10, rid(2)));
    }

    #[test]
    fn inserting_past_leaf_capacity_splits_and_grows() {
        let mut idx = BTreeIndex::in_memory(1024);
        let cap = crate::btree::leaf::capacity(1024) as i32;
        for k in 0..cap {
            idx.insert(k, rid(k)).unwrap();
        }
        assert_eq!(idx.height(), 1, "not yet full");

        idx.insert(cap, rid(cap)).unwrap();
        assert_eq!(idx.height(), 2, "root grows exactly once past capacity");

        let mut cursor = IndexCursor::EXHAUSTED;
        idx.locate(0, &mut cursor).unwrap();
        for k in 0..=cap {
            assert_eq!(idx.read_forward(&mut cursor).unwrap(), (k, rid(k)));
        }
    }

    #[test]
    fn locate_missing_key_reports_no_such_record_but_cursor_still_advances() {
        let mut idx = BTreeIndex::in_memory(1024);
        idx.insert(10, rid(1)).unwrap();
        idx.insert(20, rid(2)).unwrap();

        let mut cursor = IndexCursor::EXHAUSTED;
        let err = idx.locate(15, &mut cursor).unwrap_err();
        assert!(matches!(err, Error::NoSuchRecord));
        assert_eq!(idx.read_forward(&mut cursor).unwrap(), (20, rid(2)));
    }

    #[test]
    fn total_entries_matches_insert_count_across_many_splits() {
        let mut idx = BTreeIndex::in_memory(256);
        let n = 2000;
        for k in 0..n {
            idx.insert(k, rid(k)).unwrap();
        }
        assert_eq!(idx.total_entries().unwrap(), n as i64);
        assert!(idx.height() >= 2, "this many keys must have grown the root");
    }

}
