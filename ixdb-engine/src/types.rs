//! Core identifiers shared across the storage substrate and the B+Tree.

/// A page id. Non-negative; `0` is reserved for index metadata.
pub type PageId = i32;

/// A record id: the heap page and slot a tuple lives in.
///
/// Ordered lexicographically on `(pid, sid)`, which matches append order in
/// [`crate::storage::record_store::RecordStore`] and lets callers do
/// `rid < store.end_rid()` sequential scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub sid: i32,
}

impl RecordId {
    pub const fn new(pid: PageId, sid: i32) -> Self {
        RecordId { pid, sid }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.pid, self.sid)
    }
}

/// A position within the leaf chain: the leaf page holding the entry and
/// the entry's index within that leaf.
///
/// `pid == 0` is the sentinel meaning "exhausted" - page 0 is always index
/// metadata and never a leaf, so it can never be a live cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCursor {
    pub pid: PageId,
    pub eid: i32,
}

impl IndexCursor {
    pub const EXHAUSTED: IndexCursor = IndexCursor { pid: 0, eid: 0 };

    pub const fn new(pid: PageId, eid: i32) -> Self {
        IndexCursor { pid, eid }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pid == 0
    }
}
