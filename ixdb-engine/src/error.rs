//! Error kinds shared by the storage substrate, the B+Tree and the planner.

use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes for the index core.
///
/// `NodeFull` is strictly local to `btree::leaf` / `btree::internal` and the
/// split handling inside `BTreeIndex::insert`; it must never escape a public
/// `BTreeIndex` method. `NoSuchRecord` is informational - a cursor returned
/// alongside it is still valid and can be advanced with `read_forward`.
#[derive(Error, Debug)]
pub enum Error {
    /// A leaf or internal node has no room for another entry.
    #[error("node is full")]
    NodeFull,

    /// The requested key is not present in the index.
    #[error("no such record")]
    NoSuchRecord,

    /// A cursor is exhausted or otherwise out of range.
    #[error("invalid cursor")]
    InvalidCursor,

    /// A page id is negative or otherwise out of range.
    #[error("invalid page id")]
    InvalidPid,

    /// A precondition on an operation's arguments was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The underlying page or record store failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A page's header did not parse to sane values.
    #[error("corrupt format: {0}")]
    FormatError(String),
}
