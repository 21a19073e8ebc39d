//! Core of a disk-resident B+Tree secondary index: page-oriented node
//! codecs, the insert/split/root-grow algorithm, a forward-scanning
//! cursor, a predicate-folding query planner and the executor glue that
//! drives either the index or a full table scan.

pub mod btree;
pub mod error;
pub mod planner;
pub mod runner;
pub mod storage;
pub mod types;

pub use btree::BTreeIndex;
pub use error::{Error, Result};
pub use planner::{Attr, CmpOp, Literal, Plan, Predicate, ScanPlanner};
pub use runner::{Projection, QueryResult, Row, SelectRunner};
pub use storage::{OpenMode, PageStore, RecordStore};
pub use types::{IndexCursor, PageId, RecordId};
