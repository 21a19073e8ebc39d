pub mod index;
pub mod internal;
pub mod leaf;

pub use index::BTreeIndex;
pub use internal::InternalNode;
pub use leaf::LeafNode;
