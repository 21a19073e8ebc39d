pub mod page_store;
pub mod record_store;

pub use page_store::{OpenMode, PageStore};
pub use record_store::RecordStore;
