//! Paged B+Tree storage engine.
//!
//! The on-disk model follows BoltDB: fixed-size pages with a 16-byte
//! big-endian header, a forward-growing directory of 16-byte element slots
//! sorted by key, and key/value payloads growing backward from the end of
//! the page. Values too large for a leaf spill into chains of overflow
//! pages. A [`PageManager`] owns the file and an LRU-bounded page cache;
//! [`BTreeEngine`] implements the storage contract on top of it.

pub mod page;
pub mod pager;
pub mod tree;

pub use page::{Element, Page};
pub use pager::{PageId, PageManager, DEFAULT_PAGE_SIZE};
pub use tree::{BTreeEngine, TreeStats};
