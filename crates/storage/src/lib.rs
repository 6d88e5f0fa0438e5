#![forbid(unsafe_code)]

//! Disk-backed components: the tree storage engine and its SQLite backend,
//! the content cache and durable named counters.

mod backend;
mod content_cache;
mod counter;
mod error;
pub mod file_tree;
mod hooks;
mod sqlite;
mod store;

pub use backend::TreeBackend;
pub use content_cache::ContentCache;
pub use counter::Counter;
pub use error::StoreError;
pub use hooks::{NodeHooks, NodeOf};
pub use sqlite::SqliteTree;
pub use store::{StoreSummary, TreeStore};
