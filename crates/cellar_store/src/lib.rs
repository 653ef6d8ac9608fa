//! Client library for the cellar sorted cell store.
//!
//! Tables hold versioned cells addressed by `(row, family, qualifier,
//! timestamp)`. Rows are ordered by their opaque byte-string key and a table
//! can be split into contiguous key-range partitions. Two engines implement
//! the same trait seams: a fjall-backed store for production use and an
//! in-memory store with fault injection for tests.

pub mod error;
pub mod escape;
pub mod fjall_store;
pub mod mem;
pub mod model;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use fjall_store::FjallStore;
pub use mem::MemStore;
pub use model::{Cell, CellKind, KeyRange, TableDesc, TableName};
pub use store::{Connection, ConnectionFactory, RowKeyScan, Table};
