//! Trait seams between the tools and a store engine.
//!
//! One factory serves a whole job; each worker takes its own connection and
//! its own table handles, and never shares them. Handles are independently
//! closeable, and closing is idempotent at the call sites that matter, so
//! engines only need to reject use-after-close.

use crate::error::StoreResult;
use crate::model::{Cell, KeyRange, TableDesc, TableName};

/// Lazy sequence of row keys in key order. Finite, not restartable; create a
/// fresh scan to walk the range again.
pub type RowKeyScan = Box<dyn Iterator<Item = StoreResult<Vec<u8>>>>;

/// Handle to one table over one connection.
pub trait Table: Send {
    /// Full point-read of a row: every family, every version. Returns an
    /// empty vector when the row is absent.
    fn get_row(&self, row: &[u8]) -> StoreResult<Vec<Cell>>;

    /// Write one cell. The cell's family must exist in the table.
    fn put_cell(&self, cell: &Cell) -> StoreResult<()>;

    /// Enumerate row keys in `range`, restricted to rows with at least one
    /// cell in `families` (empty slice means no restriction). Uses identity
    /// metadata only; cell values are never materialized.
    fn scan_row_keys(&self, range: &KeyRange, families: &[String]) -> StoreResult<RowKeyScan>;

    fn close(&mut self) -> StoreResult<()>;
}

/// One store connection, exclusively owned by its user.
pub trait Connection: Send {
    fn table(&self, name: &TableName) -> StoreResult<Box<dyn Table>>;

    fn table_desc(&self, name: &TableName) -> StoreResult<TableDesc>;

    fn create_table(&self, name: &TableName, desc: &TableDesc) -> StoreResult<()>;

    fn close(&mut self) -> StoreResult<()>;
}

/// Hands out connections; shared across workers, cheap to clone via `Arc`.
pub trait ConnectionFactory: Send + Sync + 'static {
    fn connect(&self) -> StoreResult<Box<dyn Connection>>;
}
