//! In-memory store engine.
//!
//! Backs unit and integration tests. `poison_row` marks a row so that the
//! full point-read fails while key enumeration still lists it, which is
//! exactly the shape of stored corruption the audit scanner exists to find.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::model::{Cell, KeyRange, TableDesc, TableName};
use crate::store::{Connection, ConnectionFactory, RowKeyScan, Table};

/// `(row, family, qualifier, Reverse(timestamp))`: newer versions of a column
/// sort first, matching the production engine's ordering.
type CellCoord = (Vec<u8>, String, Vec<u8>, Reverse<u64>);

#[derive(Clone)]
pub struct MemStore {
    inner: Arc<MemInner>,
}

#[derive(Default)]
struct MemInner {
    tables: RwLock<BTreeMap<String, MemTableData>>,
}

#[derive(Default)]
struct MemTableData {
    desc: TableDesc,
    cells: BTreeMap<CellCoord, (crate::model::CellKind, Vec<u8>)>,
    poisoned: BTreeMap<Vec<u8>, String>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemInner::default()),
        }
    }

    /// Make every subsequent point-read of `row` fail with a corruption
    /// error carrying `message`. Key enumeration still lists the row.
    pub fn poison_row(&self, table: &TableName, row: &[u8], message: &str) -> StoreResult<()> {
        let mut tables = self.inner.lock_write()?;
        let data = tables
            .get_mut(&table.to_string())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        data.poisoned.insert(row.to_vec(), message.to_string());
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemInner {
    fn lock_read(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, MemTableData>>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Engine("store lock poisoned".to_string()))
    }

    fn lock_write(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, MemTableData>>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Engine("store lock poisoned".to_string()))
    }
}

impl ConnectionFactory for MemStore {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        Ok(Box::new(MemConnection {
            inner: self.inner.clone(),
            closed: false,
        }))
    }
}

struct MemConnection {
    inner: Arc<MemInner>,
    closed: bool,
}

impl MemConnection {
    fn guard(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Connection for MemConnection {
    fn table(&self, name: &TableName) -> StoreResult<Box<dyn Table>> {
        self.guard()?;
        let tables = self.inner.lock_read()?;
        let key = name.to_string();
        if !tables.contains_key(&key) {
            return Err(StoreError::TableNotFound(key));
        }
        Ok(Box::new(MemTable {
            inner: self.inner.clone(),
            name: name.clone(),
            closed: false,
        }))
    }

    fn table_desc(&self, name: &TableName) -> StoreResult<TableDesc> {
        self.guard()?;
        let tables = self.inner.lock_read()?;
        tables
            .get(&name.to_string())
            .map(|data| data.desc.clone())
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn create_table(&self, name: &TableName, desc: &TableDesc) -> StoreResult<()> {
        self.guard()?;
        if desc.families.is_empty() {
            return Err(StoreError::InvalidDescriptor(
                "at least one column family is required".to_string(),
            ));
        }
        let mut tables = self.inner.lock_write()?;
        let key = name.to_string();
        if tables.contains_key(&key) {
            return Err(StoreError::TableExists(key));
        }
        tables.insert(
            key,
            MemTableData {
                desc: desc.clone(),
                ..MemTableData::default()
            },
        );
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }
}

struct MemTable {
    inner: Arc<MemInner>,
    name: TableName,
    closed: bool,
}

impl MemTable {
    fn with_data<T>(&self, f: impl FnOnce(&MemTableData) -> StoreResult<T>) -> StoreResult<T> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        let tables = self.inner.lock_read()?;
        let data = tables
            .get(&self.name.to_string())
            .ok_or_else(|| StoreError::TableNotFound(self.name.to_string()))?;
        f(data)
    }
}

impl Table for MemTable {
    fn get_row(&self, row: &[u8]) -> StoreResult<Vec<Cell>> {
        self.with_data(|data| {
            if let Some(message) = data.poisoned.get(row) {
                return Err(StoreError::Corruption(message.clone()));
            }
            let start: CellCoord = (row.to_vec(), String::new(), Vec::new(), Reverse(u64::MAX));
            let cells = data
                .cells
                .range((Bound::Included(start), Bound::Unbounded))
                .take_while(|((r, _, _, _), _)| r == row)
                .map(|((r, family, qualifier, ts), (kind, value))| Cell {
                    row: r.clone(),
                    family: family.clone(),
                    qualifier: qualifier.clone(),
                    timestamp_ms: ts.0,
                    kind: *kind,
                    value: value.clone(),
                })
                .collect();
            Ok(cells)
        })
    }

    fn put_cell(&self, cell: &Cell) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        let mut tables = self.inner.lock_write()?;
        let data = tables
            .get_mut(&self.name.to_string())
            .ok_or_else(|| StoreError::TableNotFound(self.name.to_string()))?;
        if !data.desc.families.iter().any(|f| f == &cell.family) {
            return Err(StoreError::UnknownFamily {
                table: self.name.to_string(),
                family: cell.family.clone(),
            });
        }
        data.cells.insert(
            (
                cell.row.clone(),
                cell.family.clone(),
                cell.qualifier.clone(),
                Reverse(cell.timestamp_ms),
            ),
            (cell.kind, cell.value.clone()),
        );
        Ok(())
    }

    fn scan_row_keys(&self, range: &KeyRange, families: &[String]) -> StoreResult<RowKeyScan> {
        self.with_data(|data| {
            let mut rows = BTreeSet::new();
            for ((row, family, _, _), _) in &data.cells {
                if !range.contains(row) {
                    continue;
                }
                if !families.is_empty() && !families.iter().any(|f| f == family) {
                    continue;
                }
                rows.insert(row.clone());
            }
            // Poisoned rows still exist as far as identity metadata goes.
            for row in data.poisoned.keys() {
                if range.contains(row) {
                    rows.insert(row.clone());
                }
            }
            Ok(Box::new(rows.into_iter().map(Ok)) as RowKeyScan)
        })
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemStore;
    use crate::error::StoreError;
    use crate::model::{Cell, CellKind, KeyRange, TableDesc, TableName};
    use crate::store::ConnectionFactory;

    fn cell(row: &[u8], family: &str, ts: u64) -> Cell {
        Cell {
            row: row.to_vec(),
            family: family.to_string(),
            qualifier: b"q".to_vec(),
            timestamp_ms: ts,
            kind: CellKind::Put,
            value: b"v".to_vec(),
        }
    }

    #[test]
    fn poisoned_rows_fail_reads_but_still_enumerate() {
        let store = MemStore::new();
        let name: TableName = "t".parse().unwrap();
        let conn = store.connect().unwrap();
        conn.create_table(&name, &TableDesc::new(vec!["f".into()]))
            .unwrap();
        let table = conn.table(&name).unwrap();
        table.put_cell(&cell(b"r1", "f", 1)).unwrap();
        table.put_cell(&cell(b"r2", "f", 1)).unwrap();
        store.poison_row(&name, b"r2", "bad block").unwrap();

        let keys: Vec<_> = table
            .scan_row_keys(&KeyRange::all(), &[])
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(keys, vec![b"r1".to_vec(), b"r2".to_vec()]);

        assert_eq!(table.get_row(b"r1").unwrap().len(), 1);
        match table.get_row(b"r2") {
            Err(StoreError::Corruption(message)) => assert_eq!(message, "bad block"),
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    #[test]
    fn scan_honors_range_bounds_and_family_filter() {
        let store = MemStore::new();
        let name: TableName = "t".parse().unwrap();
        let conn = store.connect().unwrap();
        conn.create_table(&name, &TableDesc::new(vec!["a".into(), "b".into()]))
            .unwrap();
        let table = conn.table(&name).unwrap();
        table.put_cell(&cell(b"k1", "a", 1)).unwrap();
        table.put_cell(&cell(b"k2", "b", 1)).unwrap();
        table.put_cell(&cell(b"k3", "a", 1)).unwrap();

        let range = KeyRange {
            start: b"k1".to_vec(),
            end: b"k3".to_vec(),
        };
        let keys: Vec<_> = table
            .scan_row_keys(&range, &[])
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(keys, vec![b"k1".to_vec(), b"k2".to_vec()]);

        let only_a: Vec<_> = table
            .scan_row_keys(&KeyRange::all(), &["a".to_string()])
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(only_a, vec![b"k1".to_vec(), b"k3".to_vec()]);
    }

    #[test]
    fn versions_of_a_column_come_back_newest_first() {
        let store = MemStore::new();
        let name: TableName = "t".parse().unwrap();
        let conn = store.connect().unwrap();
        conn.create_table(&name, &TableDesc::new(vec!["f".into()]))
            .unwrap();
        let table = conn.table(&name).unwrap();
        table.put_cell(&cell(b"r", "f", 10)).unwrap();
        table.put_cell(&cell(b"r", "f", 20)).unwrap();

        let cells = table.get_row(b"r").unwrap();
        let stamps: Vec<_> = cells.iter().map(|c| c.timestamp_ms).collect();
        assert_eq!(stamps, vec![20, 10]);
    }
}
