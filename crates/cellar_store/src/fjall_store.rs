//! Fjall-backed store engine.
//!
//! All tables share one `cells` keyspace partition; each cell key is prefixed
//! with the owning table's numeric id. Within a table the key encoding
//! preserves raw row-key order, which is what makes contiguous key-range
//! partitions meaningful:
//!
//! `[table_id][esc(row)][esc(family)][esc(qualifier)][!timestamp]`
//!
//! Components escape interior NULs (`0x00 -> 0x00 0xFF`) and terminate with
//! `0x00 0x00`; the timestamp is stored bitwise-inverted so newer versions of
//! a column sort first. Table descriptors persist as JSON in a `tables`
//! partition.

use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex};

use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::model::{Cell, CellKind, KeyRange, TableDesc, TableName};
use crate::store::{Connection, ConnectionFactory, RowKeyScan, Table};

const NEXT_ID_KEY: &[u8] = b"\0next_id";

const KIND_PUT: u8 = 1;
const KIND_DELETE: u8 = 2;

/// Connection factory over one shared keyspace.
///
/// The keyspace is opened once per process; every connection handed out is an
/// independently closeable view over it.
#[derive(Clone)]
pub struct FjallStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    keyspace: Arc<Keyspace>,
    tables: PartitionHandle,
    cells: PartitionHandle,
    create_lock: Mutex<()>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTable {
    id: u64,
    families: Vec<String>,
    #[serde(default)]
    split_points: Vec<Vec<u8>>,
}

impl FjallStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let keyspace = Arc::new(fjall::Config::new(path).open()?);
        let tables = keyspace.open_partition("tables", PartitionCreateOptions::default())?;
        let cells = keyspace.open_partition("cells", PartitionCreateOptions::default())?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                keyspace,
                tables,
                cells,
                create_lock: Mutex::new(()),
            }),
        })
    }
}

impl ConnectionFactory for FjallStore {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        Ok(Box::new(FjallConnection {
            store: self.inner.clone(),
            closed: false,
        }))
    }
}

struct FjallConnection {
    store: Arc<StoreInner>,
    closed: bool,
}

impl FjallConnection {
    fn guard(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(())
    }

    fn load(&self, name: &TableName) -> StoreResult<StoredTable> {
        let bytes = self
            .store
            .tables
            .get(name.to_string().as_bytes())?
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Corruption(format!("table descriptor for {name}: {err}")))
    }
}

impl Connection for FjallConnection {
    fn table(&self, name: &TableName) -> StoreResult<Box<dyn Table>> {
        self.guard()?;
        let stored = self.load(name)?;
        Ok(Box::new(FjallTable {
            name: name.clone(),
            table_id: stored.id,
            families: stored.families,
            cells: self.store.cells.clone(),
            closed: false,
        }))
    }

    fn table_desc(&self, name: &TableName) -> StoreResult<TableDesc> {
        self.guard()?;
        let stored = self.load(name)?;
        Ok(TableDesc {
            families: stored.families,
            split_points: stored.split_points,
        })
    }

    fn create_table(&self, name: &TableName, desc: &TableDesc) -> StoreResult<()> {
        self.guard()?;
        if desc.families.is_empty() {
            return Err(StoreError::InvalidDescriptor(
                "at least one column family is required".to_string(),
            ));
        }
        for family in &desc.families {
            if !crate::model::is_valid_identifier(family) {
                return Err(StoreError::InvalidDescriptor(format!(
                    "invalid family name {family:?}"
                )));
            }
        }

        let _guard = self
            .store
            .create_lock
            .lock()
            .map_err(|_| StoreError::Engine("table creation lock poisoned".to_string()))?;
        let key = name.to_string();
        if self.store.tables.get(key.as_bytes())?.is_some() {
            return Err(StoreError::TableExists(key));
        }

        let next_id = match self.store.tables.get(NEXT_ID_KEY)? {
            Some(bytes) => decode_u64(&bytes)?,
            None => 1,
        };
        let stored = StoredTable {
            id: next_id,
            families: desc.families.clone(),
            split_points: desc.split_points.clone(),
        };
        let payload = serde_json::to_vec(&stored)
            .map_err(|err| StoreError::Engine(format!("encode table descriptor: {err}")))?;

        let mut batch = self.store.keyspace.batch();
        batch.insert(
            &self.store.tables,
            NEXT_ID_KEY,
            (next_id + 1).to_be_bytes().to_vec(),
        );
        batch.insert(&self.store.tables, key.as_bytes(), payload);
        batch.commit()?;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.store.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

struct FjallTable {
    name: TableName,
    table_id: u64,
    families: Vec<String>,
    cells: PartitionHandle,
    closed: bool,
}

impl FjallTable {
    fn guard(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Table for FjallTable {
    fn get_row(&self, row: &[u8]) -> StoreResult<Vec<Cell>> {
        self.guard()?;
        let prefix = encode_row_prefix(self.table_id, row);
        let mut cells = Vec::new();
        for entry in self.cells.prefix(prefix) {
            let (key, value) = entry?;
            cells.push(decode_cell(&key, &value)?);
        }
        Ok(cells)
    }

    fn put_cell(&self, cell: &Cell) -> StoreResult<()> {
        self.guard()?;
        if !self.families.iter().any(|f| f == &cell.family) {
            return Err(StoreError::UnknownFamily {
                table: self.name.to_string(),
                family: cell.family.clone(),
            });
        }
        let key = encode_cell_key(
            self.table_id,
            &cell.row,
            cell.family.as_bytes(),
            &cell.qualifier,
            cell.timestamp_ms,
        );
        let mut value = Vec::with_capacity(1 + cell.value.len());
        value.push(match cell.kind {
            CellKind::Put => KIND_PUT,
            CellKind::Delete => KIND_DELETE,
        });
        value.extend_from_slice(&cell.value);
        self.cells.insert(key, value)?;
        Ok(())
    }

    fn scan_row_keys(&self, range: &KeyRange, families: &[String]) -> StoreResult<RowKeyScan> {
        self.guard()?;
        let start = if range.start.is_empty() {
            Bound::Included(self.table_id.to_be_bytes().to_vec())
        } else {
            Bound::Included(encode_row_prefix(self.table_id, &range.start))
        };
        let end = if range.end.is_empty() {
            Bound::Excluded((self.table_id + 1).to_be_bytes().to_vec())
        } else {
            Bound::Excluded(encode_row_prefix(self.table_id, &range.end))
        };
        let iter = self.cells.range((start, end));
        Ok(Box::new(FjallRowKeys {
            iter: Box::new(iter),
            families: families.to_vec(),
            current_row: None,
        }))
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Key-only row enumeration: walks cell keys in order, emits each row once,
/// and never touches cell values.
struct FjallRowKeys {
    iter: Box<dyn Iterator<Item = Result<(fjall::Slice, fjall::Slice), fjall::Error>>>,
    families: Vec<String>,
    current_row: Option<Vec<u8>>,
}

impl Iterator for FjallRowKeys {
    type Item = StoreResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.iter.by_ref() {
            let (key, _) = match entry {
                Ok(kv) => kv,
                Err(err) => return Some(Err(err.into())),
            };
            let (row, family) = match decode_row_and_family(&key) {
                Ok(parts) => parts,
                Err(err) => return Some(Err(err)),
            };
            if self.current_row.as_deref() == Some(row.as_slice()) {
                continue;
            }
            if !self.families.is_empty()
                && !self.families.iter().any(|f| f.as_bytes() == family.as_slice())
            {
                continue;
            }
            self.current_row = Some(row.clone());
            return Some(Ok(row));
        }
        None
    }
}

fn append_component(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if byte == 0 {
            out.extend_from_slice(&[0x00, 0xFF]);
        } else {
            out.push(byte);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

fn read_component(data: &[u8], offset: &mut usize) -> StoreResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = *offset;
    while i < data.len() {
        if data[i] != 0 {
            out.push(data[i]);
            i += 1;
            continue;
        }
        match data.get(i + 1) {
            Some(0xFF) => {
                out.push(0);
                i += 2;
            }
            Some(0x00) => {
                *offset = i + 2;
                return Ok(out);
            }
            _ => break,
        }
    }
    Err(StoreError::Corruption(
        "unterminated cell key component".to_string(),
    ))
}

fn encode_row_prefix(table_id: u64, row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + row.len() + 2);
    out.extend_from_slice(&table_id.to_be_bytes());
    append_component(&mut out, row);
    out
}

fn encode_cell_key(
    table_id: u64,
    row: &[u8],
    family: &[u8],
    qualifier: &[u8],
    timestamp_ms: u64,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + row.len() + family.len() + qualifier.len() + 14);
    out.extend_from_slice(&table_id.to_be_bytes());
    append_component(&mut out, row);
    append_component(&mut out, family);
    append_component(&mut out, qualifier);
    out.extend_from_slice(&(!timestamp_ms).to_be_bytes());
    out
}

fn decode_row_and_family(key: &[u8]) -> StoreResult<(Vec<u8>, Vec<u8>)> {
    if key.len() < 8 {
        return Err(StoreError::Corruption("short cell key".to_string()));
    }
    let mut offset = 8;
    let row = read_component(key, &mut offset)?;
    let family = read_component(key, &mut offset)?;
    Ok((row, family))
}

fn decode_cell(key: &[u8], value: &[u8]) -> StoreResult<Cell> {
    if key.len() < 8 {
        return Err(StoreError::Corruption("short cell key".to_string()));
    }
    let mut offset = 8;
    let row = read_component(key, &mut offset)?;
    let family_bytes = read_component(key, &mut offset)?;
    let qualifier = read_component(key, &mut offset)?;
    if key.len() != offset + 8 {
        return Err(StoreError::Corruption(
            "cell key missing timestamp".to_string(),
        ));
    }
    let timestamp_ms = !decode_u64(&key[offset..])?;
    let family = String::from_utf8(family_bytes)
        .map_err(|_| StoreError::Corruption("non-utf8 family name".to_string()))?;

    let (&kind_byte, value_bytes) = value
        .split_first()
        .ok_or_else(|| StoreError::Corruption("empty cell value record".to_string()))?;
    let kind = match kind_byte {
        KIND_PUT => CellKind::Put,
        KIND_DELETE => CellKind::Delete,
        other => {
            return Err(StoreError::Corruption(format!(
                "unknown cell kind tag {other}"
            )));
        }
    };

    Ok(Cell {
        row,
        family,
        qualifier,
        timestamp_ms,
        kind,
        value: value_bytes.to_vec(),
    })
}

fn decode_u64(data: &[u8]) -> StoreResult<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| StoreError::Corruption("short u64".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}
