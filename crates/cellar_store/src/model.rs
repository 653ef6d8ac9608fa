//! Core data model shared by the store engines and the tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Namespace used when a table name carries no explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Fully qualified table name, `namespace:qualifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    namespace: String,
    qualifier: String,
}

impl TableName {
    pub fn new(namespace: &str, qualifier: &str) -> StoreResult<Self> {
        if !is_valid_identifier(namespace) || !is_valid_identifier(qualifier) {
            return Err(StoreError::InvalidTableName(format!(
                "{namespace}:{qualifier}"
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            qualifier: qualifier.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

/// Table name parts and family names allow the same conservative charset
/// the store accepts for on-disk identifiers.
pub(crate) fn is_valid_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}

impl FromStr for TableName {
    type Err = StoreError;

    fn from_str(input: &str) -> StoreResult<Self> {
        match input.split_once(':') {
            Some((namespace, qualifier)) => TableName::new(namespace, qualifier),
            None => TableName::new(DEFAULT_NAMESPACE, input),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.qualifier)
    }
}

/// Mutation type carried by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Put,
    Delete,
}

/// One versioned value at `(row, family, qualifier, timestamp)`.
///
/// Cells are immutable once written; writing the same coordinates again
/// stores another version rather than replacing the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: Vec<u8>,
    pub family: String,
    pub qualifier: Vec<u8>,
    pub timestamp_ms: u64,
    pub kind: CellKind,
    pub value: Vec<u8>,
}

/// Contiguous end-exclusive key range. Empty bounds mean unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    /// The full-table range.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        (self.start.is_empty() || key >= self.start.as_slice())
            && (self.end.is_empty() || key < self.end.as_slice())
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            crate::escape::to_printable(&self.start),
            if self.end.is_empty() {
                "end".to_string()
            } else {
                crate::escape::to_printable(&self.end)
            }
        )
    }
}

/// Table descriptor: column families plus the persisted split points that
/// partition the key space for scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDesc {
    pub families: Vec<String>,
    #[serde(default)]
    pub split_points: Vec<Vec<u8>>,
}

impl TableDesc {
    pub fn new(families: Vec<String>) -> Self {
        Self {
            families,
            split_points: Vec::new(),
        }
    }

    pub fn with_split_points(mut self, split_points: Vec<Vec<u8>>) -> Self {
        self.split_points = split_points;
        self
    }

    /// Derive the scan partitions from the split points.
    ///
    /// The returned ranges are disjoint, sorted, and cover the whole key
    /// space. A table with no split points scans as a single partition.
    pub fn partitions(&self) -> Vec<KeyRange> {
        let mut splits: Vec<&[u8]> = self
            .split_points
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_slice())
            .collect();
        splits.sort_unstable();
        splits.dedup();

        let mut ranges = Vec::with_capacity(splits.len() + 1);
        let mut start: Vec<u8> = Vec::new();
        for split in splits {
            ranges.push(KeyRange {
                start,
                end: split.to_vec(),
            });
            start = split.to_vec();
        }
        ranges.push(KeyRange {
            start,
            end: Vec::new(),
        });
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyRange, TableDesc, TableName};

    #[test]
    fn table_name_parses_namespace_and_qualifier() {
        let name: TableName = "ops:inventory".parse().unwrap();
        assert_eq!(name.namespace(), "ops");
        assert_eq!(name.qualifier(), "inventory");
        assert_eq!(name.to_string(), "ops:inventory");
    }

    #[test]
    fn bare_table_name_gets_default_namespace() {
        let name: TableName = "inventory".parse().unwrap();
        assert_eq!(name.to_string(), "default:inventory");
    }

    #[test]
    fn table_name_rejects_bad_characters() {
        assert!("ops:has space".parse::<TableName>().is_err());
        assert!(":empty".parse::<TableName>().is_err());
        assert!("a:b:c".parse::<TableName>().is_err());
    }

    #[test]
    fn no_splits_scan_as_one_partition() {
        let desc = TableDesc::new(vec!["f".into()]);
        assert_eq!(desc.partitions(), vec![KeyRange::all()]);
    }

    #[test]
    fn partitions_are_disjoint_and_cover_the_keyspace() {
        let desc = TableDesc::new(vec!["f".into()])
            .with_split_points(vec![b"m".to_vec(), b"f".to_vec(), b"m".to_vec()]);
        let parts = desc.partitions();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], KeyRange { start: vec![], end: b"f".to_vec() });
        assert_eq!(parts[1], KeyRange { start: b"f".to_vec(), end: b"m".to_vec() });
        assert_eq!(parts[2], KeyRange { start: b"m".to_vec(), end: vec![] });

        // Every key lands in exactly one partition.
        for key in [&b""[..], b"a", b"f", b"g", b"m", b"zzz"] {
            let owners = parts.iter().filter(|p| p.contains(key)).count();
            assert_eq!(owners, 1, "key {key:?}");
        }
    }
}
