//! Integration tests for the single-row replication tool.

mod common;

use cellar_store::{Cell, CellKind, ConnectionFactory, FjallStore, MemStore, TableDesc};
use cellar_tools::copyrow::copy_row;

use common::{cell, create_table, get_row_cells, put_cells, table};

fn two_tables(factory: &dyn ConnectionFactory) -> (cellar_store::TableName, cellar_store::TableName) {
    let source = table("ops:source");
    let dest = table("ops:dest");
    let desc = TableDesc::new(vec!["f".into(), "g".into()]);
    create_table(factory, &source, &desc);
    create_table(factory, &dest, &desc);
    (source, dest)
}

#[test]
fn copying_an_empty_row_writes_nothing() {
    let store = MemStore::new();
    let (source, dest) = two_tables(&store);
    put_cells(&store, &source, &[cell(b"other", "f", b"q", 1, b"v")]);

    let mut conn = store.connect().unwrap();
    let copied = copy_row(conn.as_ref(), &source, &dest, b"missing", None).unwrap();
    conn.close().unwrap();

    assert_eq!(copied, 0);
    assert!(get_row_cells(&store, &dest, b"missing").is_empty());
}

#[test]
fn timestamps_are_preserved_without_override() {
    let store = MemStore::new();
    let (source, dest) = two_tables(&store);
    let cells = vec![
        cell(b"row", "f", b"q", 10, b"old"),
        cell(b"row", "f", b"q", 20, b"new"),
        cell(b"row", "g", b"other", 15, b"x"),
    ];
    put_cells(&store, &source, &cells);

    let mut conn = store.connect().unwrap();
    let copied = copy_row(conn.as_ref(), &source, &dest, b"row", None).unwrap();
    conn.close().unwrap();

    assert_eq!(copied, 3);
    assert_eq!(
        get_row_cells(&store, &dest, b"row"),
        get_row_cells(&store, &source, b"row")
    );
}

#[test]
fn override_rewrites_every_copied_timestamp() {
    let store = MemStore::new();
    let (source, dest) = two_tables(&store);
    put_cells(
        &store,
        &source,
        &[
            cell(b"row", "f", b"q1", 10, b"a"),
            cell(b"row", "f", b"q2", 20, b"b"),
        ],
    );

    let mut conn = store.connect().unwrap();
    let copied = copy_row(conn.as_ref(), &source, &dest, b"row", Some(99)).unwrap();
    conn.close().unwrap();

    assert_eq!(copied, 2);
    let dest_cells = get_row_cells(&store, &dest, b"row");
    assert_eq!(dest_cells.len(), 2);
    for copied_cell in &dest_cells {
        assert_eq!(copied_cell.timestamp_ms, 99);
    }
    // Everything except the timestamp is untouched.
    let coords: Vec<_> = dest_cells
        .iter()
        .map(|c| (c.family.clone(), c.qualifier.clone(), c.value.clone()))
        .collect();
    assert_eq!(
        coords,
        vec![
            ("f".to_string(), b"q1".to_vec(), b"a".to_vec()),
            ("f".to_string(), b"q2".to_vec(), b"b".to_vec()),
        ]
    );
}

#[test]
fn fjall_copy_preserves_cell_kinds_and_versions() {
    let dir = tempfile::tempdir().unwrap();
    let store = FjallStore::open(dir.path()).unwrap();
    let (source, dest) = two_tables(&store);

    let tombstone = Cell {
        row: b"row".to_vec(),
        family: "g".to_string(),
        qualifier: b"gone".to_vec(),
        timestamp_ms: 5,
        kind: CellKind::Delete,
        value: Vec::new(),
    };
    put_cells(
        &store,
        &source,
        &[
            cell(b"row", "f", b"q", 10, b"old"),
            cell(b"row", "f", b"q", 20, b"new"),
            tombstone.clone(),
        ],
    );

    let mut conn = store.connect().unwrap();
    let copied = copy_row(conn.as_ref(), &source, &dest, b"row", None).unwrap();
    conn.close().unwrap();

    assert_eq!(copied, 3);
    let dest_cells = get_row_cells(&store, &dest, b"row");
    assert_eq!(dest_cells, get_row_cells(&store, &source, b"row"));
    assert!(dest_cells.iter().any(|c| c.kind == CellKind::Delete));
}

#[test]
fn copy_into_a_missing_destination_table_fails() {
    let store = MemStore::new();
    let source = table("ops:source");
    create_table(&store, &source, &TableDesc::new(vec!["f".into()]));
    put_cells(&store, &source, &[cell(b"row", "f", b"q", 1, b"v")]);

    let mut conn = store.connect().unwrap();
    let result = copy_row(conn.as_ref(), &source, &table("ops:nope"), b"row", None);
    conn.close().unwrap();
    assert!(result.is_err());
}
