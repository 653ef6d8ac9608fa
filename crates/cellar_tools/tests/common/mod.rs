#![allow(dead_code)]
//! Shared fixtures for the tool integration tests.

use cellar_store::{Cell, CellKind, ConnectionFactory, TableDesc, TableName};

pub fn table(name: &str) -> TableName {
    name.parse().expect("table name")
}

pub fn cell(row: &[u8], family: &str, qualifier: &[u8], timestamp_ms: u64, value: &[u8]) -> Cell {
    Cell {
        row: row.to_vec(),
        family: family.to_string(),
        qualifier: qualifier.to_vec(),
        timestamp_ms,
        kind: CellKind::Put,
        value: value.to_vec(),
    }
}

pub fn create_table(factory: &dyn ConnectionFactory, name: &TableName, desc: &TableDesc) {
    let mut conn = factory.connect().expect("connect");
    conn.create_table(name, desc).expect("create table");
    conn.close().expect("close");
}

pub fn put_cells(factory: &dyn ConnectionFactory, name: &TableName, cells: &[Cell]) {
    let mut conn = factory.connect().expect("connect");
    let mut table = conn.table(name).expect("open table");
    for cell in cells {
        table.put_cell(cell).expect("put cell");
    }
    table.close().expect("close table");
    conn.close().expect("close");
}

pub fn get_row_cells(factory: &dyn ConnectionFactory, name: &TableName, row: &[u8]) -> Vec<Cell> {
    let mut conn = factory.connect().expect("connect");
    let mut table = conn.table(name).expect("open table");
    let cells = table.get_row(row).expect("get row");
    table.close().expect("close table");
    conn.close().expect("close");
    cells
}
