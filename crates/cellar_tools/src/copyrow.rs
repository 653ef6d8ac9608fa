//! Single-row replication between tables.

use anyhow::Context;

use cellar_store::escape::to_printable;
use cellar_store::{Connection, TableName};

/// Copy every cell of `row` from `source` to `dest`, returning the number of
/// cells written.
///
/// A row with zero cells is indistinguishable from an absent row, so nothing
/// is written in that case; copying would otherwise resurrect the row as an
/// empty put. With `override_timestamp` set, every cell lands at the given
/// timestamp while row key, family, qualifier, value, and mutation kind are
/// preserved. Cell writes are not transactional; a failure mid-copy leaves
/// the cells already written in place.
pub fn copy_row(
    connection: &dyn Connection,
    source: &TableName,
    dest: &TableName,
    row: &[u8],
    override_timestamp: Option<u64>,
) -> anyhow::Result<u64> {
    let printable = to_printable(row);
    tracing::info!(table = %source, row = %printable, "reading source row");

    let cells = {
        let mut table = connection
            .table(source)
            .with_context(|| format!("open source table {source}"))?;
        let cells = table
            .get_row(row)
            .with_context(|| format!("read row {printable} from {source}"))?;
        table.close().context("close source table")?;
        cells
    };
    tracing::info!(table = %source, cells = cells.len(), "fetched source row");

    if cells.is_empty() {
        tracing::warn!(
            table = %source,
            row = %printable,
            "no data found in row, nothing to copy"
        );
        return Ok(0);
    }

    let mut dest_table = connection
        .table(dest)
        .with_context(|| format!("open destination table {dest}"))?;
    if let Some(timestamp_ms) = override_timestamp {
        tracing::info!(table = %dest, timestamp_ms, "overriding cell timestamps");
    }

    let copied = cells.len() as u64;
    for mut cell in cells {
        if let Some(timestamp_ms) = override_timestamp {
            cell.timestamp_ms = timestamp_ms;
        }
        dest_table
            .put_cell(&cell)
            .with_context(|| format!("write cell to {dest}"))?;
    }
    dest_table.close().context("close destination table")?;

    tracing::info!(cells = copied, source = %source, dest = %dest, "row copy complete");
    Ok(copied)
}
