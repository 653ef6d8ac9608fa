//! Partition worker: scans one key-range partition of a table.
//!
//! Lifecycle is `Uninitialized -> ConnectionReady -> Scanning -> Closed`.
//! The worker is built without a connection; the connection and table handle
//! are acquired lazily on first use and released exactly once, on every exit
//! path. Row processing within the partition is strictly sequential, and the
//! connection is never shared with another worker.

use std::sync::Arc;

use anyhow::Context;

use cellar_store::escape::to_printable;
use cellar_store::{Cell, Connection, ConnectionFactory, KeyRange, Table, TableName};

use crate::counters::{ScanCounter, ScanCounters};
use crate::report::ReportSink;
use crate::validate::{diagnostic, validate_row, ScanResult};

pub struct PartitionWorker {
    factory: Arc<dyn ConnectionFactory>,
    table: TableName,
    families: Vec<String>,
    counters: Arc<ScanCounters>,
    trace_cells: bool,
    state: WorkerState,
}

enum WorkerState {
    Uninitialized,
    Ready {
        connection: Box<dyn Connection>,
        table: Box<dyn Table>,
    },
    Closed,
}

impl PartitionWorker {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        table: TableName,
        families: Vec<String>,
        counters: Arc<ScanCounters>,
        trace_cells: bool,
    ) -> Self {
        Self {
            factory,
            table,
            families,
            counters,
            trace_cells,
            state: WorkerState::Uninitialized,
        }
    }

    /// Scan one partition, classifying every row and reporting failures to
    /// `sink`. Row-read failures are recorded and scanning continues; only
    /// connection-level failures abort the partition. The connection is
    /// released before returning, whatever the outcome.
    pub fn scan(&mut self, range: &KeyRange, sink: &mut dyn ReportSink) -> anyhow::Result<()> {
        let result = self.scan_rows(range, sink);
        let closed = self.close();
        result.and(closed)
    }

    fn scan_rows(&mut self, range: &KeyRange, sink: &mut dyn ReportSink) -> anyhow::Result<()> {
        self.ensure_open()?;
        let scan = self
            .table_handle()?
            .scan_row_keys(range, &self.families)
            .with_context(|| format!("enumerate rows of {} in {range}", self.table))?;

        for entry in scan {
            // An enumeration failure means the partition itself cannot be
            // walked; that is fatal here, unlike a per-row read failure.
            let row = entry.with_context(|| format!("enumerate rows of {}", self.table))?;
            self.counters.increment(ScanCounter::TotalRows, 1);

            match validate_row(self.table_handle()?, &row) {
                ScanResult::Success(cells) => {
                    self.counters.increment(ScanCounter::SuccessRows, 1);
                    if self.trace_cells {
                        trace_row(&row, &cells);
                    }
                }
                ScanResult::Failure { kind, message } => {
                    self.counters.increment(ScanCounter::FailedRows, 1);
                    if self.trace_cells {
                        tracing::error!(
                            row = %to_printable(&row),
                            kind,
                            message = %message,
                            "row read failed"
                        );
                    }
                    sink.emit(&row, &diagnostic(kind, &message))?;
                }
            }
        }
        Ok(())
    }

    /// Lazily establish the connection and table handle. Safe to call again
    /// once ready; fails after `close`.
    fn ensure_open(&mut self) -> anyhow::Result<()> {
        match self.state {
            WorkerState::Uninitialized => {
                let connection = self
                    .factory
                    .connect()
                    .context("establish store connection")?;
                let table = connection
                    .table(&self.table)
                    .with_context(|| format!("open table {}", self.table))?;
                self.state = WorkerState::Ready { connection, table };
                Ok(())
            }
            WorkerState::Ready { .. } => Ok(()),
            WorkerState::Closed => anyhow::bail!("partition worker already closed"),
        }
    }

    fn table_handle(&self) -> anyhow::Result<&dyn Table> {
        match &self.state {
            WorkerState::Ready { table, .. } => Ok(table.as_ref()),
            _ => anyhow::bail!("partition worker has no open table handle"),
        }
    }

    /// Release the table handle and connection. Idempotent: closing an
    /// already-closed or never-opened worker is a no-op.
    pub fn close(&mut self) -> anyhow::Result<()> {
        match std::mem::replace(&mut self.state, WorkerState::Closed) {
            WorkerState::Ready {
                mut connection,
                mut table,
            } => {
                table.close().context("close table handle")?;
                connection.close().context("close store connection")?;
                Ok(())
            }
            WorkerState::Uninitialized | WorkerState::Closed => Ok(()),
        }
    }
}

fn trace_row(row: &[u8], cells: &[Cell]) {
    tracing::info!(row = %to_printable(row), cells = cells.len(), "row read ok");
    for cell in cells {
        tracing::info!(
            family = %cell.family,
            qualifier = %to_printable(&cell.qualifier),
            timestamp_ms = cell.timestamp_ms,
            kind = ?cell.kind,
            value = %to_printable(&cell.value),
            "cell"
        );
    }
}
