//! Row integrity audit: scan every row of a table and report the rows whose
//! stored cells cannot be read back.
//!
//! The job splits the table into its persisted key-range partitions and runs
//! one worker per partition on a blocking task; workers share nothing but
//! the counter aggregator. Each partition writes its own report file, so the
//! job's output is the union of the part files regardless of how the
//! partitions were interleaved.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use cellar_store::{ConnectionFactory, TableDesc, TableName};

use crate::counters::ScanCounters;
use crate::report::{unix_time_ms, write_summary, AuditSummary, PartFileSink};
use crate::worker::PartitionWorker;

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub table: TableName,
    pub output: PathBuf,
    pub trace_cells: bool,
}

/// Run a full scan of `config.table`, writing per-partition reports and a
/// `summary.json` under `config.output`.
///
/// A partition that cannot establish its connection fails the whole job;
/// individual unreadable rows never do.
pub async fn run_audit(
    factory: Arc<dyn ConnectionFactory>,
    config: AuditConfig,
) -> anyhow::Result<AuditSummary> {
    let started_unix_ms = unix_time_ms();
    let desc = resolve_table(factory.as_ref(), &config.table)?;
    let partitions = desc.partitions();
    tracing::info!(
        table = %config.table,
        partitions = partitions.len(),
        families = desc.families.len(),
        output = %config.output.display(),
        "starting row integrity audit"
    );

    let counters = Arc::new(ScanCounters::default());
    let mut tasks = Vec::with_capacity(partitions.len());
    for (index, range) in partitions.iter().cloned().enumerate() {
        let factory = factory.clone();
        let table = config.table.clone();
        let families = desc.families.clone();
        let counters = counters.clone();
        let output = config.output.clone();
        let trace_cells = config.trace_cells;
        tasks.push(tokio::task::spawn_blocking(move || {
            let mut sink = PartFileSink::create(&output, index)
                .with_context(|| format!("open report sink for partition {index}"))?;
            let mut worker = PartitionWorker::new(factory, table, families, counters, trace_cells);
            worker
                .scan(&range, &mut sink)
                .with_context(|| format!("scan partition {index} {range}"))?;
            let (_, records) = sink.finish()?;
            Ok::<_, anyhow::Error>((index, records))
        }));
    }

    let mut partition_records = vec![0u64; partitions.len()];
    for task in tasks {
        let (index, records) = task.await.context("partition worker panicked")??;
        partition_records[index] = records;
    }

    let counters = counters.snapshot();
    tracing::info!(
        table = %config.table,
        total_rows = counters.total_rows,
        success_rows = counters.success_rows,
        failed_rows = counters.failed_rows,
        "audit finished"
    );

    let summary = AuditSummary {
        table: config.table.to_string(),
        partitions: partitions.len(),
        counters,
        partition_records,
        started_unix_ms,
        finished_unix_ms: unix_time_ms(),
    };
    write_summary(&config.output, &summary)?;
    Ok(summary)
}

/// Resolve the table descriptor up front, before any partition work is
/// scheduled. This both validates the table and provides the family list
/// the partition readers restrict themselves to.
fn resolve_table(
    factory: &dyn ConnectionFactory,
    table: &TableName,
) -> anyhow::Result<TableDesc> {
    let mut connection = factory
        .connect()
        .context("connect for table discovery")?;
    let desc = connection
        .table_desc(table)
        .with_context(|| format!("resolve table {table}"))?;
    connection.close().context("close discovery connection")?;
    Ok(desc)
}
