//! Report output for the audit scan.
//!
//! Every partition writes its own `part-NNNNN` file, one tab-separated
//! record per failing row. Partitions write independently and in parallel;
//! the merged artifact is just the concatenation of the part files, so
//! consumers must not assume a global ordering by row key. Within one
//! partition, records follow key order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cellar_store::escape::to_printable;

use crate::counters::CounterSnapshot;

/// Destination for report records. Each partition owns exactly one sink.
pub trait ReportSink {
    fn emit(&mut self, row_key: &[u8], diagnostic: &str) -> anyhow::Result<()>;
}

/// Buffered `part-NNNNN` file under the scan output directory.
pub struct PartFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
}

impl PartFileSink {
    pub fn create(output_dir: &Path, partition_index: usize) -> anyhow::Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("create dir {}", output_dir.display()))?;
        let path = output_dir.join(format!("part-{partition_index:05}"));
        let file =
            File::create(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Flush and return the file path and record count.
    pub fn finish(mut self) -> anyhow::Result<(PathBuf, u64)> {
        self.writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok((self.path, self.records))
    }
}

impl ReportSink for PartFileSink {
    fn emit(&mut self, row_key: &[u8], diagnostic: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "{}\t{}", to_printable(row_key), diagnostic)
            .with_context(|| format!("append to {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }
}

/// Collects records in memory; used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<(Vec<u8>, String)>,
}

impl ReportSink for MemorySink {
    fn emit(&mut self, row_key: &[u8], diagnostic: &str) -> anyhow::Result<()> {
        self.records.push((row_key.to_vec(), diagnostic.to_string()));
        Ok(())
    }
}

/// Final scan artifact, written as `summary.json` next to the part files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub table: String,
    pub partitions: usize,
    pub counters: CounterSnapshot,
    /// Report records written by each partition, indexed by partition.
    pub partition_records: Vec<u64>,
    pub started_unix_ms: u64,
    pub finished_unix_ms: u64,
}

pub fn write_summary(output_dir: &Path, summary: &AuditSummary) -> anyhow::Result<PathBuf> {
    let path = output_dir.join("summary.json");
    let data = serde_json::to_vec_pretty(summary).context("serialize scan summary")?;
    std::fs::write(&path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

pub fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
