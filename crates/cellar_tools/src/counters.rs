//! Job-scoped scan counters.
//!
//! One `ScanCounters` value is shared by handle with every partition worker.
//! Increments are atomic and monotonic; nothing is ever rolled back, so a
//! cancelled run may undercount. Only the snapshot taken after all workers
//! have joined is authoritative.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub enum ScanCounter {
    TotalRows,
    SuccessRows,
    FailedRows,
}

#[derive(Debug, Default)]
pub struct ScanCounters {
    total_rows: AtomicU64,
    success_rows: AtomicU64,
    failed_rows: AtomicU64,
}

impl ScanCounters {
    pub fn increment(&self, counter: ScanCounter, delta: u64) {
        let cell = match counter {
            ScanCounter::TotalRows => &self.total_rows,
            ScanCounter::SuccessRows => &self.success_rows,
            ScanCounter::FailedRows => &self.failed_rows,
        };
        cell.fetch_add(delta, Ordering::Relaxed);
    }

    /// Point-in-time view. Cross-counter consistency is only guaranteed once
    /// every worker has finished.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_rows: self.total_rows.load(Ordering::Relaxed),
            success_rows: self.success_rows.load(Ordering::Relaxed),
            failed_rows: self.failed_rows.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub total_rows: u64,
    pub success_rows: u64,
    pub failed_rows: u64,
}

impl CounterSnapshot {
    /// Holds after any scan that ran to completion.
    pub fn is_conserved(&self) -> bool {
        self.total_rows == self.success_rows + self.failed_rows
    }
}

#[cfg(test)]
mod tests {
    use super::{ScanCounter, ScanCounters};

    #[test]
    fn increments_accumulate_per_counter() {
        let counters = ScanCounters::default();
        counters.increment(ScanCounter::TotalRows, 1);
        counters.increment(ScanCounter::TotalRows, 2);
        counters.increment(ScanCounter::SuccessRows, 2);
        counters.increment(ScanCounter::FailedRows, 1);

        let snap = counters.snapshot();
        assert_eq!(snap.total_rows, 3);
        assert_eq!(snap.success_rows, 2);
        assert_eq!(snap.failed_rows, 1);
        assert!(snap.is_conserved());
    }
}
