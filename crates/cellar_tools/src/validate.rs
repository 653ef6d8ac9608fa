//! Per-row validation.
//!
//! The validator re-reads the whole row through the same point-read path an
//! application would use, independent of the cheap key-only enumeration that
//! found the row. The outcome is an explicit two-variant result; read errors
//! never cross the worker boundary as errors.

use cellar_store::{Cell, Table};

/// Outcome of validating one row.
#[derive(Debug)]
pub enum ScanResult {
    /// The row read back cleanly; the cells are kept only for optional
    /// trace logging.
    Success(Vec<Cell>),
    /// The point-read failed. `message` is already truncated to the first
    /// line of the underlying error.
    Failure {
        kind: &'static str,
        message: String,
    },
}

/// Full point-read of `row`, classified. No retries: transient and permanent
/// failures report identically within one pass.
pub fn validate_row(table: &dyn Table, row: &[u8]) -> ScanResult {
    match table.get_row(row) {
        Ok(cells) => ScanResult::Success(cells),
        Err(err) => ScanResult::Failure {
            kind: err.kind(),
            message: first_line(&err.to_string()),
        },
    }
}

/// Diagnostic string for a failure, as written to report records.
pub fn diagnostic(kind: &str, message: &str) -> String {
    format!("{kind}, message: {message}")
}

/// First line of an error message, `n/a` when there is nothing usable.
/// Messages can be multi-line; only the first line keeps the report compact
/// and grep-able.
fn first_line(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "n/a".to_string();
    }
    trimmed
        .split(['\r', '\n'])
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| "n/a".to_string())
}
