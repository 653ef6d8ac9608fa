//! Typed errors for the store client.
//!
//! Every variant maps to a stable `kind()` string. The audit tooling embeds
//! that kind in its per-row diagnostics, so renaming a variant is a report
//! format change.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    /// Storage engine failure surfaced by the backing keyspace.
    #[error("{0}")]
    Engine(String),

    /// Stored bytes that cannot be decoded back into cells.
    #[error("{0}")]
    Corruption(String),

    #[error("table {0} does not exist")]
    TableNotFound(String),

    #[error("table {0} already exists")]
    TableExists(String),

    #[error("unknown column family {family} in table {table}")]
    UnknownFamily { table: String, family: String },

    #[error("invalid table name {0:?}")]
    InvalidTableName(String),

    #[error("table descriptor rejected: {0}")]
    InvalidDescriptor(String),

    #[error("invalid printable byte string {input:?}: {reason}")]
    InvalidRowKey { input: String, reason: String },

    #[error("connection already closed")]
    ConnectionClosed,
}

impl StoreError {
    /// Stable machine-readable kind, used as the diagnostic prefix in
    /// audit reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "Io",
            StoreError::Engine(_) => "Engine",
            StoreError::Corruption(_) => "Corruption",
            StoreError::TableNotFound(_) => "TableNotFound",
            StoreError::TableExists(_) => "TableExists",
            StoreError::UnknownFamily { .. } => "UnknownFamily",
            StoreError::InvalidTableName(_) => "InvalidTableName",
            StoreError::InvalidDescriptor(_) => "InvalidDescriptor",
            StoreError::InvalidRowKey { .. } => "InvalidRowKey",
            StoreError::ConnectionClosed => "ConnectionClosed",
        }
    }
}

impl From<fjall::Error> for StoreError {
    fn from(err: fjall::Error) -> Self {
        StoreError::Engine(err.to_string())
    }
}
