//! Operator maintenance tools for cellar tables.
//!
//! Two operations ship here: the row integrity audit (scan every row of a
//! table, report the rows whose stored cells cannot be read back) and the
//! single-row replication tool (copy one row's cells between tables,
//! optionally rewriting their timestamps).

pub mod audit;
pub mod copyrow;
pub mod counters;
pub mod report;
pub mod validate;
pub mod worker;
