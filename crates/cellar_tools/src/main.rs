//! Operator CLI for the cellar maintenance tools.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand};

use cellar_store::escape::parse_printable;
use cellar_store::{ConnectionFactory, FjallStore, TableName};
use cellar_tools::audit::{run_audit, AuditConfig};
use cellar_tools::copyrow::copy_row;
use cellar_tools::report::unix_time_ms;

#[derive(Parser)]
#[command(name = "cellar")]
#[command(about = "Maintenance tools for cellar tables", long_about = None)]
struct Args {
    /// Store location (fjall keyspace directory).
    #[arg(long, env = "CELLAR_STORE")]
    store: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan every row of a table and report rows that cannot be read back.
    Audit {
        /// Table to scan (`namespace:table`).
        #[arg(long)]
        table: String,
        /// Directory for the partition reports and the scan summary.
        #[arg(long)]
        output: PathBuf,
        /// Log every cell of successfully read rows.
        #[arg(
            long = "traceCells",
            default_value_t = false,
            action = ArgAction::Set,
            value_parser = clap::value_parser!(bool)
        )]
        trace_cells: bool,
    },
    /// Copy one row's cells between tables, optionally rewriting timestamps.
    CopyRow {
        /// Source table (`namespace:table`).
        #[arg(long = "sourceTable")]
        source_table: String,
        /// Destination table (can be the same as the source).
        #[arg(long = "destTable")]
        dest_table: String,
        /// Row key in printable escaped byte-string form.
        #[arg(long = "rowKeyByteString")]
        row_key: String,
        /// Rewrite every copied cell's timestamp before writing.
        #[arg(
            long = "override",
            default_value_t = false,
            action = ArgAction::Set,
            value_parser = clap::value_parser!(bool)
        )]
        override_timestamps: bool,
        /// Timestamp to write when --override=true (default: current time).
        #[arg(long = "timestampToUse")]
        timestamp_to_use: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    // Enable ANSI colors only when stdout is a terminal and NO_COLOR is unset.
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match args.command {
        Command::Audit {
            table,
            output,
            trace_cells,
        } => {
            // Validate the arguments before touching the store.
            let table: TableName = table.parse().context("parse --table")?;
            let store = FjallStore::open(&args.store)
                .with_context(|| format!("open store at {}", args.store.display()))?;
            let factory: Arc<dyn ConnectionFactory> = Arc::new(store);
            run_audit(
                factory,
                AuditConfig {
                    table,
                    output,
                    trace_cells,
                },
            )
            .await?;
            Ok(())
        }
        Command::CopyRow {
            source_table,
            dest_table,
            row_key,
            override_timestamps,
            timestamp_to_use,
        } => {
            let source: TableName = source_table.parse().context("parse --sourceTable")?;
            let dest: TableName = dest_table.parse().context("parse --destTable")?;
            let row = parse_printable(&row_key).context("parse --rowKeyByteString")?;
            let override_timestamp =
                override_timestamps.then(|| timestamp_to_use.unwrap_or_else(unix_time_ms));

            let store = FjallStore::open(&args.store)
                .with_context(|| format!("open store at {}", args.store.display()))?;
            let mut connection = store.connect().context("connect to store")?;
            let result = copy_row(
                connection.as_ref(),
                &source,
                &dest,
                &row,
                override_timestamp,
            );
            let closed = connection.close().context("close store connection");
            result.map(|_| ()).and(closed)
        }
    }
}

/// Usage problems print to stderr and exit with status 1, before any store
/// access. Help and version requests keep clap's normal handling.
fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => {
            let _ = err.print();
            std::process::exit(1);
        }
    })
}
