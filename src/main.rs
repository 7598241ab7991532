use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use vendor_ledger::application::service::VendorLedgerService;
use vendor_ledger::config::fetch_config;
use vendor_ledger::domain::plan::PlanCatalog;
use vendor_ledger::domain::ports::LedgerStoreRef;
use vendor_ledger::error::LedgerError;
use vendor_ledger::infrastructure::event_sink::TracingEventSink;
use vendor_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use vendor_ledger::interfaces::csv::command_reader::CommandReader;
use vendor_ledger::interfaces::csv::statement_writer::StatementWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Smallest payout a vendor may request. Overrides LEDGER_MINIMUM_PAYOUT.
    #[arg(long)]
    minimum_payout: Option<Decimal>,

    /// Days an earning stays pending after delivery. Overrides LEDGER_MATURATION_DAYS.
    #[arg(long)]
    maturation_days: Option<i64>,

    /// Log ledger activity at info level
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store =
                vendor_ledger::infrastructure::rocksdb::RocksDbLedgerStore::open(path)
                    .into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but the 'storage-rocksdb' \
                 feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = fetch_config().into_diagnostic()?;
    if let Some(minimum) = cli.minimum_payout {
        config = config.with_minimum_payout(minimum).into_diagnostic()?;
    }
    if let Some(days) = cli.maturation_days {
        config = config.with_maturation_days(days).into_diagnostic()?;
    }

    let catalog = PlanCatalog::default();
    if !catalog.contains(&config.default_plan) {
        return Err(LedgerError::UnknownPlan(config.default_plan)).into_diagnostic();
    }

    let store = open_store(cli.db_path)?;
    let service = VendorLedgerService::new(store, Arc::new(TracingEventSink), catalog, config);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (row, command) in reader.commands().enumerate() {
        match command {
            Ok(command) => match command.execute(&service).await {
                Ok(()) => {}
                // Vendor-facing rejections, not faults.
                Err(e) if e.is_actionable() => {
                    warn!(row = row + 1, error = %e, "Error processing command");
                }
                Err(e) => {
                    error!(row = row + 1, error = %e, "Error processing command");
                }
            },
            Err(e) => {
                error!(row = row + 1, error = %e, "Error reading command");
            }
        }
    }

    let statements = service.statements().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = StatementWriter::new(stdout.lock());
    writer.write_statements(statements).into_diagnostic()?;

    Ok(())
}
