// taxgraph CLI - invoice reconciliation and fraud-pattern scans over a
// SQLite trading graph.

mod exit_codes;
mod patterns;
mod recon;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taxgraph_recon::{ReconConfig, ReconError, StoreError};
use taxgraph_store::SqliteGraphStore;

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_NOT_FOUND, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};
use patterns::PatternKind;

#[derive(Parser)]
#[command(name = "tgraph")]
#[command(
    about = "Reconcile GST invoices across filings and scan the trading graph for fraud patterns"
)]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// Graph database file
    #[arg(long, global = true, env = "TAXGRAPH_DB", default_value = "taxgraph.db")]
    db: PathBuf,

    /// Threshold config (TOML); built-in defaults when omitted
    #[arg(long, global = true, env = "TAXGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Tenant whose records are read and written
    #[arg(long, global = true, env = "TAXGRAPH_TENANT", default_value = "default")]
    tenant: String,

    /// JSON to stdout instead of a human summary on stderr
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one invoice and store its verdict
    #[command(after_help = "\
Examples:
  tgraph reconcile INV-2024-0042
  tgraph reconcile INV-2024-0042 --json --tenant acme
  tgraph reconcile INV-2024-0042 --strict")]
    Reconcile {
        /// Invoice id
        record_id: String,

        /// Exit 6 when the verdict is HIGH_RISK
        #[arg(long)]
        strict: bool,

        /// Reference date for unpaid invoices (YYYY-MM-DD); defaults to today
        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,
    },

    /// Reconcile every matching invoice on a worker pool
    #[command(after_help = "\
Examples:
  tgraph reconcile-all
  tgraph reconcile-all --period 2024-04 --workers 8
  tgraph reconcile-all --gstin 27AAAAA0000A1Z5 --limit 500 --json
  tgraph reconcile-all --deadline-secs 300 --strict")]
    ReconcileAll {
        /// Only invoices where this taxpayer is supplier or buyer
        #[arg(long)]
        gstin: Option<String>,

        /// Only invoices reported in a source filing for this period
        #[arg(long)]
        period: Option<String>,

        /// At most this many invoices
        #[arg(long)]
        limit: Option<usize>,

        /// Worker threads (overrides [batch] workers)
        #[arg(long, env = "TAXGRAPH_WORKERS")]
        workers: Option<usize>,

        /// Stop picking up new invoices after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Exit 6 when any invoice is HIGH_RISK
        #[arg(long)]
        strict: bool,

        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,
    },

    /// Stored status distribution, without re-running reconciliation
    Stats,

    /// Run graph-wide fraud pattern detectors
    #[command(after_help = "\
Examples:
  tgraph patterns
  tgraph patterns circular --json
  tgraph patterns delay --min-delayed 3")]
    Patterns {
        /// Run only one detector
        #[arg(value_enum)]
        kind: Option<PatternKind>,

        /// Minimum delayed invoices before a taxpayer is flagged
        #[arg(long)]
        min_delayed: Option<usize>,

        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,
    },

    /// Inspect threshold configuration
    Config {
        #[command(subcommand)]
        command: settings::ConfigCommands,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("TAXGRAPH_COMMIT"), ")",
        "\nrecon:   taxgraph-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TAXGRAPH_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let global = Global {
        db: cli.db,
        config: cli.config,
        tenant: cli.tenant,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Reconcile {
            record_id,
            strict,
            as_of,
        } => recon::cmd_reconcile(&global, &record_id, strict, as_of),
        Commands::ReconcileAll {
            gstin,
            period,
            limit,
            workers,
            deadline_secs,
            strict,
            as_of,
        } => recon::cmd_reconcile_all(
            &global,
            recon::BatchArgs {
                gstin,
                period,
                limit,
                workers,
                deadline_secs,
                strict,
                as_of,
            },
        ),
        Commands::Stats => recon::cmd_stats(&global),
        Commands::Patterns {
            kind,
            min_delayed,
            as_of,
        } => patterns::cmd_patterns(&global, kind, min_delayed, as_of),
        Commands::Config { command } => settings::cmd_config(&global, command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr, filtered by `TAXGRAPH_LOG` (default `warn`). Library
/// crates log through `log`; the subscriber picks those records up.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TAXGRAPH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();
}

// ============================================================================
// Shared state
// ============================================================================

/// Global flags, passed to every command.
pub struct Global {
    pub db: PathBuf,
    pub config: Option<PathBuf>,
    pub tenant: String,
    pub json: bool,
}

impl Global {
    /// Config from `--config`, or the defaults.
    pub fn load_config(&self) -> Result<ReconConfig, CliError> {
        match &self.config {
            Some(path) => {
                let config = ReconConfig::from_path(path)?;
                log::debug!("loaded config from {}", path.display());
                Ok(config)
            }
            None => Ok(ReconConfig::default()),
        }
    }

    /// Open the graph store. Refuses to create a database that isn't there.
    pub fn open_store(&self) -> Result<SqliteGraphStore, CliError> {
        if !self.db.exists() {
            return Err(CliError::store(format!("no database at {}", self.db.display()))
                .with_hint("pass --db or set TAXGRAPH_DB"));
        }
        log::debug!("tenant {} on {}", self.tenant, self.db.display());
        Ok(SqliteGraphStore::open(&self.db)?)
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{out}");
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, msg)
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::new(EXIT_STORE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) | ReconError::Io(_) => {
                CliError::config(err.to_string())
                    .with_hint("run `tgraph config validate <path>` for details")
            }
            ReconError::NotFound { .. } => CliError::new(EXIT_NOT_FOUND, err.to_string())
                .with_hint("check the record id and --tenant"),
            ReconError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::store(err.to_string())
    }
}
