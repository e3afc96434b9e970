// floatcov - temporal coverage checks across a profile archive, its index and exports

mod exit_codes;
mod export;
mod inventory;
mod probe;
mod recon;
mod store;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_ERROR, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "floatcov")]
#[command(about = "Cross-check month-by-month coverage of a profile archive, its index and exports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). Overrides FLOATCOV_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Config-driven coverage reconciliation
    Recon {
        #[command(subcommand)]
        command: recon::ReconCommands,
    },

    /// Count profile files per month under an archive root
    #[command(after_help = "\
Examples:
  floatcov inventory argo_data
  floatcov inventory argo_data --pattern '*_prof.nc' --json")]
    Inventory {
        /// Archive root (walked recursively)
        root: std::path::PathBuf,

        /// File name glob
        #[arg(long, default_value = "*_prof.nc")]
        pattern: String,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Date span, float count and skipped rows of a CSV export
    #[command(after_help = "\
Examples:
  floatcov export exports/chroma_2024-07.csv
  floatcov export exports/chroma_2024-07.csv --json")]
    Export {
        /// CSV export (id, date, metadata.* columns)
        file: std::path::PathBuf,

        /// Output JSON to stdout instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Inspect an index snapshot
    Store {
        #[command(subcommand)]
        command: store::StoreCommands,
    },

    /// Smoke-test the chat API
    #[command(after_help = "\
Examples:
  floatcov probe
  floatcov probe --base-url http://localhost:8000 --json
  floatcov probe -m 'show me salinity profiles from october 2024'")]
    Probe {
        /// API base URL
        #[arg(long, env = "FLOATCOV_API_BASE", default_value = "http://localhost:8000")]
        base_url: String,

        /// Query to send (repeatable); defaults to the October 2024 set
        #[arg(long = "message", short = 'm')]
        messages: Vec<String>,

        /// Language tag sent with each query
        #[arg(long, default_value = "en")]
        language: String,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Output JSON to stdout instead of a summary
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("FLOATCOV_BUILD_REV"), ")",
            "\nengine:  floatcov-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("FLOATCOV_BUILD_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("FLOATCOV_BUILD_REV"), ")",
            "\nengine:  floatcov-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("FLOATCOV_BUILD_TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("FLOATCOV_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Recon { command } => recon::cmd_recon(command),
        Commands::Inventory { root, pattern, json } => inventory::cmd_inventory(root, &pattern, json),
        Commands::Export { file, json } => export::cmd_export(file, json),
        Commands::Store { command } => store::cmd_store(command),
        Commands::Probe {
            base_url,
            messages,
            language,
            timeout,
            json,
        } => probe::cmd_probe(&base_url, messages, &language, timeout, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
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

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Exit with `code` but print nothing more; the command already reported.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Pretty JSON on stdout: one value, nothing else.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{text}");
    Ok(())
}
