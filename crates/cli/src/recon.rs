//! `floatcov recon`: config-driven coverage reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use floatcov_io::store::{self as index_store, SnapshotStore};
use floatcov_io::{export, inventory};
use floatcov_recon::config::IndexMode;
use floatcov_recon::{CoverageConfig, CoverageInput, CoverageReport, Source};

use crate::exit_codes::{
    coverage_exit_code, summary_exit_code, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS,
};
use crate::{print_json, CliError};

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run a coverage check from a TOML config file
    #[command(after_help = "\
Examples:
  floatcov recon run coverage.toml
  floatcov recon run coverage.toml --json
  floatcov recon run coverage.toml --output report.json

Exit codes:
  0 all consistent, 3 coverage gap, 4 discrepant only,
  5 invalid config, 6 source unreadable, 7 nothing to compare")]
    Run {
        /// Path to the coverage config
        config: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output] json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a coverage config without reading any source
    #[command(after_help = "\
Examples:
  floatcov recon validate coverage.toml")]
    Validate {
        /// Path to the coverage config
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output } => cmd_recon_run(config, json, output),
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

fn load_config(config_path: &Path) -> Result<CoverageConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_RUNTIME, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    CoverageConfig::from_toml(&config_str).map_err(|e| CliError::new(EXIT_INVALID_CONFIG, e.to_string()))
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let sources: Vec<&str> = config.enabled_sources().iter().map(Source::as_str).collect();
    eprintln!(
        "{}: ok ('{}', sources: {}, tolerance {})",
        config_path.display(),
        config.name,
        sources.join(", "),
        config.tolerance
    );
    Ok(())
}

fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve source paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let input = load_input(&config, base_dir)?;
    let report = floatcov_recon::run(&config, &input)
        .map_err(|e| CliError::new(coverage_exit_code(&e), e.to_string()))?;

    let output_file = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref path) = output_file {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        std::fs::write(path, json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        print_json(&report)?;
    }

    print_summary(&report);

    match summary_exit_code(&report.summary) {
        EXIT_SUCCESS => Ok(()),
        code => Err(CliError::silent(code)),
    }
}

/// Read every configured source. In range-count mode the index is counted
/// month by month over the window, or over its own date extent.
fn load_input(config: &CoverageConfig, base_dir: &Path) -> Result<CoverageInput, CliError> {
    let mut input = CoverageInput::default();

    if let Some(fs) = &config.sources.filesystem {
        let root = base_dir.join(&fs.root);
        let records = inventory::scan(&root, &fs.pattern).map_err(|e| CliError::io(e.to_string()))?;
        input.records.insert(Source::Filesystem, records);
    }

    if let Some(ex) = &config.sources.export {
        let path = base_dir.join(&ex.file);
        let sample = export::read_export(&path).map_err(|e| CliError::io(e.to_string()))?;
        if sample.skipped_rows > 0 {
            log::warn!("{}: {} malformed row(s) skipped", path.display(), sample.skipped_rows);
        }
        input.records.insert(Source::Export, sample.records);
    }

    if let Some(ix) = &config.sources.index {
        let path = base_dir.join(&ix.snapshot);
        let store = SnapshotStore::open(&path).map_err(|e| CliError::io(e.to_string()))?;
        match ix.mode {
            IndexMode::Enumerate => {
                let records = index_store::enumerate(&store, ix.page_size)
                    .map_err(|e| CliError::io(e.to_string()))?;
                input.records.insert(Source::Index, records);
            }
            IndexMode::RangeCount => {
                let tally = index_store::range_count_tally(&store, config.window.as_ref())
                    .map_err(|e| CliError::io(e.to_string()))?;
                input.tallies.push(tally);
            }
        }
    }

    Ok(input)
}

fn print_summary(report: &CoverageReport) {
    let s = &report.summary;
    eprintln!(
        "coverage '{}': {} month(s): {} consistent, {} discrepant, {} missing in one or more",
        report.meta.config_name, s.total_buckets, s.consistent, s.discrepant, s.missing_in_one_or_more,
    );

    for row in &report.rows {
        let counts: Vec<String> = Source::ALL
            .into_iter()
            .filter(|src| report.ingest.contains_key(src))
            .map(|src| format!("{src}={}", row.count(src)))
            .collect();
        eprintln!("  {}  {:<24} {}", row.bucket, row.status.to_string(), counts.join(" "));
    }

    if let Some(gap) = s.most_recent_gap {
        eprintln!("most recent gap: {gap}");
    }
    if !s.stale_sources.is_empty() {
        let stale: Vec<String> = s
            .stale_sources
            .iter()
            .filter_map(|src| {
                let latest = s.latest_by_source.get(src)?;
                Some(format!("{src} (latest {latest})"))
            })
            .collect();
        eprintln!("stale: {}", stale.join(", "));
    }
    for (src, stats) in &report.ingest {
        if stats.unparseable > 0 || stats.out_of_window > 0 {
            eprintln!(
                "{src}: {} undated, {} outside window",
                stats.unparseable, stats.out_of_window
            );
        }
    }
}
