//! `floatcov store`: read-only inspection of an index snapshot.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;

use floatcov_io::store::{
    month_hit_rate, month_queries, verify_ids, DateRange, MetadataStore, SnapshotStore, StoreBatch,
};
use floatcov_recon::TimeBucket;

use crate::exit_codes::{EXIT_COVERAGE_DISCREPANT, EXIT_COVERAGE_GAP};
use crate::{print_json, CliError};

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Exact number of documents dated in [--from, --to)
    #[command(after_help = "\
Examples:
  floatcov store count index.jsonl
  floatcov store count index.jsonl --from 2024-10-01 --to 2024-11-01")]
    Count {
        snapshot: PathBuf,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },

    /// Documents in storage order
    Sample {
        snapshot: PathBuf,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },

    /// Free-text search, best match first
    #[command(after_help = "\
Examples:
  floatcov store query index.jsonl 'temperature october 2024' -n 5
  floatcov store query index.jsonl salinity --from 2024-10-01 --to 2024-11-01 --json")]
    Query {
        snapshot: PathBuf,
        text: String,
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        n_results: usize,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },

    /// How many top search hits fall in a given month
    #[command(name = "query-coverage", after_help = "\
Examples:
  floatcov store query-coverage index.jsonl --month 2024-10
  floatcov store query-coverage index.jsonl --month 2024-10 -q 'october salinity' -n 20 --json

Exits 4 when the month has documents but no query returns any of them.")]
    QueryCoverage {
        snapshot: PathBuf,
        /// Target month (YYYY-MM)
        #[arg(long)]
        month: TimeBucket,
        /// Query text (repeatable); defaults to a set naming the month
        #[arg(short = 'q', long = "query")]
        queries: Vec<String>,
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        n_results: usize,
        #[arg(long)]
        json: bool,
    },

    /// Look up export ids in the snapshot and compare dates
    #[command(name = "verify-ids", after_help = "\
Examples:
  floatcov store verify-ids index.jsonl exports/chroma_2024-10.csv --sample 50

Exits 3 when ids are missing, 4 when only dates disagree.")]
    VerifyIds {
        snapshot: PathBuf,
        export: PathBuf,
        /// Check only the first N export rows (0 = all)
        #[arg(long, default_value_t = 100)]
        sample: usize,
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_store(cmd: StoreCommands) -> Result<(), CliError> {
    match cmd {
        StoreCommands::Count { snapshot, from, to, json } => {
            let store = open(&snapshot)?;
            let range = date_range(from, to)?;
            let count = store.count_range(&range).map_err(|e| CliError::io(e.to_string()))?;
            if json {
                return print_json(&CountOutput { snapshot: snapshot.display().to_string(), range, count });
            }
            eprintln!("{count} document(s) in {}", describe(&range));
            Ok(())
        }
        StoreCommands::Sample { snapshot, offset, limit, json } => {
            let store = open(&snapshot)?;
            let batch = store.get(offset, limit).map_err(|e| CliError::io(e.to_string()))?;
            show_batch(&batch, json)
        }
        StoreCommands::Query { snapshot, text, n_results, from, to, json } => {
            if text.trim().is_empty() {
                return Err(CliError::args("query text must not be empty"));
            }
            let store = open(&snapshot)?;
            let range = date_range(from, to)?;
            let filter = (range != DateRange::default()).then_some(range);
            let batch = store
                .query(&text, n_results, filter.as_ref())
                .map_err(|e| CliError::io(e.to_string()))?;
            show_batch(&batch, json)
        }
        StoreCommands::QueryCoverage { snapshot, month, queries, n_results, json } => {
            cmd_query_coverage(&snapshot, month, queries, n_results, json)
        }
        StoreCommands::VerifyIds { snapshot, export, sample, json } => {
            cmd_verify_ids(&snapshot, &export, sample, json)
        }
    }
}

#[derive(Serialize)]
struct CountOutput {
    snapshot: String,
    range: DateRange,
    count: usize,
}

fn open(path: &Path) -> Result<SnapshotStore, CliError> {
    SnapshotStore::open(path).map_err(|e| {
        CliError::io(e.to_string()).with_hint("a snapshot is one {\"id\", \"metadata\", \"document\"} object per line")
    })
}

fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<DateRange, CliError> {
    if let (Some(f), Some(t)) = (from, to) {
        if f >= t {
            return Err(CliError::args(format!("--from ({f}) must be before --to ({t})")));
        }
    }
    Ok(DateRange::new(from, to))
}

fn describe(range: &DateRange) -> String {
    let show = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "..".to_string());
    format!("[{}, {})", show(range.from), show(range.to))
}

fn show_batch(batch: &StoreBatch, json: bool) -> Result<(), CliError> {
    if json {
        return print_json(batch);
    }
    for ((id, meta), doc) in batch.ids.iter().zip(&batch.metadatas).zip(&batch.documents) {
        let excerpt: String = doc.chars().take(80).collect();
        eprintln!("{id}  {}  float {}  {excerpt}", meta.date, meta.float_wmo_id);
    }
    eprintln!("{} document(s)", batch.len());
    Ok(())
}

fn cmd_query_coverage(
    snapshot: &Path,
    month: TimeBucket,
    queries: Vec<String>,
    n_results: usize,
    json: bool,
) -> Result<(), CliError> {
    if n_results == 0 {
        return Err(CliError::args("--limit must be at least 1"));
    }
    let store = open(snapshot)?;
    let queries = if queries.is_empty() { month_queries(month) } else { queries };
    let report = month_hit_rate(&store, month, &queries, n_results)
        .map_err(|e| CliError::io(e.to_string()))?;

    if json {
        print_json(&report)?;
    } else {
        eprintln!("{month}: {} document(s) in the snapshot", report.month_documents);
        for q in &report.queries {
            eprintln!("  {:>3}/{:<3} {}", q.in_month, q.results, q.query);
            if let (Some(id), Some(date)) = (&q.top_id, &q.top_date) {
                eprintln!("          top: {id} ({date})");
            }
        }
        eprintln!(
            "{}/{} hit(s) dated {month}",
            report.total_in_month(),
            report.total_results()
        );
    }

    if report.is_hidden() {
        return Err(CliError::new(
            EXIT_COVERAGE_DISCREPANT,
            format!("search never returns {month} although the snapshot holds it"),
        )
        .with_hint("the ranking favours other months; try a date-filtered query"));
    }
    Ok(())
}

fn cmd_verify_ids(snapshot: &Path, export_path: &Path, sample: usize, json: bool) -> Result<(), CliError> {
    let store = open(snapshot)?;
    let mut exported = floatcov_io::export::read_export(export_path)
        .map_err(|e| CliError::io(e.to_string()))?
        .records;
    if sample > 0 {
        exported.truncate(sample);
    }

    let check = verify_ids(&store, &exported).map_err(|e| CliError::io(e.to_string()))?;

    if json {
        print_json(&check)?;
    } else {
        eprintln!("{}/{} export id(s) found in the snapshot", check.found, check.requested);
        for id in check.missing.iter().take(20) {
            eprintln!("  missing: {id}");
        }
        for m in check.date_mismatches.iter().take(20) {
            eprintln!(
                "  date mismatch: {} (export {}, store {})",
                m.id,
                m.export_date.as_deref().unwrap_or("-"),
                m.store_date
            );
        }
    }

    if !check.missing.is_empty() {
        Err(CliError::silent(EXIT_COVERAGE_GAP))
    } else if !check.date_mismatches.is_empty() {
        Err(CliError::silent(EXIT_COVERAGE_DISCREPANT))
    } else {
        Ok(())
    }
}
