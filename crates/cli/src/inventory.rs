//! `floatcov inventory`: profile files per month.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use floatcov_recon::{Source, Tally, TimeBucket};

use crate::exit_codes::EXIT_EMPTY_DATASET;
use crate::{print_json, CliError};

#[derive(Serialize)]
struct InventoryOutput {
    root: String,
    pattern: String,
    total_files: usize,
    undated_files: u64,
    months: BTreeMap<TimeBucket, u64>,
}

pub fn cmd_inventory(root: PathBuf, pattern: &str, json: bool) -> Result<(), CliError> {
    let records = floatcov_io::inventory::scan(&root, pattern).map_err(|e| CliError::args(e.to_string()))?;
    if records.is_empty() {
        return Err(CliError::new(
            EXIT_EMPTY_DATASET,
            format!("no files matching '{pattern}' under {}", root.display()),
        ));
    }

    let tally = Tally::from_records(Source::Filesystem, &records, None);
    let months: BTreeMap<TimeBucket, u64> = tally
        .buckets()
        .into_iter()
        .map(|b| (b, tally.count(b, Source::Filesystem)))
        .collect();

    let out = InventoryOutput {
        root: root.display().to_string(),
        pattern: pattern.to_string(),
        total_files: records.len(),
        undated_files: tally.total_unparseable(),
        months,
    };

    if json {
        return print_json(&out);
    }

    for (month, count) in &out.months {
        eprintln!("  {month}  {count:>6}");
    }
    eprintln!(
        "{} file(s) in {} month(s) under {}",
        out.total_files,
        out.months.len(),
        out.root
    );
    if out.undated_files > 0 {
        eprintln!("{} file(s) without a YYYYMMDD name prefix", out.undated_files);
    }
    Ok(())
}
