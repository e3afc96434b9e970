//! `floatcov export`: profile a CSV export before comparing it.

use std::path::PathBuf;

use serde::Serialize;

use floatcov_io::export::{read_export, ExportProfile};

use crate::exit_codes::EXIT_EMPTY_DATASET;
use crate::{print_json, CliError};

#[derive(Serialize)]
struct ExportOutput {
    file: String,
    #[serde(flatten)]
    profile: ExportProfile,
}

pub fn cmd_export(file: PathBuf, json: bool) -> Result<(), CliError> {
    let sample = read_export(&file).map_err(|e| CliError::io(e.to_string()))?;
    let out = ExportOutput {
        file: file.display().to_string(),
        profile: sample.profile(),
    };

    if json {
        print_json(&out)?;
    } else {
        let p = &out.profile;
        eprintln!("{}: {} row(s), {} skipped", out.file, p.rows, p.skipped_rows);
        match (p.first_date, p.last_date) {
            (Some(first), Some(last)) => eprintln!("  dates: {first} to {last}"),
            _ => eprintln!("  dates: none"),
        }
        if p.undated_rows > 0 {
            eprintln!("  undated: {}", p.undated_rows);
        }
        eprintln!("  floats: {}", p.unique_floats);
    }

    if out.profile.rows == 0 {
        return Err(CliError::new(EXIT_EMPTY_DATASET, format!("{} has no rows", out.file)));
    }
    Ok(())
}
