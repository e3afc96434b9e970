// CSV export reader

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use thiserror::Error;

use floatcov_recon::Record;

/// Columns every export must carry.
pub const REQUIRED_COLUMNS: [&str; 2] = ["id", "date"];

/// Columns copied into the record's field bag when present.
/// The `metadata.` prefix is dropped from the field name.
pub const CARRIED_COLUMNS: [&str; 4] = [
    "metadata.float_wmo_id",
    "metadata.latitude",
    "metadata.longitude",
    "document",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("{path}: cannot read header row: {message}")]
    Header { path: String, message: String },
    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: String, column: String },
}

#[derive(Debug, Clone, Default)]
pub struct ExportSample {
    pub records: Vec<Record>,
    /// Rows that could not be read (wrong field count, empty id, bad quoting).
    pub skipped_rows: usize,
}

/// Shape of an export at a glance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportProfile {
    pub rows: usize,
    pub skipped_rows: usize,
    pub undated_rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unique_floats: usize,
}

impl ExportSample {
    pub fn profile(&self) -> ExportProfile {
        let dates: Vec<NaiveDate> = self.records.iter().filter_map(|r| r.date()).collect();
        let floats: BTreeSet<&str> = self
            .records
            .iter()
            .filter_map(|r| r.fields.get("float_wmo_id").map(String::as_str))
            .collect();
        ExportProfile {
            rows: self.records.len(),
            skipped_rows: self.skipped_rows,
            undated_rows: self.records.len() - dates.len(),
            first_date: dates.iter().min().copied(),
            last_date: dates.iter().max().copied(),
            unique_floats: floats.len(),
        }
    }
}

pub fn read_export(path: &Path) -> Result<ExportSample, ExportError> {
    let label = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| ExportError::Io {
        path: label.clone(),
        message: e.to_string(),
    })?;
    parse_export(&decode(&bytes, &label), &label)
}

/// A byte-order mark picks the encoding; otherwise strict UTF-8, and
/// anything that is not UTF-8 is read as Windows-1252.
fn decode(bytes: &[u8], label: &str) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            log::info!("{label}: not UTF-8 at byte {}, reading as Windows-1252", e.valid_up_to());
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Parse export text. `label` names the input in errors and logs.
pub fn parse_export(content: &str, label: &str) -> Result<ExportSample, ExportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExportError::Header {
            path: label.to_string(),
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        idx(name).ok_or_else(|| ExportError::MissingColumn {
            path: label.to_string(),
            column: name.to_string(),
        })
    };

    let id_idx = required(REQUIRED_COLUMNS[0])?;
    let date_idx = required(REQUIRED_COLUMNS[1])?;
    let carried: Vec<(usize, &str)> = CARRIED_COLUMNS
        .into_iter()
        .filter_map(|c| idx(c).map(|i| (i, c.trim_start_matches("metadata."))))
        .collect();

    let mut sample = ExportSample::default();

    for (row_no, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                log::warn!("{label}: skipping row {}: {e}", row_no + 2);
                sample.skipped_rows += 1;
                continue;
            }
        };

        let id = row.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            log::warn!("{label}: skipping row {}: empty id", row_no + 2);
            sample.skipped_rows += 1;
            continue;
        }

        let date = row.get(date_idx).unwrap_or("").trim();
        let timestamp = (!date.is_empty()).then(|| date.to_string());

        let mut record = Record::new(id, timestamp);
        for &(i, name) in &carried {
            if let Some(v) = row.get(i) {
                if !v.is_empty() {
                    record = record.with_field(name, v);
                }
            }
        }
        sample.records.push(record);
    }

    log::info!(
        "{label}: {} row(s) read, {} skipped",
        sample.records.len(),
        sample.skipped_rows
    );
    Ok(sample)
}
