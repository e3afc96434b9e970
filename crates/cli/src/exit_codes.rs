//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: cron jobs and CI steps branch
//! on them.
//!
//! | Code | Meaning                                               |
//! |------|-------------------------------------------------------|
//! | 0    | Success; every compared bucket consistent             |
//! | 1    | General error (unspecified)                           |
//! | 2    | CLI usage error (bad args)                            |
//! | 3    | Coverage gap: some bucket is `missing_in_one_or_more` |
//! | 4    | Discrepant buckets only (no gaps)                     |
//! | 5    | Invalid config                                        |
//! | 6    | Runtime / IO failure reading a source                 |
//! | 7    | Empty dataset: nothing could be bucketed              |
//! | 8    | Chat probe failed                                     |

use floatcov_recon::{CoverageError, Summary};

/// Success - command completed, nothing flagged.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// At least one bucket has a source at zero while another has data.
pub const EXIT_COVERAGE_GAP: u8 = 3;

/// Counts disagree beyond tolerance somewhere, but no source is empty.
pub const EXIT_COVERAGE_DISCREPANT: u8 = 4;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 5;

/// A source could not be read (missing file, bad snapshot line, ...).
pub const EXIT_RUNTIME: u8 = 6;

/// Sources were read but no record had a usable date.
pub const EXIT_EMPTY_DATASET: u8 = 7;

/// Health check or a chat query failed.
pub const EXIT_PROBE_FAILED: u8 = 8;

/// Map an engine error to its exit code.
pub fn coverage_exit_code(err: &CoverageError) -> u8 {
    match err {
        CoverageError::ConfigParse(_)
        | CoverageError::ConfigValidation(_)
        | CoverageError::InvalidTolerance(_) => EXIT_INVALID_CONFIG,
        CoverageError::EmptyDataset { .. } => EXIT_EMPTY_DATASET,
        CoverageError::InvalidSource { .. } => EXIT_ERROR,
    }
}

/// Exit code for a completed run. Gaps outrank discrepancies.
pub fn summary_exit_code(summary: &Summary) -> u8 {
    if summary.missing_in_one_or_more > 0 {
        EXIT_COVERAGE_GAP
    } else if summary.discrepant > 0 {
        EXIT_COVERAGE_DISCREPANT
    } else {
        EXIT_SUCCESS
    }
}
