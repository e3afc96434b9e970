use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CoverageRow, CoverageStatus, Source, TimeBucket};
use crate::tally::Tally;

/// `|a - b| / max(a, b, 1)`.
pub fn relative_difference(a: u64, b: u64) -> f64 {
    let denom = a.max(b).max(1) as f64;
    a.abs_diff(b) as f64 / denom
}

/// Classify one bucket's counts.
///
/// Only participating sources are compared. A participant reporting zero
/// while another reports data is a gap, whatever the tolerance. Otherwise
/// the largest pairwise relative difference is checked against `tolerance`
/// (boundary inclusive: equal to tolerance is still consistent).
pub fn classify_bucket(
    counts: &BTreeMap<Source, u64>,
    participants: &BTreeSet<Source>,
    tolerance: f64,
) -> CoverageStatus {
    let compared: Vec<u64> = participants
        .iter()
        .map(|s| counts.get(s).copied().unwrap_or(0))
        .collect();

    let any_zero = compared.iter().any(|&c| c == 0);
    let any_nonzero = compared.iter().any(|&c| c > 0);
    if any_zero && any_nonzero {
        return CoverageStatus::MissingInOneOrMore;
    }

    let mut max_diff = 0.0f64;
    for (i, &a) in compared.iter().enumerate() {
        for &b in &compared[i + 1..] {
            max_diff = max_diff.max(relative_difference(a, b));
        }
    }

    if max_diff > tolerance {
        CoverageStatus::Discrepant
    } else {
        CoverageStatus::Consistent
    }
}

/// One row per bucket seen in any source, oldest first.
pub fn classify_tally(tally: &Tally, tolerance: f64) -> Vec<CoverageRow> {
    tally
        .buckets()
        .into_iter()
        .map(|bucket| build_row(tally, bucket, tolerance))
        .collect()
}

fn build_row(tally: &Tally, bucket: TimeBucket, tolerance: f64) -> CoverageRow {
    let counts: BTreeMap<Source, u64> = Source::ALL
        .iter()
        .map(|&s| (s, tally.count(bucket, s)))
        .collect();
    let status = classify_bucket(&counts, tally.participants(), tolerance);
    CoverageRow { bucket, counts, status }
}
