use std::collections::BTreeMap;

use crate::model::{CoverageRow, CoverageStatus, Source, Summary, TimeBucket};

/// Aggregate statistics over reconciled rows. Pure; input order does not matter.
pub fn summarize(rows: &[CoverageRow]) -> Summary {
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut consistent = 0;
    let mut discrepant = 0;
    let mut missing = 0;
    let mut gap_buckets: Vec<TimeBucket> = Vec::new();
    let mut latest_by_source: BTreeMap<Source, TimeBucket> = BTreeMap::new();

    for row in rows {
        *status_counts.entry(row.status.to_string()).or_insert(0) += 1;

        match row.status {
            CoverageStatus::Consistent => consistent += 1,
            CoverageStatus::Discrepant => discrepant += 1,
            CoverageStatus::MissingInOneOrMore => {
                missing += 1;
                gap_buckets.push(row.bucket);
            }
        }

        for (&source, &count) in &row.counts {
            if count == 0 {
                continue;
            }
            latest_by_source
                .entry(source)
                .and_modify(|b| *b = (*b).max(row.bucket))
                .or_insert(row.bucket);
        }
    }

    gap_buckets.sort();
    gap_buckets.dedup();

    let most_recent_bucket = latest_by_source.values().max().copied();
    let most_recent_gap = gap_buckets.last().copied();

    // Sources with no data at all never appear here.
    let stale_sources = match most_recent_bucket {
        Some(latest) => latest_by_source
            .iter()
            .filter(|(_, b)| **b < latest)
            .map(|(s, _)| *s)
            .collect(),
        None => Vec::new(),
    };

    Summary {
        total_buckets: rows.len(),
        consistent,
        discrepant,
        missing_in_one_or_more: missing,
        status_counts,
        gap_buckets,
        most_recent_bucket,
        most_recent_gap,
        latest_by_source,
        stale_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: i32, month: u32, fs: u64, idx: u64, exp: u64, status: CoverageStatus) -> CoverageRow {
        CoverageRow {
            bucket: TimeBucket::new(year, month).unwrap(),
            counts: BTreeMap::from([
                (Source::Filesystem, fs),
                (Source::Index, idx),
                (Source::Export, exp),
            ]),
            status,
        }
    }

    #[test]
    fn summary_counts() {
        let rows = vec![
            row(2024, 8, 30, 30, 30, CoverageStatus::Consistent),
            row(2024, 9, 30, 25, 30, CoverageStatus::Discrepant),
            row(2024, 10, 31, 0, 5, CoverageStatus::MissingInOneOrMore),
        ];
        let s = summarize(&rows);
        assert_eq!(s.total_buckets, 3);
        assert_eq!(s.consistent, 1);
        assert_eq!(s.discrepant, 1);
        assert_eq!(s.missing_in_one_or_more, 1);
        assert_eq!(s.status_counts["missing_in_one_or_more"], 1);
        assert_eq!(s.most_recent_gap, TimeBucket::new(2024, 10));
    }

    #[test]
    fn detects_stale_source() {
        let rows = vec![
            row(2024, 9, 30, 30, 0, CoverageStatus::MissingInOneOrMore),
            row(2024, 10, 31, 0, 0, CoverageStatus::MissingInOneOrMore),
        ];
        let s = summarize(&rows);
        assert_eq!(s.most_recent_bucket, TimeBucket::new(2024, 10));
        assert_eq!(s.latest_by_source[&Source::Index], TimeBucket::new(2024, 9).unwrap());
        assert_eq!(s.stale_sources, vec![Source::Index]);
        assert!(!s.latest_by_source.contains_key(&Source::Export));
    }

    #[test]
    fn gap_buckets_sorted_even_from_unsorted_input() {
        let rows = vec![
            row(2024, 10, 31, 0, 5, CoverageStatus::MissingInOneOrMore),
            row(2023, 1, 3, 0, 0, CoverageStatus::MissingInOneOrMore),
        ];
        let s = summarize(&rows);
        assert_eq!(
            s.gap_buckets,
            vec![TimeBucket::new(2023, 1).unwrap(), TimeBucket::new(2024, 10).unwrap()]
        );
    }

    #[test]
    fn empty_rows() {
        let s = summarize(&[]);
        assert_eq!(s.total_buckets, 0);
        assert!(s.most_recent_bucket.is_none());
        assert!(s.stale_sources.is_empty());
    }
}
