use std::collections::BTreeMap;

use crate::classify::classify_tally;
use crate::config::CoverageConfig;
use crate::error::CoverageError;
use crate::evidence::summarize;
use crate::model::{
    CoverageReport, CoverageRow, DateWindow, IngestStats, Record, ReportMeta, Source,
};
use crate::tally::Tally;

/// Accumulates per-source tallies, then compares them bucket by bucket.
///
/// Single caller, sequential `ingest` calls. For parallel collection build
/// one [`Tally`] per source and hand them over with [`Reconciler::ingest_tally`].
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    tally: Tally,
    window: Option<DateWindow>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records dated outside `[from, to)` are skipped and counted as out of window.
    pub fn with_window(window: DateWindow) -> Self {
        Self {
            tally: Tally::new(),
            window: Some(window),
        }
    }

    /// Ingest records for a source given by name.
    pub fn ingest(&mut self, source_id: &str, records: &[Record]) -> Result<IngestStats, CoverageError> {
        let source: Source = source_id.parse().map_err(|_| CoverageError::InvalidSource {
            source_id: source_id.to_string(),
            buckets_compared: self.tally.buckets().len(),
        })?;
        Ok(self.ingest_source(source, records))
    }

    /// Ingest records for a known source. Returns stats for this batch only.
    pub fn ingest_source(&mut self, source: Source, records: &[Record]) -> IngestStats {
        let batch = Tally::from_records(source, records, self.window.as_ref());
        let stats = batch.stats().get(&source).copied().unwrap_or_default();
        if stats.unparseable > 0 {
            log::warn!("{source}: skipped {} record(s) with unparseable timestamps", stats.unparseable);
        }
        log::debug!(
            "{source}: ingested {} record(s), {} outside window",
            stats.accepted,
            stats.out_of_window
        );
        self.ingest_tally(batch);
        stats
    }

    pub fn ingest_tally(&mut self, tally: Tally) {
        let current = std::mem::take(&mut self.tally);
        self.tally = current.merge(tally);
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// One row per bucket seen in any source, oldest first. Does not mutate.
    pub fn reconcile(&self, tolerance: f64) -> Result<Vec<CoverageRow>, CoverageError> {
        if !tolerance.is_finite() || !(0.0..1.0).contains(&tolerance) {
            return Err(CoverageError::InvalidTolerance(tolerance));
        }
        if self.tally.total_accepted() == 0 {
            return Err(CoverageError::EmptyDataset {
                unparseable: self.tally.total_unparseable(),
                out_of_window: self.tally.total_out_of_window(),
            });
        }
        Ok(classify_tally(&self.tally, tolerance))
    }
}

/// Materialised collaborator output for one configured run.
#[derive(Debug, Default)]
pub struct CoverageInput {
    pub records: BTreeMap<Source, Vec<Record>>,
    /// Pre-counted tallies (e.g. exact range counts from the index).
    pub tallies: Vec<Tally>,
}

/// Run one coverage check per config. Returns rows, summary and ingest stats.
pub fn run(config: &CoverageConfig, input: &CoverageInput) -> Result<CoverageReport, CoverageError> {
    let mut reconciler = match config.window {
        Some(window) => Reconciler::with_window(window),
        None => Reconciler::new(),
    };

    for (source, records) in &input.records {
        reconciler.ingest_source(*source, records);
    }
    for tally in &input.tallies {
        reconciler.ingest_tally(tally.clone());
    }

    let rows = reconciler.reconcile(config.tolerance)?;
    let summary = summarize(&rows);

    log::info!(
        "'{}': {} bucket(s), {} gap(s), {} discrepant",
        config.name,
        summary.total_buckets,
        summary.missing_in_one_or_more,
        summary.discrepant
    );

    Ok(CoverageReport {
        meta: ReportMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            tolerance: config.tolerance,
            window: config.window,
        },
        summary,
        rows,
        ingest: reconciler.tally().stats().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageStatus, TimeBucket};

    fn batch(prefix: &str, date: &str, n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("{prefix}_{i}"), Some(date.to_string())))
            .collect()
    }

    #[test]
    fn ingest_by_name() {
        let mut r = Reconciler::new();
        let stats = r.ingest("filesystem", &batch("fs", "2024-10-01", 3)).unwrap();
        assert_eq!(stats.accepted, 3);
        assert_eq!(r.tally().total_accepted(), 3);
    }

    #[test]
    fn unknown_source_reports_progress() {
        let mut r = Reconciler::new();
        r.ingest("export", &batch("e", "2024-09-01", 1)).unwrap();
        r.ingest("export", &batch("e", "2024-10-01", 1)).unwrap();
        let err = r.ingest("bigtable", &batch("b", "2024-10-01", 1)).unwrap_err();
        assert!(err.to_string().contains("'bigtable'"));
        assert!(err.to_string().contains("2 bucket(s)"));
        match err {
            CoverageError::InvalidSource { source_id, buckets_compared } => {
                assert_eq!(source_id, "bigtable");
                assert_eq!(buckets_compared, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Rejected batch leaves the tally untouched.
        assert_eq!(r.tally().total_accepted(), 2);
    }

    #[test]
    fn empty_reconcile_fails() {
        let r = Reconciler::new();
        assert!(matches!(r.reconcile(0.0), Err(CoverageError::EmptyDataset { .. })));
    }

    #[test]
    fn only_unparseable_is_empty() {
        let mut r = Reconciler::new();
        r.ingest_source(Source::Export, &batch("e", "garbage", 4));
        match r.reconcile(0.0) {
            Err(CoverageError::EmptyDataset { unparseable, .. }) => assert_eq!(unparseable, 4),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn tolerance_out_of_range_fails() {
        let mut r = Reconciler::new();
        r.ingest_source(Source::Export, &batch("e", "2024-10-01", 1));
        assert!(matches!(r.reconcile(1.0), Err(CoverageError::InvalidTolerance(_))));
        assert!(matches!(r.reconcile(-0.5), Err(CoverageError::InvalidTolerance(_))));
        assert!(matches!(r.reconcile(f64::NAN), Err(CoverageError::InvalidTolerance(_))));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut r = Reconciler::new();
        r.ingest_source(Source::Filesystem, &batch("fs", "2024-09-03", 10));
        r.ingest_source(Source::Index, &batch("ix", "2024-09-03", 9));
        let first = r.reconcile(0.05).unwrap();
        let second = r.reconcile(0.05).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn october_gap_end_to_end() {
        let mut r = Reconciler::new();
        r.ingest_source(Source::Filesystem, &batch("fs", "2024-10-15", 31));
        r.ingest_source(Source::Index, &[]);
        r.ingest_source(Source::Export, &batch("ex", "2024-10-02", 5));

        let rows = r.reconcile(0.05).unwrap();
        assert_eq!(rows.len(), 1);
        let oct = TimeBucket::new(2024, 10).unwrap();
        assert_eq!(rows[0].bucket, oct);
        assert_eq!(rows[0].count(Source::Filesystem), 31);
        assert_eq!(rows[0].count(Source::Index), 0);
        assert_eq!(rows[0].count(Source::Export), 5);
        assert_eq!(rows[0].status, CoverageStatus::MissingInOneOrMore);

        let summary = summarize(&rows);
        assert_eq!(summary.most_recent_gap, Some(oct));
        assert_eq!(summary.gap_buckets, vec![oct]);
    }

    #[test]
    fn window_applies_to_ingest() {
        let window = DateWindow {
            from: chrono::NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            to: chrono::NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
        };
        let mut r = Reconciler::with_window(window);
        let stats = r.ingest_source(Source::Filesystem, &batch("fs", "2024-09-30", 2));
        assert_eq!(stats.out_of_window, 2);
        r.ingest_source(Source::Filesystem, &batch("fs", "2024-10-01", 1));
        assert_eq!(r.reconcile(0.0).unwrap().len(), 1);
    }
}
