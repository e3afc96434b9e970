use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DateWindow, IngestStats, Record, Source, TimeBucket};

/// Per-(bucket, source) record counts plus which sources took part.
///
/// Only non-zero cells are stored, so two tallies describing the same data
/// compare equal regardless of how they were built. A source participates
/// once anything (even an empty batch) was ingested for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    cells: BTreeMap<(TimeBucket, Source), u64>,
    participants: BTreeSet<Source>,
    stats: BTreeMap<Source, IngestStats>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one source's records. Independent tallies can be built in
    /// parallel and combined with [`Tally::merge`].
    pub fn from_records(source: Source, records: &[Record], window: Option<&DateWindow>) -> Self {
        let mut tally = Tally::new();
        tally.participate(source);
        for record in records {
            tally.record(source, record, window);
        }
        tally
    }

    pub fn participate(&mut self, source: Source) {
        self.participants.insert(source);
        self.stats.entry(source).or_default();
    }

    /// Count one record. Unparseable or out-of-window records only touch stats.
    pub fn record(&mut self, source: Source, record: &Record, window: Option<&DateWindow>) {
        self.participate(source);
        let stats = self.stats.entry(source).or_default();
        let Some(date) = record.date() else {
            stats.unparseable += 1;
            return;
        };
        if let Some(w) = window {
            if !w.contains(date) {
                stats.out_of_window += 1;
                return;
            }
        }
        stats.accepted += 1;
        *self.cells.entry((TimeBucket::from_date(date), source)).or_insert(0) += 1;
    }

    /// Add a pre-counted cell, e.g. from an exact range-count query.
    pub fn add_count(&mut self, bucket: TimeBucket, source: Source, count: u64) {
        self.participate(source);
        if count == 0 {
            return;
        }
        if let Some(stats) = self.stats.get_mut(&source) {
            stats.accepted += count;
        }
        *self.cells.entry((bucket, source)).or_insert(0) += count;
    }

    pub fn count(&self, bucket: TimeBucket, source: Source) -> u64 {
        self.cells.get(&(bucket, source)).copied().unwrap_or(0)
    }

    /// Every bucket with a non-zero count in any source, oldest first.
    pub fn buckets(&self) -> BTreeSet<TimeBucket> {
        self.cells.keys().map(|(bucket, _)| *bucket).collect()
    }

    pub fn participants(&self) -> &BTreeSet<Source> {
        &self.participants
    }

    pub fn stats(&self) -> &BTreeMap<Source, IngestStats> {
        &self.stats
    }

    pub fn total_accepted(&self) -> u64 {
        self.cells.values().sum()
    }

    pub fn total_unparseable(&self) -> u64 {
        self.stats.values().map(|s| s.unparseable).sum()
    }

    pub fn total_out_of_window(&self) -> u64 {
        self.stats.values().map(|s| s.out_of_window).sum()
    }

    /// Cell-wise addition. Associative and commutative.
    pub fn merge(mut self, other: Tally) -> Tally {
        for (key, count) in other.cells {
            *self.cells.entry(key).or_insert(0) += count;
        }
        self.participants.extend(other.participants);
        for (source, stats) in other.stats {
            let entry = self.stats.entry(source).or_default();
            *entry = entry.merge(stats);
        }
        self
    }

    pub fn merge_all(tallies: impl IntoIterator<Item = Tally>) -> Tally {
        tallies.into_iter().fold(Tally::new(), Tally::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(id: &str, ts: &str) -> Record {
        Record::new(id, Some(ts.to_string()))
    }

    fn oct_2024() -> TimeBucket {
        TimeBucket::new(2024, 10).unwrap()
    }

    #[test]
    fn counts_by_month() {
        let records = vec![
            rec("a", "2024-10-01"),
            rec("b", "2024-10-31"),
            rec("c", "2024-11-01"),
        ];
        let t = Tally::from_records(Source::Filesystem, &records, None);
        assert_eq!(t.count(oct_2024(), Source::Filesystem), 2);
        assert_eq!(t.count(TimeBucket::new(2024, 11).unwrap(), Source::Filesystem), 1);
        assert_eq!(t.count(oct_2024(), Source::Index), 0);
        assert_eq!(t.buckets().len(), 2);
    }

    #[test]
    fn unparseable_records_are_counted_not_tallied() {
        let records = vec![
            rec("a", "2024-10-01"),
            rec("b", "not a date"),
            Record::new("c", None),
        ];
        let t = Tally::from_records(Source::Export, &records, None);
        let stats = t.stats()[&Source::Export];
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.unparseable, 2);
        assert_eq!(t.total_accepted(), 1);
    }

    #[test]
    fn window_filters_records() {
        let window = DateWindow {
            from: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
        };
        let records = vec![rec("a", "2024-09-30"), rec("b", "2024-10-15"), rec("c", "2024-11-01")];
        let t = Tally::from_records(Source::Index, &records, Some(&window));
        let stats = t.stats()[&Source::Index];
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.out_of_window, 2);
    }

    #[test]
    fn empty_batch_still_participates() {
        let t = Tally::from_records(Source::Index, &[], None);
        assert!(t.participants().contains(&Source::Index));
        assert_eq!(t.total_accepted(), 0);
    }

    #[test]
    fn add_count_zero_only_marks_participation() {
        let mut a = Tally::new();
        a.add_count(oct_2024(), Source::Index, 0);
        assert!(a.participants().contains(&Source::Index));
        assert!(a.buckets().is_empty());

        let mut b = Tally::new();
        b.participate(Source::Index);
        assert_eq!(a, b);
    }

    #[test]
    fn merge_adds_cells() {
        let a = Tally::from_records(Source::Filesystem, &[rec("a", "2024-10-01")], None);
        let b = Tally::from_records(Source::Filesystem, &[rec("b", "2024-10-02")], None);
        let c = Tally::from_records(Source::Export, &[rec("c", "2024-10-03")], None);
        let merged = Tally::merge_all([a, b, c]);
        assert_eq!(merged.count(oct_2024(), Source::Filesystem), 2);
        assert_eq!(merged.count(oct_2024(), Source::Export), 1);
        assert_eq!(merged.participants().len(), 2);
        assert_eq!(merged.stats()[&Source::Filesystem].accepted, 2);
    }
}
