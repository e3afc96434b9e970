use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::error::CoverageError;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One of the three independently sampled views of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Filesystem,
    Index,
    Export,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Filesystem, Source::Index, Source::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Index => "index",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(Self::Filesystem),
            "index" => Ok(Self::Index),
            "export" => Ok(Self::Export),
            other => Err(CoverageError::InvalidSource {
                source_id: other.to_string(),
                buckets_compared: 0,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single profile/document as handed over by a collaborator.
///
/// `timestamp` stays raw text: parsing happens at ingest so that bad values
/// are tallied instead of failing the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub record_id: String,
    pub timestamp: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(record_id: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            record_id: record_id.into(),
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Parsed calendar date, or `None` when missing or unparseable.
    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    pub fn bucket(&self) -> Option<TimeBucket> {
        self.date().map(TimeBucket::from_date)
    }
}

/// Parse the timestamp shapes the collaborators produce.
///
/// Accepted: `2024-10-01`, `20241001`, `2024-10-01T06:12:00`,
/// `2024-10-01T06:12:00Z` / `+02:00`, `2024-10-01 06:12:00`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Year-month bucket. Field order gives chronological `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket {
    pub year: i32,
    pub month: u32,
}

impl TimeBucket {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// `None` when the year lies outside the calendar `NaiveDate` covers.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Every bucket from `self` through `last`, inclusive.
    pub fn range_inclusive(self, last: TimeBucket) -> Vec<TimeBucket> {
        let mut out = Vec::new();
        let mut cur = self;
        while cur <= last {
            out.push(cur);
            cur = cur.next();
        }
        out
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = y.parse().map_err(|_| format!("bad year in '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("bad month in '{s}'"))?;
        TimeBucket::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl Serialize for TimeBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    Consistent,
    Discrepant,
    MissingInOneOrMore,
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consistent => write!(f, "consistent"),
            Self::Discrepant => write!(f, "discrepant"),
            Self::MissingInOneOrMore => write!(f, "missing_in_one_or_more"),
        }
    }
}

/// One reconciled bucket. `counts` always carries all three sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub bucket: TimeBucket,
    pub counts: BTreeMap<Source, u64>,
    pub status: CoverageStatus,
}

impl CoverageRow {
    pub fn count(&self, source: Source) -> u64 {
        self.counts.get(&source).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_buckets: usize,
    pub consistent: usize,
    pub discrepant: usize,
    pub missing_in_one_or_more: usize,
    pub status_counts: BTreeMap<String, usize>,
    /// Buckets with a zero-vs-nonzero gap, oldest first.
    pub gap_buckets: Vec<TimeBucket>,
    pub most_recent_bucket: Option<TimeBucket>,
    pub most_recent_gap: Option<TimeBucket>,
    /// Latest bucket with a non-zero count, per source.
    pub latest_by_source: BTreeMap<Source, TimeBucket>,
    /// Sources whose latest bucket trails `most_recent_bucket`.
    pub stale_sources: Vec<Source>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub unparseable: u64,
    pub out_of_window: u64,
}

impl IngestStats {
    pub fn merge(self, other: IngestStats) -> IngestStats {
        IngestStats {
            accepted: self.accepted + other.accepted,
            unparseable: self.unparseable + other.unparseable,
            out_of_window: self.out_of_window + other.out_of_window,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub meta: ReportMeta,
    pub summary: Summary,
    pub rows: Vec<CoverageRow>,
    pub ingest: BTreeMap<Source, IngestStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub tolerance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<DateWindow>,
}

/// Half-open date window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date < self.to
    }

    /// Month buckets touched by the window.
    pub fn buckets(&self) -> Vec<TimeBucket> {
        let last = self.to.pred_opt().unwrap_or(self.to);
        TimeBucket::from_date(self.from).range_inclusive(TimeBucket::from_date(last))
    }
}
