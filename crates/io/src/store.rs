//! Metadata / vector store access.
//!
//! [`MetadataStore`] is the read contract the coverage check needs from the
//! index: paged bulk reads, lookup by id, free-text similarity with an
//! optional date filter, and an exact `count(date in [a, b))`. Every read
//! returns the same parallel-vector [`StoreBatch`] shape.
//! [`MetadataStore::date_extent`] bounds which months range counting visits.
//!
//! [`SnapshotStore`] implements it over a JSON-lines dump of the collection,
//! one `{"id": .., "metadata": {..}, "document": ..}` object per line.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use floatcov_recon::model::parse_timestamp;
use floatcov_recon::{DateWindow, Record, Source, Tally, TimeBucket};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("{path}:{line}: {message}")]
    Parse { path: String, line: usize, message: String },
    #[error("{path}:{line}: duplicate id '{id}'")]
    DuplicateId { path: String, line: usize, id: String },
}

// ── Wire shapes ─────────────────────────────────────────────────────

/// Per-document metadata. `date` (ISO 8601) and `float_wmo_id` are always
/// present; anything else (position, cycle number, ...) lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub date: String,
    #[serde(deserialize_with = "string_or_number")]
    pub float_wmo_id: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "float_wmo_id: expected string or number, got {other}"
        ))),
    }
}

/// Parallel sequences: `ids[i]`, `metadatas[i]` and `documents[i]` describe
/// the same document. Similarity results are ordered by relevance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreBatch {
    pub ids: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub documents: Vec<String>,
}

impl StoreBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn push(&mut self, id: &str, metadata: &Metadata, document: &str) {
        self.ids.push(id.to_string());
        self.metadatas.push(metadata.clone());
        self.documents.push(document.to_string());
    }

    /// Convert to reconciler records (document text is not carried).
    pub fn to_records(&self) -> Vec<Record> {
        self.ids
            .iter()
            .zip(&self.metadatas)
            .map(|(id, meta)| {
                let mut record = Record::new(id.clone(), Some(meta.date.clone()))
                    .with_field("float_wmo_id", meta.float_wmo_id.clone());
                for key in ["latitude", "longitude"] {
                    if let Some(v) = meta.extra.get(key) {
                        let text = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        record = record.with_field(key, text);
                    }
                }
                record
            })
            .collect()
    }
}

/// Half-open date filter `[from, to)`; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// The days of `bucket` that fall inside `window`. `None` when the two
    /// do not overlap or the bucket lies outside the calendar.
    pub fn for_bucket(bucket: TimeBucket, window: Option<&DateWindow>) -> Option<Self> {
        let mut from = bucket.first_day()?;
        let mut to = bucket.next().first_day()?;
        if let Some(w) = window {
            from = from.max(w.from);
            to = to.min(w.to);
        }
        (from < to).then_some(Self {
            from: Some(from),
            to: Some(to),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date < t)
    }
}

// ── Contract ────────────────────────────────────────────────────────

pub trait MetadataStore {
    /// Total documents in the collection.
    fn count(&self) -> Result<usize, StoreError>;

    /// Bulk read in storage order.
    fn get(&self, offset: usize, limit: usize) -> Result<StoreBatch, StoreError>;

    /// Lookup by id. Unknown ids are omitted; found ids keep request order.
    fn get_by_ids(&self, ids: &[String]) -> Result<StoreBatch, StoreError>;

    /// Free-text similarity, best match first, optionally date-filtered.
    /// Documents sharing nothing with `text` are not returned, so a batch
    /// may be shorter than `n_results`.
    fn query(
        &self,
        text: &str,
        n_results: usize,
        range: Option<&DateRange>,
    ) -> Result<StoreBatch, StoreError>;

    /// Exact number of documents dated inside `range`.
    fn count_range(&self, range: &DateRange) -> Result<usize, StoreError>;

    /// Earliest and latest parseable document date; `None` if nothing is dated.
    fn date_extent(&self) -> Result<Option<(NaiveDate, NaiveDate)>, StoreError>;
}

// ── Snapshot implementation ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SnapshotLine {
    id: String,
    metadata: Metadata,
    #[serde(default)]
    document: String,
}

#[derive(Debug)]
struct StoredDoc {
    id: String,
    metadata: Metadata,
    document: String,
    date: Option<NaiveDate>,
    terms: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    docs: Vec<StoredDoc>,
    by_id: HashMap<String, usize>,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let label = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| StoreError::Io {
            path: label.clone(),
            message: e.to_string(),
        })?;
        Self::from_reader(std::io::BufReader::new(file), &label)
    }

    pub fn from_reader(reader: impl BufRead, label: &str) -> Result<Self, StoreError> {
        let mut store = SnapshotStore::default();

        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let line = line.map_err(|e| StoreError::Io {
                path: label.to_string(),
                message: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: SnapshotLine =
                serde_json::from_str(&line).map_err(|e| StoreError::Parse {
                    path: label.to_string(),
                    line: line_no,
                    message: e.to_string(),
                })?;
            if store.by_id.contains_key(&parsed.id) {
                return Err(StoreError::DuplicateId {
                    path: label.to_string(),
                    line: line_no,
                    id: parsed.id,
                });
            }

            let mut terms = tokenize(&parsed.document);
            terms.extend(tokenize(&parsed.metadata.date));
            terms.extend(tokenize(&parsed.metadata.float_wmo_id));

            store.by_id.insert(parsed.id.clone(), store.docs.len());
            store.docs.push(StoredDoc {
                date: parse_timestamp(&parsed.metadata.date),
                id: parsed.id,
                metadata: parsed.metadata,
                document: parsed.document,
                terms,
            });
        }

        log::debug!("{label}: loaded {} document(s)", store.docs.len());
        Ok(store)
    }

    fn in_range(doc: &StoredDoc, range: &DateRange) -> bool {
        doc.date.is_some_and(|d| range.contains(d))
    }
}

impl MetadataStore for SnapshotStore {
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.docs.len())
    }

    fn get(&self, offset: usize, limit: usize) -> Result<StoreBatch, StoreError> {
        let mut batch = StoreBatch::default();
        for doc in self.docs.iter().skip(offset).take(limit) {
            batch.push(&doc.id, &doc.metadata, &doc.document);
        }
        Ok(batch)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<StoreBatch, StoreError> {
        let mut batch = StoreBatch::default();
        for id in ids {
            if let Some(&i) = self.by_id.get(id) {
                let doc = &self.docs[i];
                batch.push(&doc.id, &doc.metadata, &doc.document);
            }
        }
        Ok(batch)
    }

    fn query(
        &self,
        text: &str,
        n_results: usize,
        range: Option<&DateRange>,
    ) -> Result<StoreBatch, StoreError> {
        let wanted = tokenize(text);

        let mut scored: Vec<(usize, &StoredDoc)> = self
            .docs
            .iter()
            .filter(|doc| range.map_or(true, |r| Self::in_range(doc, r)))
            .map(|doc| (wanted.intersection(&doc.terms).count(), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort: equal scores keep storage order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut batch = StoreBatch::default();
        for (_, doc) in scored.into_iter().take(n_results) {
            batch.push(&doc.id, &doc.metadata, &doc.document);
        }
        Ok(batch)
    }

    fn count_range(&self, range: &DateRange) -> Result<usize, StoreError> {
        Ok(self.docs.iter().filter(|doc| Self::in_range(doc, range)).count())
    }

    fn date_extent(&self) -> Result<Option<(NaiveDate, NaiveDate)>, StoreError> {
        let mut dates = self.docs.iter().filter_map(|doc| doc.date);
        let Some(first) = dates.next() else {
            return Ok(None);
        };
        Ok(Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)))))
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

// ── Helpers over any store ──────────────────────────────────────────

/// Page through the whole collection. Exact, unlike offset sampling.
pub fn enumerate(store: &dyn MetadataStore, page_size: usize) -> Result<Vec<Record>, StoreError> {
    let page_size = page_size.max(1);
    let mut records = Vec::new();
    let mut offset = 0;
    loop {
        let batch = store.get(offset, page_size)?;
        records.extend(batch.to_records());
        if batch.len() < page_size {
            break;
        }
        offset += batch.len();
    }
    Ok(records)
}

/// Exact per-month counts as an index-source tally.
///
/// Visits every month of `window`, or without one every month between the
/// store's earliest and latest dated document. Each count is clipped to the
/// window, so the result equals tallying [`enumerate`] with the same window.
pub fn range_count_tally(
    store: &dyn MetadataStore,
    window: Option<&DateWindow>,
) -> Result<Tally, StoreError> {
    let buckets: Vec<TimeBucket> = match window {
        Some(w) => w.buckets(),
        None => match store.date_extent()? {
            Some((first, last)) => {
                TimeBucket::from_date(first).range_inclusive(TimeBucket::from_date(last))
            }
            None => Vec::new(),
        },
    };

    let mut tally = Tally::new();
    tally.participate(Source::Index);
    for bucket in buckets {
        let Some(range) = DateRange::for_bucket(bucket, window) else {
            continue;
        };
        let n = store.count_range(&range)?;
        log::debug!("index: {bucket} -> {n}");
        tally.add_count(bucket, Source::Index, n as u64);
    }
    Ok(tally)
}

/// Query texts aimed at one month, phrased the way users ask.
pub fn month_queries(month: TimeBucket) -> Vec<String> {
    let label = month
        .first_day()
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_else(|| month.to_string());
    vec![
        format!("{label} temperature data"),
        format!("temperature profile {label}"),
        format!("ARGO float data from {label}"),
        format!("oceanographic measurements {label}"),
        format!("salinity temperature {label}"),
    ]
}

/// How many of one query's top hits are dated in the target month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHits {
    pub query: String,
    pub results: usize,
    pub in_month: usize,
    pub top_id: Option<String>,
    pub top_date: Option<String>,
}

/// Whether unfiltered similarity search surfaces documents from `month`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthHitRate {
    pub month: TimeBucket,
    /// Documents the store holds for the month (exact count).
    pub month_documents: usize,
    pub n_results: usize,
    pub queries: Vec<QueryHits>,
}

impl MonthHitRate {
    pub fn total_results(&self) -> usize {
        self.queries.iter().map(|q| q.results).sum()
    }

    pub fn total_in_month(&self) -> usize {
        self.queries.iter().map(|q| q.in_month).sum()
    }

    /// The month has documents but no query brought any of them back.
    pub fn is_hidden(&self) -> bool {
        self.month_documents > 0 && self.total_in_month() == 0
    }
}

/// Run each query without a date filter and count hits dated in `month`.
pub fn month_hit_rate(
    store: &dyn MetadataStore,
    month: TimeBucket,
    queries: &[String],
    n_results: usize,
) -> Result<MonthHitRate, StoreError> {
    let month_documents = match DateRange::for_bucket(month, None) {
        Some(range) => store.count_range(&range)?,
        None => 0,
    };

    let mut hits = Vec::with_capacity(queries.len());
    for query in queries {
        let batch = store.query(query, n_results, None)?;
        let in_month = batch
            .metadatas
            .iter()
            .filter(|m| parse_timestamp(&m.date).map(TimeBucket::from_date) == Some(month))
            .count();
        log::debug!("'{query}': {in_month}/{} in {month}", batch.len());
        hits.push(QueryHits {
            query: query.clone(),
            results: batch.len(),
            in_month,
            top_id: batch.ids.first().cloned(),
            top_date: batch.metadatas.first().map(|m| m.date.clone()),
        });
    }

    Ok(MonthHitRate {
        month,
        month_documents,
        n_results,
        queries: hits,
    })
}

/// Export ids looked up in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdCheck {
    pub requested: usize,
    pub found: usize,
    pub missing: Vec<String>,
    pub date_mismatches: Vec<DateMismatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateMismatch {
    pub id: String,
    pub export_date: Option<String>,
    pub store_date: String,
}

/// Check that exported records exist in the store with the same date.
pub fn verify_ids(store: &dyn MetadataStore, records: &[Record]) -> Result<IdCheck, StoreError> {
    let ids: Vec<String> = records.iter().map(|r| r.record_id.clone()).collect();
    let batch = store.get_by_ids(&ids)?;
    let found: HashMap<&str, &Metadata> = batch
        .ids
        .iter()
        .map(String::as_str)
        .zip(&batch.metadatas)
        .collect();

    let mut check = IdCheck {
        requested: records.len(),
        ..IdCheck::default()
    };
    for record in records {
        match found.get(record.record_id.as_str()) {
            None => check.missing.push(record.record_id.clone()),
            Some(meta) => {
                check.found += 1;
                if record.date() != parse_timestamp(&meta.date) {
                    check.date_mismatches.push(DateMismatch {
                        id: record.record_id.clone(),
                        export_date: record.timestamp.clone(),
                        store_date: meta.date.clone(),
                    });
                }
            }
        }
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{"id":"p1","metadata":{"date":"2024-09-30","float_wmo_id":2902746,"latitude":-12.5,"longitude":75.0},"document":"Temperature salinity profile from float 2902746"}
{"id":"p2","metadata":{"date":"2024-10-01T04:10:00Z","float_wmo_id":"2902747"},"document":"October 2024 temperature profile Arabian Sea"}

{"id":"p3","metadata":{"date":"2024-10-15","float_wmo_id":"2902748"},"document":"Salinity profile Bay of Bengal"}
{"id":"p4","metadata":{"date":"not-a-date","float_wmo_id":"2902749"},"document":"temperature"}
"#;

    fn store() -> SnapshotStore {
        SnapshotStore::from_reader(SNAPSHOT.as_bytes(), "snapshot.jsonl").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn loads_and_counts() {
        let s = store();
        assert_eq!(s.count().unwrap(), 4);
        let batch = s.get(0, 10).unwrap();
        assert_eq!(batch.metadatas[0].float_wmo_id, "2902746");
        assert_eq!(batch.metadatas[0].extra["latitude"], serde_json::json!(-12.5));
    }

    #[test]
    fn paged_get() {
        let s = store();
        assert_eq!(s.get(1, 2).unwrap().ids, vec!["p2", "p3"]);
        assert!(s.get(10, 2).unwrap().is_empty());
    }

    #[test]
    fn get_by_ids_keeps_request_order_and_skips_unknown() {
        let s = store();
        let ids = vec!["p3".to_string(), "nope".to_string(), "p1".to_string()];
        assert_eq!(s.get_by_ids(&ids).unwrap().ids, vec!["p3", "p1"]);
    }

    #[test]
    fn range_count_is_exact_and_half_open() {
        let s = store();
        let october = DateRange::for_bucket(TimeBucket::new(2024, 10).unwrap(), None).unwrap();
        assert_eq!(s.count_range(&october).unwrap(), 2);
        let open_start = DateRange::new(None, Some(d("2024-10-01")));
        assert_eq!(s.count_range(&open_start).unwrap(), 1);
        assert_eq!(s.count_range(&DateRange::default()).unwrap(), 3);
    }

    #[test]
    fn query_ranks_by_overlap() {
        let s = store();
        let batch = s.query("october 2024 temperature", 2, None).unwrap();
        assert_eq!(batch.ids[0], "p2");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn query_with_date_filter() {
        let s = store();
        let range = DateRange::new(Some(d("2024-10-01")), None);
        let batch = s.query("salinity", 10, Some(&range)).unwrap();
        assert_eq!(batch.ids, vec!["p3"]);
    }

    #[test]
    fn query_does_not_pad_with_unrelated_documents() {
        let s = store();
        let batch = s.query("bengal", 10, None).unwrap();
        assert_eq!(batch.ids, vec!["p3"]);
        assert!(s.query("kelp", 10, None).unwrap().is_empty());
    }

    #[test]
    fn bucket_range_is_clipped_to_window() {
        let sep = TimeBucket::new(2024, 9).unwrap();
        let window = DateWindow {
            from: d("2024-09-15"),
            to: d("2024-11-01"),
        };
        let clipped = DateRange::for_bucket(sep, Some(&window)).unwrap();
        assert_eq!(clipped, DateRange::new(Some(d("2024-09-15")), Some(d("2024-10-01"))));

        let august = TimeBucket::new(2024, 8).unwrap();
        assert_eq!(DateRange::for_bucket(august, Some(&window)), None);
    }

    #[test]
    fn date_extent_skips_undated() {
        let s = store();
        assert_eq!(s.date_extent().unwrap(), Some((d("2024-09-30"), d("2024-10-15"))));
        assert_eq!(SnapshotStore::default().date_extent().unwrap(), None);
    }

    #[test]
    fn enumerate_pages_everything() {
        let s = store();
        for page in [1, 3, 4, 100] {
            let records = enumerate(&s, page).unwrap();
            assert_eq!(records.len(), 4, "page size {page}");
        }
        let records = enumerate(&s, 2).unwrap();
        assert_eq!(records[0].fields["latitude"], "-12.5");
    }

    fn enumerated_tally(s: &SnapshotStore, window: Option<&DateWindow>) -> Tally {
        Tally::from_records(Source::Index, &enumerate(s, 2).unwrap(), window)
    }

    #[test]
    fn range_count_tally_covers_store_extent() {
        let s = store();
        let tally = range_count_tally(&s, None).unwrap();
        assert_eq!(tally.count(TimeBucket::new(2024, 9).unwrap(), Source::Index), 1);
        assert_eq!(tally.count(TimeBucket::new(2024, 10).unwrap(), Source::Index), 2);
        assert!(tally.participants().contains(&Source::Index));
        assert_eq!(tally.buckets(), enumerated_tally(&s, None).buckets());
    }

    #[test]
    fn range_count_tally_matches_enumerate_under_window() {
        let s = store();
        let window = DateWindow {
            from: d("2024-10-02"),
            to: d("2024-12-01"),
        };
        let counted = range_count_tally(&s, Some(&window)).unwrap();
        let listed = enumerated_tally(&s, Some(&window));
        let oct = TimeBucket::new(2024, 10).unwrap();
        assert_eq!(counted.count(oct, Source::Index), 1);
        assert_eq!(counted.count(oct, Source::Index), listed.count(oct, Source::Index));
        assert_eq!(counted.buckets(), listed.buckets());
    }

    #[test]
    fn month_queries_name_the_month() {
        let queries = month_queries(TimeBucket::new(2024, 10).unwrap());
        assert_eq!(queries.len(), 5);
        assert!(queries.iter().all(|q| q.contains("October 2024")));
    }

    #[test]
    fn month_hit_rate_counts_hits_in_target_month() {
        let s = store();
        let oct = TimeBucket::new(2024, 10).unwrap();
        let queries = vec!["temperature profile".to_string(), "float 2902746".to_string()];
        let report = month_hit_rate(&s, oct, &queries, 3).unwrap();

        assert_eq!(report.month_documents, 2);
        assert_eq!(report.queries[0].results, 3);
        assert_eq!(report.queries[0].in_month, 2);
        assert_eq!(report.queries[1].results, 1);
        assert_eq!(report.queries[1].in_month, 0);
        assert_eq!(report.queries[1].top_id.as_deref(), Some("p1"));
        assert_eq!(report.total_in_month(), 2);
        assert!(!report.is_hidden());
    }

    #[test]
    fn month_with_documents_but_no_hits_is_hidden() {
        let s = store();
        let oct = TimeBucket::new(2024, 10).unwrap();
        let report = month_hit_rate(&s, oct, &["2902746".to_string()], 10).unwrap();
        assert!(report.is_hidden());

        let january = TimeBucket::new(2023, 1).unwrap();
        let empty_month = month_hit_rate(&s, january, &["2902746".to_string()], 10).unwrap();
        assert!(!empty_month.is_hidden());
    }

    #[test]
    fn verify_ids_reports_missing_and_mismatch() {
        let s = store();
        let records = vec![
            Record::new("p1", Some("2024-09-30".into())),
            Record::new("p2", Some("2024-10-02".into())),
            Record::new("gone", Some("2024-10-02".into())),
        ];
        let check = verify_ids(&s, &records).unwrap();
        assert_eq!(check.requested, 3);
        assert_eq!(check.found, 2);
        assert_eq!(check.missing, vec!["gone"]);
        assert_eq!(check.date_mismatches.len(), 1);
        assert_eq!(check.date_mismatches[0].id, "p2");
    }

    #[test]
    fn rejects_bad_line() {
        let err = SnapshotStore::from_reader("{\"id\":\"x\"}\n".as_bytes(), "s.jsonl").unwrap_err();
        assert!(matches!(err, StoreError::Parse { line: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let line = r#"{"id":"x","metadata":{"date":"2024-01-01","float_wmo_id":"1"}}"#;
        let text = format!("{line}\n{line}\n");
        let err = SnapshotStore::from_reader(text.as_bytes(), "s.jsonl").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { line: 2, .. }));
    }
}
