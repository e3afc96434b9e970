use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverageError {
    /// `ingest` called with an identifier outside {filesystem, index, export}.
    #[error(
        "ingest: unknown source '{source_id}' (expected filesystem, index or export); \
         {buckets_compared} bucket(s) tallied so far"
    )]
    InvalidSource { source_id: String, buckets_compared: usize },

    /// `reconcile` with nothing parseable from any source.
    #[error(
        "reconcile: no parseable records ingested from any source \
         ({unparseable} unparseable, {out_of_window} outside window); 0 bucket(s) compared"
    )]
    EmptyDataset { unparseable: u64, out_of_window: u64 },

    /// Tolerance outside `[0, 1)`.
    #[error("reconcile: tolerance must be in [0, 1), got {0}")]
    InvalidTolerance(f64),

    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (no sources, bad window, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
}
