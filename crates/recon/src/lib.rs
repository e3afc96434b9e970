//! `floatcov-recon`: temporal coverage reconciliation across archive views.
//!
//! Pure engine crate: receives pre-loaded records, returns bucketed,
//! classified results. No CLI or IO dependencies.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod model;
pub mod tally;

pub use config::CoverageConfig;
pub use engine::{run, CoverageInput, Reconciler};
pub use error::CoverageError;
pub use evidence::summarize;
pub use model::{
    CoverageReport, CoverageRow, CoverageStatus, DateWindow, IngestStats, Record, Source,
    Summary, TimeBucket,
};
pub use tally::Tally;
