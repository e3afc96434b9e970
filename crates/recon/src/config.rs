use serde::Deserialize;

use crate::error::CoverageError;
use crate::model::{DateWindow, Source};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CoverageConfig {
    pub name: String,
    #[serde(default)]
    pub tolerance: f64,
    #[serde(default)]
    pub window: Option<DateWindow>,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub filesystem: Option<FilesystemSource>,
    #[serde(default)]
    pub index: Option<IndexSource>,
    #[serde(default)]
    pub export: Option<ExportSource>,
}

/// Directory tree of dated profile files (`YYYYMMDD_prof.nc`).
#[derive(Debug, Clone, Deserialize)]
pub struct FilesystemSource {
    pub root: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_pattern() -> String {
    "*_prof.nc".into()
}

/// JSON-lines dump of the metadata/vector store.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSource {
    pub snapshot: String,
    #[serde(default)]
    pub mode: IndexMode,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    1000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Page through every document.
    #[default]
    Enumerate,
    /// One exact `count(date in [a, b))` per month bucket.
    RangeCount,
}

/// Tabular CSV export of the store.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSource {
    pub file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CoverageConfig {
    pub fn from_toml(input: &str) -> Result<Self, CoverageError> {
        let config: CoverageConfig =
            toml::from_str(input).map_err(|e| CoverageError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoverageError> {
        if self.name.trim().is_empty() {
            return Err(CoverageError::ConfigValidation("name must not be empty".into()));
        }

        if !self.tolerance.is_finite() || self.tolerance < 0.0 || self.tolerance >= 1.0 {
            return Err(CoverageError::ConfigValidation(format!(
                "tolerance must be in [0, 1), got {}",
                self.tolerance
            )));
        }

        if self.enabled_sources().is_empty() {
            return Err(CoverageError::ConfigValidation(
                "at least one of [sources.filesystem], [sources.index], [sources.export] is required"
                    .into(),
            ));
        }

        if let Some(w) = &self.window {
            if w.from >= w.to {
                return Err(CoverageError::ConfigValidation(format!(
                    "window.from ({}) must be before window.to ({})",
                    w.from, w.to
                )));
            }
        }

        if let Some(index) = &self.sources.index {
            if index.page_size == 0 {
                return Err(CoverageError::ConfigValidation(
                    "sources.index.page_size must be > 0".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn enabled_sources(&self) -> Vec<Source> {
        let mut out = Vec::new();
        if self.sources.filesystem.is_some() {
            out.push(Source::Filesystem);
        }
        if self.sources.index.is_some() {
            out.push(Source::Index);
        }
        if self.sources.export.is_some() {
            out.push(Source::Export);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "october check"
tolerance = 0.05

[window]
from = "2024-01-01"
to = "2025-01-01"

[sources.filesystem]
root = "argo_data"

[sources.index]
snapshot = "index.jsonl"
mode = "range_count"

[sources.export]
file = "exports/chroma_2024-10.csv"
"#;

    #[test]
    fn parse_full_config() {
        let config = CoverageConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "october check");
        assert_eq!(config.tolerance, 0.05);
        assert_eq!(config.enabled_sources(), Source::ALL.to_vec());
        let fs = config.sources.filesystem.as_ref().unwrap();
        assert_eq!(fs.pattern, "*_prof.nc");
        let idx = config.sources.index.as_ref().unwrap();
        assert_eq!(idx.mode, IndexMode::RangeCount);
        assert_eq!(idx.page_size, 1000);
        assert!(config.window.is_some());
    }

    #[test]
    fn defaults() {
        let config = CoverageConfig::from_toml(
            r#"
name = "fs only"
[sources.filesystem]
root = "argo_data"
"#,
        )
        .unwrap();
        assert_eq!(config.tolerance, 0.0);
        assert!(config.window.is_none());
        assert!(config.output.json.is_none());
        assert_eq!(config.enabled_sources(), vec![Source::Filesystem]);
    }

    #[test]
    fn rejects_no_sources() {
        let err = CoverageConfig::from_toml("name = \"x\"\n[sources]\n").unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn rejects_tolerance_out_of_range() {
        for tol in ["1.0", "-0.1", "2.5"] {
            let toml = format!(
                "name = \"x\"\ntolerance = {tol}\n[sources.export]\nfile = \"e.csv\"\n"
            );
            let err = CoverageConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(err, CoverageError::ConfigValidation(_)), "tolerance {tol}");
        }
    }

    #[test]
    fn rejects_inverted_window() {
        let toml = r#"
name = "x"
[window]
from = "2025-01-01"
to = "2024-01-01"
[sources.export]
file = "e.csv"
"#;
        assert!(CoverageConfig::from_toml(toml).is_err());
    }

    #[test]
    fn rejects_zero_page_size() {
        let toml = r#"
name = "x"
[sources.index]
snapshot = "i.jsonl"
page_size = 0
"#;
        let err = CoverageConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn parse_error_is_reported() {
        let err = CoverageConfig::from_toml("name = ").unwrap_err();
        assert!(matches!(err, CoverageError::ConfigParse(_)));
    }
}
