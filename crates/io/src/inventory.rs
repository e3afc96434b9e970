// Filesystem inventory of dated profile files

use std::path::Path;

use thiserror::Error;

use floatcov_recon::Record;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

/// Walk `root/**/<pattern>` and yield one record per matching file.
///
/// The record id is the file stem and the timestamp is the first eight
/// characters of the file name (`20241001_prof.nc` -> `20241001`). A name
/// without that prefix still yields a record; the reconciler counts it as
/// unparseable. A missing root yields an empty inventory.
pub fn scan(root: &Path, pattern: &str) -> Result<Vec<Record>, InventoryError> {
    if !root.is_dir() {
        log::info!("inventory root {} does not exist, treating as empty", root.display());
        return Ok(Vec::new());
    }

    let full = format!(
        "{}/**/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern
    );
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let entries = glob::glob_with(&full, options).map_err(|e| InventoryError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut records = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => records.push(record_for(&path)),
            Ok(_) => {}
            Err(e) => log::warn!("inventory: skipping unreadable entry: {e}"),
        }
    }

    records.sort_by(|a, b| a.record_id.cmp(&b.record_id));
    log::info!("inventory: {} file(s) under {}", records.len(), root.display());
    Ok(records)
}

fn record_for(path: &Path) -> Record {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    let timestamp = name.get(..8).map(str::to_string);

    Record::new(stem, timestamp).with_field("path", path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use floatcov_recon::TimeBucket;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn scans_year_month_tree() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "2024/09/20240930_prof.nc");
        touch(dir.path(), "2024/10/20241001_prof.nc");
        touch(dir.path(), "2024/10/20241002_prof.nc");
        touch(dir.path(), "2024/10/readme.txt");

        let records = scan(dir.path(), "*_prof.nc").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].record_id, "20240930_prof");
        assert_eq!(records[1].timestamp.as_deref(), Some("20241001"));
        assert_eq!(records[2].bucket(), TimeBucket::new(2024, 10));
        assert!(records[0].fields["path"].ends_with("20240930_prof.nc"));
    }

    #[test]
    fn files_directly_under_root_are_included() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "20200101_prof.nc");
        assert_eq!(scan(dir.path(), "*_prof.nc").unwrap().len(), 1);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let records = scan(&dir.path().join("nope"), "*_prof.nc").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn undated_name_is_kept_but_unparseable() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "2024/10/latest_prof.nc");
        let records = scan(dir.path(), "*_prof.nc").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].date().is_none());
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            scan(dir.path(), "[*_prof.nc"),
            Err(InventoryError::Pattern { .. })
        ));
    }
}
