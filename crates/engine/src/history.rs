// History recorder: the append-only `versionlist.json` and per-directory change logs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use versioner_common::changelog::{render_change_log, CHANGE_LOG_FILE};
use versioner_common::types::{VersionList, VersionRecord};

use crate::ledger::write_json;

pub const HISTORY_FILE: &str = "versionlist.json";

#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    root: PathBuf,
}

impl HistoryRecorder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Load the history. Only a missing file counts as empty; a file that does
    /// not parse is an error so history is never silently rewritten.
    pub fn load(&self) -> Result<VersionList> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(VersionList::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse `{}`", path.display()))
    }

    /// Append `record` and persist the full list. Returns the new length.
    pub fn append(&self, record: &VersionRecord) -> Result<usize> {
        let mut list = self.load()?;
        list.push(record.clone());
        write_json(&self.history_path(), &list)?;
        debug!(version = %record.version, entries = list.len(), "appended version history");
        Ok(list.len())
    }

    /// Write `change_log.txt` for `record` into `dir`.
    pub fn write_change_log(&self, record: &VersionRecord, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create `{}`", dir.display()))?;
        let path = dir.join(CHANGE_LOG_FILE);
        fs::write(&path, render_change_log(record))
            .with_context(|| format!("failed to write `{}`", path.display()))?;
        Ok(path)
    }

    /// Append to history and write the change log into every target directory.
    pub fn record(&self, record: &VersionRecord, change_log_dirs: &[&Path]) -> Result<usize> {
        let len = self.append(record)?;
        for dir in change_log_dirs {
            self.write_change_log(record, dir)?;
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(counter: u64) -> VersionRecord {
        VersionRecord::new(
            counter,
            format!("{counter:040}"),
            Utc.with_ymd_and_hms(2024, 5, counter as u32, 8, 0, 0).unwrap(),
            "Version update",
        )
    }

    #[test]
    fn missing_history_starts_empty() {
        let dir = TempDir::new().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        assert!(recorder.load().unwrap().is_empty());
    }

    #[test]
    fn append_grows_by_one_each_time_in_order() {
        let dir = TempDir::new().unwrap();
        let recorder = HistoryRecorder::new(dir.path());

        for counter in 1..=4 {
            assert_eq!(recorder.append(&record(counter)).unwrap(), counter as usize);
        }

        let list = recorder.load().unwrap();
        let versions: Vec<&str> = list.versions.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn unparseable_history_is_an_error_and_untouched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(HISTORY_FILE), "[oops").unwrap();
        let recorder = HistoryRecorder::new(dir.path());

        let error = recorder.append(&record(1)).expect_err("must not overwrite history");
        assert!(format!("{error:#}").contains("failed to parse"));
        assert_eq!(fs::read_to_string(dir.path().join(HISTORY_FILE)).unwrap(), "[oops");
    }

    #[test]
    fn change_logs_are_identical_across_directories() {
        let dir = TempDir::new().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        let version_dir = dir.path().join("versions").join("3");
        let ext_dir = dir.path().join("versions").join("ext");

        recorder.record(&record(3), &[&version_dir, &ext_dir]).unwrap();

        let a = fs::read(version_dir.join(CHANGE_LOG_FILE)).unwrap();
        let b = fs::read(ext_dir.join(CHANGE_LOG_FILE)).unwrap();
        assert_eq!(a, b);
        assert!(String::from_utf8(a).unwrap().ends_with("Version: 3"));
    }
}
