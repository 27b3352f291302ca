// Version snapshots: `versions/<n>/`, `versions/<n>.zip` and the `versions/ext/` mirror.

pub mod archive;
pub mod copy;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use self::archive::{Archiver, EntryFilter, PackReport, SkippedEntry, SplitPackager};
use self::copy::{copy_tree, reset_dir, ExclusionSet, EXT_DIR, VERSIONS_DIR};

pub const LATEST_ARCHIVE: &str = "latest.zip";

/// Files left out of the archives of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub oversized: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

impl ArchiveSummary {
    fn absorb(&mut self, oversized: Vec<String>, report: PackReport) {
        self.oversized.extend(oversized);
        self.skipped.extend(report.skipped);
    }
}

/// Builds the per-version artifacts from a staged source tree into the branch root.
pub struct SnapshotArchiver<'a, A> {
    source: &'a Path,
    root: &'a Path,
    exclusions: ExclusionSet,
    size_ceiling: u64,
    packager: SplitPackager<'a, A>,
}

impl<'a, A: Archiver> SnapshotArchiver<'a, A> {
    pub fn new(
        source: &'a Path,
        root: &'a Path,
        exclusions: ExclusionSet,
        size_ceiling: u64,
        archiver: &'a A,
        max_split_depth: u32,
    ) -> Self {
        Self {
            source,
            root,
            exclusions,
            size_ceiling,
            packager: SplitPackager::new(archiver, max_split_depth),
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(VERSIONS_DIR)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    pub fn ext_dir(&self) -> PathBuf {
        self.versions_dir().join(EXT_DIR)
    }

    /// Copy the source tree into `versions/<version>/` plus the given metadata files.
    /// An existing directory for this version is an error; snapshots are never rewritten.
    pub fn snapshot(&self, version: &str, metadata_files: &[&Path]) -> Result<PathBuf> {
        let dir = self.version_dir(version);
        if dir.exists() {
            anyhow::bail!("version directory `{}` already exists", dir.display());
        }

        let report = copy_tree(self.source, &dir, &self.exclusions)?;
        for file in metadata_files {
            let name = file
                .file_name()
                .with_context(|| format!("metadata path `{}` has no file name", file.display()))?;
            fs::copy(file, dir.join(name))
                .with_context(|| format!("failed to copy `{}` into snapshot", file.display()))?;
        }

        info!(version, files = report.files, bytes = report.bytes, "created version directory");
        Ok(dir)
    }

    /// Clear `versions/ext/`, mirror the version directory into it and write `latest.zip`.
    pub fn refresh_latest(&self, version_dir: &Path) -> Result<ArchiveSummary> {
        let ext = self.ext_dir();
        reset_dir(&ext)?;
        copy_tree(version_dir, &ext, &ExclusionSet::empty())?;

        let filter = EntryFilter {
            exclusions: ExclusionSet::empty(),
            size_ceiling: self.size_ceiling,
            skip_nested_zips: false,
        };
        let selection = filter.select(version_dir)?;
        let dest = ext.join(LATEST_ARCHIVE);
        let report = self
            .packager
            .package(&dest, &selection.entries)
            .with_context(|| format!("failed to write `{}`", dest.display()))?;

        let mut summary = ArchiveSummary::default();
        summary.absorb(selection.oversized, report);
        Ok(summary)
    }

    /// Zip the source tree into `versions/<version>.zip`, leaving out nested zips.
    pub fn archive_source(&self, version: &str) -> Result<ArchiveSummary> {
        let filter = EntryFilter {
            exclusions: self.exclusions.clone(),
            size_ceiling: self.size_ceiling,
            skip_nested_zips: true,
        };
        let selection = filter.select(self.source)?;
        let dest = self.versions_dir().join(format!("{version}.zip"));
        let report = self
            .packager
            .package(&dest, &selection.entries)
            .with_context(|| format!("failed to write `{}`", dest.display()))?;
        info!(
            version,
            archived = report.archived.len(),
            skipped = report.skipped.len(),
            "wrote version archive"
        );

        let mut summary = ArchiveSummary::default();
        summary.absorb(selection.oversized, report);
        Ok(summary)
    }
}
