// Zip packaging: entry selection, atomic batch appends, split-and-retry.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::copy::{walk_files, ExclusionSet};

/// One file to be written into an archive under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub source: PathBuf,
    /// Forward-slash path inside the archive.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySelection {
    pub entries: Vec<ArchiveEntry>,
    /// Archive names left out because they exceed the size ceiling.
    pub oversized: Vec<String>,
}

/// Which files under `root` go into an archive.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    pub exclusions: ExclusionSet,
    pub size_ceiling: u64,
    pub skip_nested_zips: bool,
}

impl EntryFilter {
    pub fn select(&self, root: &Path) -> Result<EntrySelection> {
        let mut selection = EntrySelection::default();
        for item in walk_files(root, &self.exclusions) {
            let (path, relative) = item?;
            let name = archive_name(&relative);

            if self.skip_nested_zips && is_zip(&relative) {
                debug!(file = %name, "skipping nested zip archive");
                continue;
            }

            let size = fs::metadata(&path)
                .with_context(|| format!("failed to stat `{}`", path.display()))?
                .len();
            if size > self.size_ceiling {
                warn!(
                    file = %name,
                    size,
                    ceiling = self.size_ceiling,
                    "file exceeds size ceiling; leaving it out of the archive"
                );
                selection.oversized.push(name);
                continue;
            }

            selection.entries.push(ArchiveEntry { source: path, name });
        }
        Ok(selection)
    }
}

pub(crate) fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_zip(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ArchiveError {
    /// An input file could not be read. Splitting the batch can isolate it.
    Source { path: PathBuf, source: io::Error },
    /// The archive itself could not be created or replaced.
    Destination { path: PathBuf, source: io::Error },
    Zip(zip::result::ZipError),
}

impl ArchiveError {
    /// Whether retrying with a smaller batch can succeed.
    pub fn is_batch_local(&self) -> bool {
        !matches!(self, ArchiveError::Destination { .. })
    }
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Source { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            ArchiveError::Destination { path, source } => {
                write!(f, "failed to write archive `{}`: {source}", path.display())
            }
            ArchiveError::Zip(error) => write!(f, "zip error: {error}"),
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArchiveError::Source { source, .. } | ArchiveError::Destination { source, .. } => {
                Some(source)
            }
            ArchiveError::Zip(error) => Some(error),
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(error: zip::result::ZipError) -> Self {
        ArchiveError::Zip(error)
    }
}

// ── Archiver ───────────────────────────────────────────────────────

/// Appends batches of files to an archive. A failed append leaves `dest` as it was.
pub trait Archiver {
    fn append(&self, dest: &Path, batch: &[ArchiveEntry]) -> Result<(), ArchiveError>;
}

/// Deflate-compressed zip archives, rewritten through a `.partial` sibling.
#[derive(Debug, Clone, Copy)]
pub struct ZipArchiver {
    compression: CompressionMethod,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self { compression: CompressionMethod::Deflated }
    }
}

impl ZipArchiver {
    fn write_partial(
        &self,
        dest: &Path,
        partial: &Path,
        batch: &[ArchiveEntry],
    ) -> Result<(), ArchiveError> {
        let file = File::create(partial)
            .map_err(|source| ArchiveError::Destination { path: partial.to_path_buf(), source })?;
        let mut writer = ZipWriter::new(file);

        if dest.exists() {
            let existing = File::open(dest)
                .map_err(|source| ArchiveError::Destination { path: dest.to_path_buf(), source })?;
            let mut archive = ZipArchive::new(existing)?;
            for index in 0..archive.len() {
                writer.raw_copy_file(archive.by_index_raw(index)?)?;
            }
        }

        let options = SimpleFileOptions::default().compression_method(self.compression);
        for entry in batch {
            let mut input = File::open(&entry.source)
                .map_err(|source| ArchiveError::Source { path: entry.source.clone(), source })?;
            writer.start_file(entry.name.as_str(), options)?;
            io::copy(&mut input, &mut writer)
                .map_err(|source| ArchiveError::Source { path: entry.source.clone(), source })?;
        }

        writer.finish()?;
        Ok(())
    }
}

impl Archiver for ZipArchiver {
    fn append(&self, dest: &Path, batch: &[ArchiveEntry]) -> Result<(), ArchiveError> {
        let partial = partial_path(dest);
        if let Err(error) = self.write_partial(dest, &partial, batch) {
            let _ = fs::remove_file(&partial);
            return Err(error);
        }
        fs::rename(&partial, dest).map_err(|source| {
            let _ = fs::remove_file(&partial);
            ArchiveError::Destination { path: dest.to_path_buf(), source }
        })
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

// ── Split packager ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    pub archived: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

/// Writes a file list through an [`Archiver`], halving batches that fail.
pub struct SplitPackager<'a, A> {
    archiver: &'a A,
    max_split_depth: u32,
}

impl<'a, A: Archiver> SplitPackager<'a, A> {
    pub fn new(archiver: &'a A, max_split_depth: u32) -> Self {
        Self { archiver, max_split_depth }
    }

    /// Replace `dest` with an archive of `entries`. Batches that cannot be
    /// written after `max_split_depth` halvings are skipped and reported.
    /// Failures writing `dest` itself are returned as errors.
    pub fn package(&self, dest: &Path, entries: &[ArchiveEntry]) -> Result<PackReport, ArchiveError> {
        if dest.exists() {
            fs::remove_file(dest)
                .map_err(|source| ArchiveError::Destination { path: dest.to_path_buf(), source })?;
        }
        // Creates the (possibly empty) archive so later batches always append.
        self.archiver.append(dest, &[])?;

        let mut report = PackReport::default();
        self.pack_batch(dest, entries, 0, &mut report)?;
        debug!(
            archive = %dest.display(),
            archived = report.archived.len(),
            skipped = report.skipped.len(),
            "packaged archive"
        );
        Ok(report)
    }

    fn pack_batch(
        &self,
        dest: &Path,
        batch: &[ArchiveEntry],
        depth: u32,
        report: &mut PackReport,
    ) -> Result<(), ArchiveError> {
        if batch.is_empty() {
            return Ok(());
        }

        let error = match self.archiver.append(dest, batch) {
            Ok(()) => {
                report.archived.extend(batch.iter().map(|entry| entry.name.clone()));
                return Ok(());
            }
            Err(error) if !error.is_batch_local() => return Err(error),
            Err(error) => error,
        };

        if batch.len() == 1 || depth >= self.max_split_depth {
            warn!(
                archive = %dest.display(),
                files = batch.len(),
                depth,
                error = %error,
                "skipping files that could not be archived"
            );
            let reason = error.to_string();
            report.skipped.extend(
                batch
                    .iter()
                    .map(|entry| SkippedEntry { name: entry.name.clone(), reason: reason.clone() }),
            );
            return Ok(());
        }

        debug!(files = batch.len(), depth, error = %error, "archive batch failed; splitting");
        let (left, right) = batch.split_at(batch.len() / 2);
        self.pack_batch(dest, left, depth + 1, report)?;
        self.pack_batch(dest, right, depth + 1, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Read;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn entry(root: &Path, name: &str) -> ArchiveEntry {
        ArchiveEntry { source: root.join(name), name: name.to_string() }
    }

    fn names_in(archive: &Path) -> Vec<String> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut names: Vec<String> =
            (0..zip.len()).map(|i| zip.by_index(i).unwrap().name().to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn selection_skips_oversized_and_nested_zips() {
        let root = TempDir::new().unwrap();
        write(root.path(), "small.txt", b"tiny");
        write(root.path(), "big.bin", &[7u8; 64]);
        write(root.path(), "dist/old.zip", b"PK");
        write(root.path(), "node_modules/x.js", b"x");

        let filter = EntryFilter {
            exclusions: ExclusionSet::new(["node_modules"]),
            size_ceiling: 16,
            skip_nested_zips: true,
        };
        let selection = filter.select(root.path()).unwrap();

        let names: Vec<&str> = selection.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["small.txt"]);
        assert_eq!(selection.oversized, vec!["big.bin"]);
    }

    #[test]
    fn file_at_ceiling_is_kept() {
        let root = TempDir::new().unwrap();
        write(root.path(), "exact.bin", &[1u8; 16]);

        let filter =
            EntryFilter { exclusions: ExclusionSet::empty(), size_ceiling: 16, skip_nested_zips: false };
        assert_eq!(filter.select(root.path()).unwrap().entries.len(), 1);
    }

    #[test]
    fn appends_accumulate_entries() {
        let root = TempDir::new().unwrap();
        write(root.path(), "a.txt", b"alpha");
        write(root.path(), "nested/b.txt", b"beta");
        let dest = root.path().join("out.zip");

        let archiver = ZipArchiver::default();
        archiver.append(&dest, &[entry(root.path(), "a.txt")]).unwrap();
        archiver.append(&dest, &[entry(root.path(), "nested/b.txt")]).unwrap();

        assert_eq!(names_in(&dest), vec!["a.txt", "nested/b.txt"]);
        let mut zip = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut text = String::new();
        zip.by_name("nested/b.txt").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "beta");
    }

    #[test]
    fn failed_append_leaves_archive_untouched() {
        let root = TempDir::new().unwrap();
        write(root.path(), "a.txt", b"alpha");
        write(root.path(), "b.txt", b"beta");
        let dest = root.path().join("out.zip");

        let archiver = ZipArchiver::default();
        archiver.append(&dest, &[entry(root.path(), "a.txt")]).unwrap();
        let before = fs::read(&dest).unwrap();

        let error = archiver
            .append(&dest, &[entry(root.path(), "b.txt"), entry(root.path(), "missing.txt")])
            .expect_err("missing source must fail");

        assert!(matches!(error, ArchiveError::Source { .. }));
        assert_eq!(fs::read(&dest).unwrap(), before);
        assert!(!partial_path(&dest).exists());
    }

    /// Fails any batch containing a poisoned name.
    struct PoisonedArchiver {
        poisoned: Vec<&'static str>,
        inner: ZipArchiver,
        attempts: RefCell<Vec<usize>>,
    }

    impl Archiver for PoisonedArchiver {
        fn append(&self, dest: &Path, batch: &[ArchiveEntry]) -> Result<(), ArchiveError> {
            self.attempts.borrow_mut().push(batch.len());
            if let Some(bad) = batch.iter().find(|e| self.poisoned.contains(&e.name.as_str())) {
                return Err(ArchiveError::Source {
                    path: bad.source.clone(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
                });
            }
            self.inner.append(dest, batch)
        }
    }

    fn eight_files(root: &Path) -> Vec<ArchiveEntry> {
        (0..8)
            .map(|i| {
                let name = format!("f{i}.txt");
                write(root, &name, name.as_bytes());
                entry(root, &name)
            })
            .collect()
    }

    #[test]
    fn split_isolates_a_bad_file() {
        let root = TempDir::new().unwrap();
        let entries = eight_files(root.path());
        let dest = root.path().join("out.zip");
        let archiver = PoisonedArchiver {
            poisoned: vec!["f5.txt"],
            inner: ZipArchiver::default(),
            attempts: RefCell::new(Vec::new()),
        };

        let report = SplitPackager::new(&archiver, 4).package(&dest, &entries).unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "f5.txt");
        assert!(report.skipped[0].reason.contains("locked"));
        assert_eq!(report.archived.len(), 7);
        assert_eq!(names_in(&dest).len(), 7);
        assert!(!names_in(&dest).contains(&"f5.txt".to_string()));
    }

    #[test]
    fn split_depth_bounds_retries() {
        let root = TempDir::new().unwrap();
        let entries = eight_files(root.path());
        let dest = root.path().join("out.zip");
        let archiver = PoisonedArchiver {
            poisoned: vec!["f0.txt"],
            inner: ZipArchiver::default(),
            attempts: RefCell::new(Vec::new()),
        };

        let report = SplitPackager::new(&archiver, 1).package(&dest, &entries).unwrap();

        // empty creation, full batch, then each half once
        assert_eq!(*archiver.attempts.borrow(), vec![0, 8, 4, 4]);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["f0.txt", "f1.txt", "f2.txt", "f3.txt"]);
        assert_eq!(report.archived, vec!["f4.txt", "f5.txt", "f6.txt", "f7.txt"]);
    }

    #[test]
    fn empty_entry_list_still_produces_an_archive() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("empty.zip");

        let report = SplitPackager::new(&ZipArchiver::default(), 4).package(&dest, &[]).unwrap();

        assert!(report.skipped.is_empty());
        assert!(names_in(&dest).is_empty());
    }

    #[test]
    fn package_replaces_a_previous_archive() {
        let root = TempDir::new().unwrap();
        write(root.path(), "a.txt", b"alpha");
        write(root.path(), "b.txt", b"beta");
        let dest = root.path().join("latest.zip");
        let archiver = ZipArchiver::default();
        let packager = SplitPackager::new(&archiver, 4);

        packager.package(&dest, &[entry(root.path(), "a.txt")]).unwrap();
        packager.package(&dest, &[entry(root.path(), "b.txt")]).unwrap();

        assert_eq!(names_in(&dest), vec!["b.txt"]);
    }

    #[test]
    fn destination_failures_are_not_split() {
        let root = TempDir::new().unwrap();
        let entries = eight_files(root.path());
        let dest = root.path().join("no-such-dir").join("out.zip");

        let error = SplitPackager::new(&ZipArchiver::default(), 4)
            .package(&dest, &entries)
            .expect_err("unwritable destination is fatal");
        assert!(matches!(error, ArchiveError::Destination { .. }));
    }
}
