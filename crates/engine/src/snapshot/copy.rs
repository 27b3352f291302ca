// Tree copying with path-segment exclusions.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Container directory for every version snapshot.
pub const VERSIONS_DIR: &str = "versions";
/// Directory under `versions/` holding the newest snapshot.
pub const EXT_DIR: &str = "ext";

/// Path segments that are never copied or archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// `.git` and `versions` are always excluded, whatever the configuration says.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        names.insert(".git".to_string());
        names.insert(VERSIONS_DIR.to_string());
        Self { names }
    }

    /// Exactly the given names, without the mandatory ones.
    pub fn exact<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    /// No exclusions at all, for trees that were already filtered.
    pub fn empty() -> Self {
        Self { names: BTreeSet::new() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// True when any segment of `relative` is excluded.
    pub fn excludes(&self, relative: &Path) -> bool {
        relative
            .components()
            .any(|component| component.as_os_str().to_str().is_some_and(|name| self.contains(name)))
    }

    fn admits(&self, entry: &DirEntry) -> bool {
        entry.depth() == 0 || !entry.file_name().to_str().is_some_and(|name| self.contains(name))
    }
}

/// Walk `root` depth-first, yielding admitted files with their root-relative paths.
pub(crate) fn walk_files<'a>(
    root: &'a Path,
    exclusions: &'a ExclusionSet,
) -> impl Iterator<Item = Result<(PathBuf, PathBuf)>> + 'a {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| exclusions.admits(entry))
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.path().is_file() => {
                let relative = entry.path().strip_prefix(root).map(Path::to_path_buf);
                Some(
                    relative
                        .map(|relative| (entry.path().to_path_buf(), relative))
                        .with_context(|| format!("`{}` escaped the walk root", entry.path().display())),
                )
            }
            Ok(_) => None,
            Err(error) => Some(Err(anyhow::Error::new(error).context("failed to walk source tree"))),
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files: usize,
    pub bytes: u64,
}

/// Copy every admitted file under `source` into `dest`, preserving relative paths.
pub fn copy_tree(source: &Path, dest: &Path, exclusions: &ExclusionSet) -> Result<CopyReport> {
    fs::create_dir_all(dest).with_context(|| format!("failed to create `{}`", dest.display()))?;

    let mut report = CopyReport::default();
    for item in walk_files(source, exclusions) {
        let (path, relative) = item?;
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        report.bytes += fs::copy(&path, &target).with_context(|| {
            format!("failed to copy `{}` to `{}`", path.display(), target.display())
        })?;
        report.files += 1;
    }

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        files = report.files,
        bytes = report.bytes,
        "copied tree"
    );
    Ok(report)
}

/// Remove `dir` if present and recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("failed to clear `{}`", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("failed to create `{}`", dir.display()))
}

/// The source tree captured before the working tree switches branches.
#[derive(Debug)]
pub struct StagedTree {
    dir: TempDir,
}

impl StagedTree {
    pub fn capture(source: &Path, exclusions: &ExclusionSet) -> Result<Self> {
        let dir = TempDir::new().context("failed to create staging directory")?;
        let report = copy_tree(source, dir.path(), exclusions)?;
        info!(files = report.files, bytes = report.bytes, "staged source tree");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn listing(root: &Path) -> Vec<String> {
        walk_files(root, &ExclusionSet::empty())
            .map(|item| item.unwrap().1.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn git_and_versions_are_always_excluded() {
        let set = ExclusionSet::new(Vec::<String>::new());
        assert!(set.excludes(Path::new(".git/config")));
        assert!(set.excludes(Path::new("versions/3/a.txt")));
        assert!(!set.excludes(Path::new("src/versions.rs")));
    }

    #[test]
    fn any_segment_excludes() {
        let set = ExclusionSet::new(["node_modules"]);
        assert!(set.excludes(Path::new("web/node_modules/left-pad/index.js")));
        assert!(!set.excludes(Path::new("web/src/index.js")));
    }

    #[test]
    fn copy_skips_excluded_segments_at_any_depth() {
        let source = TempDir::new().unwrap();
        write(source.path(), "README.md", "hello");
        write(source.path(), "src/lib.rs", "pub fn x() {}");
        write(source.path(), ".git/HEAD", "ref: refs/heads/main");
        write(source.path(), "web/node_modules/pkg/index.js", "x");
        write(source.path(), "versions/1/README.md", "old");

        let dest = TempDir::new().unwrap();
        let report =
            copy_tree(source.path(), dest.path(), &ExclusionSet::new(["node_modules"])).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(listing(dest.path()), vec!["README.md", "src/lib.rs"]);
        assert_eq!(fs::read_to_string(dest.path().join("src/lib.rs")).unwrap(), "pub fn x() {}");
    }

    #[test]
    fn copy_is_byte_for_byte() {
        let source = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        fs::write(source.path().join("blob.bin"), &bytes).unwrap();

        let dest = TempDir::new().unwrap();
        copy_tree(source.path(), dest.path(), &ExclusionSet::empty()).unwrap();

        assert_eq!(fs::read(dest.path().join("blob.bin")).unwrap(), bytes);
    }

    #[test]
    fn reset_dir_empties_existing_contents() {
        let root = TempDir::new().unwrap();
        let ext = root.path().join("versions/ext");
        write(&ext, "stale.txt", "old");

        reset_dir(&ext).unwrap();

        assert!(ext.is_dir());
        assert!(listing(&ext).is_empty());
    }

    #[test]
    fn staged_tree_outlives_source_changes() {
        let source = TempDir::new().unwrap();
        write(source.path(), "a.txt", "before");

        let staged = StagedTree::capture(source.path(), &ExclusionSet::new(["node_modules"])).unwrap();
        fs::remove_file(source.path().join("a.txt")).unwrap();

        assert_eq!(fs::read_to_string(staged.path().join("a.txt")).unwrap(), "before");
    }
}
