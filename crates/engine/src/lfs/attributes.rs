// `.gitattributes` maintenance for LFS-tracked patterns.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub const ATTRIBUTES_FILE: &str = ".gitattributes";
pub const LFS_ATTRIBUTES: &str = "filter=lfs diff=lfs merge=lfs -text";

/// Patterns already declared: the first token of each non-comment line.
pub fn declared_patterns(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .collect()
}

/// Append an LFS line for every pattern not yet declared.
/// Returns the new text and the patterns that were added.
pub fn merge_patterns<S: AsRef<str>>(existing: &str, patterns: &[S]) -> (String, Vec<String>) {
    let declared = declared_patterns(existing);
    let mut added: Vec<String> = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if !declared.contains(&pattern) && !added.iter().any(|seen| seen == pattern) {
            added.push(pattern.to_string());
        }
    }

    if added.is_empty() {
        return (existing.to_string(), added);
    }

    let mut text = existing.trim_end().to_string();
    for pattern in &added {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(pattern);
        text.push(' ');
        text.push_str(LFS_ATTRIBUTES);
    }
    text.push('\n');
    (text, added)
}

/// Make sure `<root>/.gitattributes` declares every pattern. Writes only when something was added.
pub fn ensure_patterns<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Vec<String>> {
    let path = root.join(ATTRIBUTES_FILE);
    let existing = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read `{}`", path.display()))
        }
    };

    let (text, added) = merge_patterns(&existing, patterns);
    if !added.is_empty() {
        fs::write(&path, text).with_context(|| format!("failed to write `{}`", path.display()))?;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_gets_every_pattern() {
        let (text, added) = merge_patterns("", &["*.zip", "*.iso"]);
        assert_eq!(added, vec!["*.zip", "*.iso"]);
        assert_eq!(
            text,
            "*.zip filter=lfs diff=lfs merge=lfs -text\n*.iso filter=lfs diff=lfs merge=lfs -text\n"
        );
    }

    #[test]
    fn existing_declarations_are_kept_verbatim() {
        let existing = "# binaries\n*.zip binary\n*.md text eol=lf\n";
        let (text, added) = merge_patterns(existing, &["*.zip", "*.jar"]);

        assert_eq!(added, vec!["*.jar"]);
        assert!(text.starts_with(existing));
        assert!(text.ends_with("*.jar filter=lfs diff=lfs merge=lfs -text\n"));
    }

    #[test]
    fn substring_matches_do_not_count_as_declared() {
        let (_, added) = merge_patterns("docs/*.bin.md text\n", &["*.bin"]);
        assert_eq!(added, vec!["*.bin"]);
    }

    #[test]
    fn nothing_added_returns_input_unchanged() {
        let existing = "*.zip filter=lfs diff=lfs merge=lfs -text";
        let (text, added) = merge_patterns(existing, &["*.zip"]);
        assert!(added.is_empty());
        assert_eq!(text, existing);
    }

    #[test]
    fn ensure_writes_only_when_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ATTRIBUTES_FILE);

        assert_eq!(ensure_patterns(dir.path(), &["*.gz"]).unwrap(), vec!["*.gz"]);
        let first = fs::read_to_string(&path).unwrap();

        assert!(ensure_patterns(dir.path(), &["*.gz"]).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    proptest! {
        #[test]
        fn merging_twice_is_idempotent(
            existing in "[a-z*. \n#]{0,64}",
            patterns in prop::collection::vec("\\*\\.[a-z]{1,4}", 0..6),
        ) {
            let (once, _) = merge_patterns(&existing, &patterns);
            let (twice, added) = merge_patterns(&once, &patterns);
            prop_assert!(added.is_empty());
            prop_assert_eq!(once, twice);
        }
    }
}
