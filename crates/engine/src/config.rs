// Optional repository configuration file.
//
// `<workspace>/.github/versioner.toml`. Every key has a default, so the file
// only needs the settings a repository wants to change. Action inputs
// (token, branch prefix, LFS threshold) come from the CLI, not from here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "versioner.toml";

/// Directory names never copied into a version directory.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] =
    &[".git", "node_modules", "versions", ".cache", "__pycache__", ".venv", "bower_components"];

/// Binary patterns always routed through LFS.
pub const DEFAULT_LFS_PATTERNS: &[&str] = &[
    "*.zip", "*.gz", "*.7z", "*.rar", "*.tar", "*.tgz", "*.bz2", "*.xz", "*.iso", "*.dmg",
    "*.pkg", "*.exe", "*.dll", "*.so", "*.dylib", "*.class", "*.jar", "*.war", "*.ear", "*.bin",
    "*.dat", "*.dump", "*.img",
];

const MIB: u64 = 1024 * 1024;

/// Path to the config file: `<root>/.github/versioner.toml`.
pub fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".github").join(CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct VersionerConfig {
    pub snapshot: SnapshotConfig,
    pub lfs: LfsConfig,
    pub git: GitConfig,
}

impl VersionerConfig {
    /// Load from `<root>/.github/versioner.toml`. A missing file yields defaults;
    /// a malformed one is an error.
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        Self::load_optional(&config_path(workspace_root))
    }

    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

/// Snapshot and packaging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Path segments skipped while copying. `.git` and `versions` are always skipped.
    pub excluded_names: Vec<String>,
    /// Files larger than this never go into a zip archive.
    pub size_ceiling_mb: u64,
    /// How many times a failing archive batch may be halved.
    pub max_split_depth: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            size_ceiling_mb: 50,
            max_split_depth: 4,
        }
    }
}

impl SnapshotConfig {
    pub fn size_ceiling_bytes(&self) -> u64 {
        self.size_ceiling_mb.saturating_mul(MIB)
    }
}

/// Large file storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LfsConfig {
    pub patterns: Vec<String>,
    /// Path segments skipped by the oversized-file scan.
    pub excluded_names: Vec<String>,
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_LFS_PATTERNS.iter().map(|s| s.to_string()).collect(),
            excluded_names: vec![".git".into(), "node_modules".into()],
        }
    }
}

/// Git identity and remote settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    pub remote: String,
    pub bot_name: String,
    pub bot_email: String,
    /// Appended to versioning commits so CI does not retrigger on them.
    pub commit_tag: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            bot_name: "github-actions[bot]".into(),
            bot_email: "github-actions[bot]@users.noreply.github.com".into(),
            commit_tag: "[skip ci]".into(),
        }
    }
}

/// Convert a megabyte threshold input to bytes.
pub fn megabytes(value: u64) -> u64 {
    value.saturating_mul(MIB)
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
