//! Scan configuration.
//!
//! Loaded from an `atlas.toml` file when present; every field has a default
//! so an empty file (or no file) is a valid configuration. Command-line flags
//! are applied on top by the front door.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default configuration file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "atlas.toml";

/// Errors while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Options for one indexer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Follow symbolic links while walking package trees.
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Do not descend into python sub-packages of a declared module.
    #[serde(default)]
    pub exclude_submodules: bool,

    /// Record function body source text.
    #[serde(default)]
    pub include_source_body: bool,

    /// Merge into an existing atlas instead of replacing it.
    #[serde(default)]
    pub merge_mode: bool,

    /// Package names to skip.
    #[serde(default)]
    pub exclude_list: Vec<String>,

    /// Glob patterns (package-relative) of files to skip.
    #[serde(default)]
    pub file_excludes: Vec<String>,

    /// Per-file parse timeout in milliseconds; 0 disables the timeout.
    #[serde(default = "default_parse_timeout_ms")]
    pub parse_timeout_ms: u64,

    /// Worker pool size; `None` uses the available parallelism.
    #[serde(default)]
    pub jobs: Option<usize>,

    /// How deep below each root to look for packages.
    #[serde(default = "default_discovery_depth")]
    pub discovery_depth: usize,

    /// Where atlases are written; `None` keeps them in memory only.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_parse_timeout_ms() -> u64 {
    5000
}

fn default_discovery_depth() -> usize {
    4
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            exclude_submodules: false,
            include_source_body: false,
            merge_mode: false,
            exclude_list: Vec::new(),
            file_excludes: Vec::new(),
            parse_timeout_ms: default_parse_timeout_ms(),
            jobs: None,
            discovery_depth: default_discovery_depth(),
            output_dir: None,
        }
    }
}

impl ScanConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, else `atlas.toml` in `dir` if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let candidate = dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// True if `package` is in the exclusion list.
    pub fn is_excluded(&self, package: &str) -> bool {
        self.exclude_list.iter().any(|name| name == package)
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.jobs.filter(|n| *n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
