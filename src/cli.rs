//! CLI front door.
//!
//! Thin helpers behind the `atlas` subcommands:
//! - `scan` - discover and index packages, write atlases
//! - `lookup` - resolve a key or `package@symbol` reference in a stored atlas
//! - `search` - prefix or fuzzy key search in a stored atlas
//!
//! All functions return `Result<T, AtlasError>`; `main.rs` turns errors into
//! JSON error responses and exit codes.

use std::path::{Path, PathBuf};

use codeatlas_core::config::ScanConfig;
use codeatlas_core::error::{AtlasError, StoreError};
use codeatlas_core::key::SymbolRef;
use codeatlas_core::output::{LookupResponse, ScanResponse, SearchResponse};
use codeatlas_core::store::AtlasStore;
use codeatlas_python::scan::{ScanError, Scanner};

/// Command-line overrides for a scan. Unset fields keep the config file value.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub roots: Vec<PathBuf>,
    pub out: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub follow_symlinks: bool,
    pub exclude_submodules: bool,
    pub include_source_body: bool,
    pub merge: bool,
    pub exclude: Vec<String>,
    pub jobs: Option<usize>,
}

impl ScanOptions {
    /// Load the config file (explicit path, or `atlas.toml` in the first root)
    /// and apply the overrides on top.
    pub fn resolve_config(&self) -> Result<ScanConfig, AtlasError> {
        let dir = self
            .roots
            .first()
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("."));
        let mut config = ScanConfig::load_or_default(self.config.as_deref(), dir)?;
        config.follow_symlinks |= self.follow_symlinks;
        config.exclude_submodules |= self.exclude_submodules;
        config.include_source_body |= self.include_source_body;
        config.merge_mode |= self.merge;
        for name in &self.exclude {
            if !config.exclude_list.contains(name) {
                config.exclude_list.push(name.clone());
            }
        }
        if let Some(jobs) = self.jobs {
            if jobs == 0 {
                return Err(AtlasError::invalid_args("--jobs must be at least 1"));
            }
            config.jobs = Some(jobs);
        }
        if self.out.is_some() {
            config.output_dir = self.out.clone();
        }
        Ok(config)
    }
}

fn scan_error(err: ScanError) -> AtlasError {
    match err {
        ScanError::Config(message) => AtlasError::invalid_args(message),
        ScanError::Pool(e) => AtlasError::internal(e.to_string()),
    }
}

/// Run a scan over every root. A root that cannot be walked is reported as
/// a failed package in the response.
pub fn run_scan(options: &ScanOptions) -> Result<ScanResponse, AtlasError> {
    if options.roots.is_empty() {
        return Err(AtlasError::invalid_args("at least one root is required"));
    }
    let config = options.resolve_config()?;
    let scanner = Scanner::new(config).map_err(scan_error)?;
    Ok(scanner.run(&options.roots))
}

fn missing_package(package: &str) -> impl FnOnce(StoreError) -> AtlasError + '_ {
    move |err| match err {
        StoreError::NotFound { .. } => AtlasError::PackageNotFound {
            package: package.to_string(),
        },
        other => AtlasError::Store(other),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AtlasError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AtlasError::internal(format!("JSON serialization error: {}", e)))
}

/// Look up one entry. Returns the JSON response.
pub fn run_lookup(store_dir: &Path, package: &str, key_or_ref: &str) -> Result<String, AtlasError> {
    let reference = SymbolRef::parse(key_or_ref).ok_or_else(|| {
        AtlasError::invalid_args(format!(
            "invalid key '{}', expected a dotted key or package@symbol",
            key_or_ref
        ))
    })?;
    let mut store = AtlasStore::new(store_dir);
    let atlas = store.atlas(package).map_err(missing_package(package))?;
    let entry = atlas
        .resolve_ref(&reference)
        .ok_or_else(|| AtlasError::symbol_not_found(key_or_ref))?;
    let used_by = atlas.usages_of(entry.key()).to_vec();
    to_json(&LookupResponse::new(package, entry, used_by))
}

/// Search keys of a stored atlas. Returns the JSON response.
pub fn run_search(
    store_dir: &Path,
    package: &str,
    query: &str,
    prefix: bool,
    limit: Option<usize>,
) -> Result<String, AtlasError> {
    let mut store = AtlasStore::new(store_dir);
    let hits = if prefix {
        store.search_prefix(package, query, limit)
    } else {
        store.search_fuzzy(package, query, limit)
    }
    .map_err(missing_package(package))?;
    to_json(&SearchResponse::new(query, hits))
}
