//! Atlas persistence and retrieval.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/omni.ui-2.1.0.json                 atlas document
//! <dir>/omni.ui-2.1.0.diagnostics.json     diagnostics report
//! <dir>/plainpkg.json                      unversioned package
//! ```
//!
//! Writes go through a temporary file in the same directory followed by a
//! rename, so readers never observe a half-written atlas.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::diagnostics::DiagnosticsReport;
use crate::error::StoreError;
use crate::key::SymbolRef;
use crate::model::{Atlas, AtlasEntry, MergeStats};
use crate::search::{fuzzy_search, prefix_search, SearchHit};

const ATLAS_EXT: &str = "json";
const DIAGNOSTICS_SUFFIX: &str = ".diagnostics.json";

/// Identity of one stored atlas.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StoredAtlas {
    pub package: String,
    pub version: Option<String>,
    pub path: PathBuf,
}

/// File stem for a package version (`omni.ui-2.1.0` or `omni.ui`).
pub fn atlas_stem(package: &str, version: Option<&str>) -> String {
    match version {
        Some(v) if !v.is_empty() => format!("{}-{}", package, v),
        _ => package.to_string(),
    }
}

/// Split a file stem back into package and version.
fn split_stem(stem: &str) -> (String, Option<String>) {
    if let Some((name, version)) = stem.rsplit_once('-') {
        if version.starts_with(|c: char| c.is_ascii_digit()) && !name.is_empty() {
            return (name.to_string(), Some(version.to_string()));
        }
    }
    (stem.to_string(), None)
}

/// Compare dotted versions numerically where possible.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts = |v: &str| -> Vec<(u64, String)> {
        v.split(['.', '-', '+'])
            .map(|p| (p.parse::<u64>().unwrap_or(0), p.to_string()))
            .collect()
    };
    parts(a).cmp(&parts(b))
}

/// A directory of atlas documents.
#[derive(Debug)]
pub struct AtlasStore {
    dir: PathBuf,
    cache: HashMap<String, Atlas>,
}

impl AtlasStore {
    /// Open (without touching the filesystem) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        AtlasStore {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn atlas_path(&self, package: &str, version: Option<&str>) -> PathBuf {
        self.dir
            .join(format!("{}.{}", atlas_stem(package, version), ATLAS_EXT))
    }

    pub fn diagnostics_path(&self, package: &str, version: Option<&str>) -> PathBuf {
        self.dir
            .join(format!("{}{}", atlas_stem(package, version), DIAGNOSTICS_SUFFIX))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }

    /// Write an atlas, replacing any existing document for the same version.
    pub fn save(
        &mut self,
        package: &str,
        version: Option<&str>,
        atlas: &Atlas,
    ) -> Result<PathBuf, StoreError> {
        let path = self.atlas_path(package, version);
        self.write_atomic(&path, &atlas.to_json()?)?;
        self.cache.remove(&atlas_stem(package, version));
        debug!("wrote atlas {}", path.display());
        Ok(path)
    }

    /// Merge `atlas` into the stored document without overwriting existing
    /// keys, then write the result. A missing document is created.
    pub fn merge(
        &mut self,
        package: &str,
        version: Option<&str>,
        atlas: Atlas,
    ) -> Result<(PathBuf, MergeStats), StoreError> {
        let (merged, stats) = match self.load_optional(package, version)? {
            Some(mut existing) => {
                let stats = existing.merge_missing(atlas);
                (existing, stats)
            }
            None => {
                let mut empty = Atlas::new();
                let stats = empty.merge_missing(atlas);
                (empty, stats)
            }
        };
        let path = self.save(package, version, &merged)?;
        Ok((path, stats))
    }

    pub fn save_diagnostics(&self, report: &DiagnosticsReport) -> Result<PathBuf, StoreError> {
        let path = self.diagnostics_path(&report.package, report.version.as_deref());
        let mut json = serde_json::to_string_pretty(report)?;
        json.push('\n');
        self.write_atomic(&path, &json)?;
        Ok(path)
    }

    /// Load an atlas; a missing document is [`StoreError::NotFound`].
    pub fn load(&self, package: &str, version: Option<&str>) -> Result<Atlas, StoreError> {
        self.load_optional(package, version)?
            .ok_or_else(|| StoreError::NotFound {
                path: self.atlas_path(package, version),
            })
    }

    pub fn load_optional(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<Option<Atlas>, StoreError> {
        let path = self.atlas_path(package, version);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Atlas::from_json(&text)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    pub fn load_diagnostics(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<DiagnosticsReport, StoreError> {
        let path = self.diagnostics_path(package, version);
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound { path: path.clone() }
            } else {
                StoreError::io(&path, e)
            }
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt { path, source })
    }

    /// All atlases in the store, sorted by package then version.
    pub fn list(&self) -> Result<Vec<StoredAtlas>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };
        let mut stored = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.ends_with(DIAGNOSTICS_SUFFIX) {
                continue;
            }
            let Some(stem) = file_name.strip_suffix(".json") else {
                continue;
            };
            let (package, version) = split_stem(stem);
            stored.push(StoredAtlas {
                package,
                version,
                path: entry.path(),
            });
        }
        stored.sort();
        Ok(stored)
    }

    /// Newest stored version of `package`, if any.
    pub fn latest(&self, package: &str) -> Result<Option<StoredAtlas>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.package == package)
            .max_by(|a, b| match (&a.version, &b.version) {
                (Some(va), Some(vb)) => compare_versions(va, vb),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            }))
    }

    /// Load (and cache) the newest atlas of `package`.
    pub fn atlas(&mut self, package: &str) -> Result<&Atlas, StoreError> {
        let stored = self.latest(package)?.ok_or_else(|| StoreError::NotFound {
            path: self.atlas_path(package, None),
        })?;
        let stem = atlas_stem(&stored.package, stored.version.as_deref());
        if !self.cache.contains_key(&stem) {
            let atlas = self.load(&stored.package, stored.version.as_deref())?;
            self.cache.insert(stem.clone(), atlas);
        }
        self.cache
            .get(&stem)
            .ok_or(StoreError::NotFound { path: stored.path })
    }

    /// Look up a key or `module@symbol` reference in a package's atlas.
    pub fn get(&mut self, package: &str, key_or_ref: &str) -> Result<Option<AtlasEntry<'_>>, StoreError> {
        let key = match SymbolRef::parse(key_or_ref) {
            Some(reference) => reference.to_key(),
            None => return Ok(None),
        };
        let atlas = self.atlas(package)?;
        Ok(atlas.get(&key))
    }

    pub fn search_prefix(
        &mut self,
        package: &str,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        Ok(prefix_search(self.atlas(package)?, prefix, limit))
    }

    pub fn search_fuzzy(
        &mut self,
        package: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        Ok(fuzzy_search(self.atlas(package)?, query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::model::Module;
    use tempfile::TempDir;

    fn atlas_with_module(key: &str) -> Atlas {
        let mut atlas = Atlas::new();
        atlas.modules.insert(
            key.to_string(),
            Module {
                name: key.to_string(),
                full_name: key.to_string(),
                file_path: format!("{}/__init__.py", key),
                doc_comment: Some("doc".to_string()),
                class_names: vec![],
                function_names: vec![],
                equivalent_modules: vec![],
                is_root: true,
                extension_name: Some(key.to_string()),
            },
        );
        atlas
    }

    #[test]
    fn stem_roundtrip() {
        assert_eq!(atlas_stem("omni.ui", Some("2.1.0")), "omni.ui-2.1.0");
        assert_eq!(atlas_stem("omni.ui", None), "omni.ui");
        assert_eq!(
            split_stem("omni.ui-2.1.0"),
            ("omni.ui".to_string(), Some("2.1.0".to_string()))
        );
        assert_eq!(split_stem("my-pkg"), ("my-pkg".to_string(), None));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut store = AtlasStore::new(dir.path());
        let atlas = atlas_with_module("pkg");
        store.save("pkg", Some("1.0.0"), &atlas).unwrap();
        assert_eq!(store.load("pkg", Some("1.0.0")).unwrap(), atlas);
        assert!(matches!(
            store.load("pkg", Some("2.0.0")),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn merge_creates_and_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let mut store = AtlasStore::new(dir.path());
        let (_, stats) = store.merge("pkg", None, atlas_with_module("pkg")).unwrap();
        assert_eq!(stats.modules, 1);

        let mut changed = atlas_with_module("pkg");
        changed.modules.get_mut("pkg").unwrap().doc_comment = Some("changed".into());
        let (_, stats) = store.merge("pkg", None, changed).unwrap();
        assert_eq!(stats.total(), 0);
        let stored = store.load("pkg", None).unwrap();
        assert_eq!(stored.modules["pkg"].doc_comment.as_deref(), Some("doc"));
    }

    #[test]
    fn list_skips_diagnostics_and_picks_latest() {
        let dir = TempDir::new().unwrap();
        let mut store = AtlasStore::new(dir.path());
        store.save("pkg", Some("1.2.0"), &atlas_with_module("pkg")).unwrap();
        store.save("pkg", Some("1.10.0"), &atlas_with_module("pkg")).unwrap();
        let mut report = DiagnosticsReport::new("pkg", Some("1.10.0".into()));
        report.push(Diagnostic::parse_error("bad.py", "oops"));
        store.save_diagnostics(&report).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        let latest = store.latest("pkg").unwrap().unwrap();
        assert_eq!(latest.version.as_deref(), Some("1.10.0"));
        assert_eq!(
            store.load_diagnostics("pkg", Some("1.10.0")).unwrap(),
            report
        );
    }

    #[test]
    fn get_accepts_keys_and_refs() {
        let dir = TempDir::new().unwrap();
        let mut store = AtlasStore::new(dir.path());
        store.save("pkg", None, &atlas_with_module("pkg")).unwrap();
        assert!(store.get("pkg", "pkg").unwrap().is_some());
        assert!(store.get("pkg", "pkg@").unwrap().is_some());
        assert!(store.get("pkg", "pkg@Missing").unwrap().is_none());
        assert!(store.get("other", "pkg").is_err());
    }

    #[test]
    fn saving_twice_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let mut store = AtlasStore::new(dir.path());
        let atlas = atlas_with_module("pkg");
        let path = store.save("pkg", None, &atlas).unwrap();
        let first = fs::read(&path).unwrap();
        store.save("pkg", None, &atlas).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }
}
