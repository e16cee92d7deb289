//! Package discovery and source file collection.
//!
//! Discovery walks each scan root looking for package directories:
//! - an *extension package* has a `config/extension.toml` manifest whose
//!   `[[python.module]]` entries declare the python modules it ships;
//! - a *plain package* is a root directory that itself has an `__init__.py`.
//!
//! File collection then walks the declared module directories of one package
//! and yields a sorted, deduplicated list of `.py` files.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use codeatlas_core::config::ScanConfig;
use codeatlas_core::key::is_dotted_identifier;

/// Python package entry file.
pub const ENTRY_FILE: &str = "__init__.py";

/// Extension manifest location, relative to the package directory.
pub const EXTENSION_MANIFEST: &str = "config/extension.toml";

// ============================================================================
// Error Types
// ============================================================================

/// Error type for discovery and file collection.
#[derive(Debug, Error)]
pub enum FileError {
    /// IO error on a specific path.
    #[error("IO error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Extension manifest could not be parsed.
    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A declared entry file vanished between discovery and collection.
    #[error("missing entry file: {path}")]
    MissingEntry { path: PathBuf },

    /// A `file_excludes` pattern is not a valid glob.
    #[error("invalid file exclude pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileError>;

// ============================================================================
// Package Types
// ============================================================================

/// How a package was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PackageKind {
    Extension,
    Plain,
}

/// A python module declared by a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    /// Dotted module name (`omni.ui`).
    pub name: String,
    /// Directory holding the module's files.
    pub dir: PathBuf,
    /// The module's `__init__.py`.
    pub entry_file: PathBuf,
}

/// A discovered package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
    pub kind: PackageKind,
    /// The package directory.
    pub dir: PathBuf,
    /// Directory that module paths are computed from.
    pub base: PathBuf,
    pub modules: Vec<ModuleDecl>,
    /// Directories of other packages nested inside this one.
    pub nested: Vec<PathBuf>,
}


/// Why a discovered package was not scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    NoEntryPoint,
}

/// A package seen during discovery but not scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub name: String,
    pub dir: PathBuf,
    pub reason: SkipReason,
}

/// A scan root that could not be walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRoot {
    pub root: PathBuf,
    pub reason: String,
}

impl UnreadableRoot {
    /// Name reported for the root: its last path component, or the whole
    /// path when it has none.
    pub fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

/// Result of package discovery.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub packages: Vec<PackageSpec>,
    pub skipped: Vec<SkippedPackage>,
    /// Roots that are missing, not directories, or unreadable.
    pub unreadable_roots: Vec<UnreadableRoot>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtensionManifest {
    #[serde(default)]
    package: ManifestPackage,
    #[serde(default)]
    python: ManifestPython,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestPackage {
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestPython {
    #[serde(default)]
    module: Vec<ManifestModule>,
}

#[derive(Debug, Deserialize)]
struct ManifestModule {
    name: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

fn is_ignored_dir_name(name: &str) -> bool {
    name.starts_with('.')
        || name == "__pycache__"
        || name == "node_modules"
        || name == "venv"
        || name == "target"
}

fn keep_dir(entry: &DirEntry) -> bool {
    entry.depth() == 0
        || !entry.file_type().is_dir()
        || !is_ignored_dir_name(&entry.file_name().to_string_lossy())
}

/// Split `name-1.2.3` into `("name", Some("1.2.3"))`.
///
/// A suffix is only split off when it starts with a digit.
fn split_dir_version(dir_name: &str) -> (&str, Option<&str>) {
    match dir_name.rfind('-') {
        Some(idx) if idx > 0 => {
            let suffix = &dir_name[idx + 1..];
            if suffix.starts_with(|c: char| c.is_ascii_digit()) {
                (&dir_name[..idx], Some(suffix))
            } else {
                (dir_name, None)
            }
        }
        _ => (dir_name, None),
    }
}

fn read_manifest(path: &Path) -> FileResult<ExtensionManifest> {
    let text = fs::read_to_string(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| FileError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

enum Candidate {
    Package(PackageSpec),
    Skipped(SkippedPackage),
}

fn extension_candidate(dir: &Path) -> FileResult<Candidate> {
    let manifest = read_manifest(&dir.join(EXTENSION_MANIFEST))?;
    let raw_name = dir_name(dir);
    let (stem, dir_version) = split_dir_version(&raw_name);
    let version = manifest
        .package
        .version
        .filter(|v| !v.trim().is_empty())
        .or_else(|| dir_version.map(str::to_string));
    let name = match version
        .as_deref()
        .and_then(|v| raw_name.strip_suffix(v))
        .and_then(|s| s.strip_suffix('-'))
    {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => stem.to_string(),
    };

    let mut modules = Vec::new();
    for declared in manifest.python.module {
        let Some(module_name) = declared.name else {
            continue;
        };
        if !is_dotted_identifier(&module_name) {
            warn!("{}: ignoring python module with invalid name {:?}", name, module_name);
            continue;
        }
        let module_dir = module_name
            .split('.')
            .fold(dir.to_path_buf(), |acc, part| acc.join(part));
        let entry_file = module_dir.join(ENTRY_FILE);
        if entry_file.is_file() {
            modules.push(ModuleDecl {
                name: module_name,
                dir: module_dir,
                entry_file,
            });
        } else {
            debug!("{}: declared module {} has no entry file", name, module_name);
        }
    }
    modules.sort_by(|a, b| a.name.cmp(&b.name));
    modules.dedup_by(|a, b| a.name == b.name);

    if modules.is_empty() {
        return Ok(Candidate::Skipped(SkippedPackage {
            name,
            dir: dir.to_path_buf(),
            reason: SkipReason::NoEntryPoint,
        }));
    }

    Ok(Candidate::Package(PackageSpec {
        name,
        version,
        kind: PackageKind::Extension,
        dir: dir.to_path_buf(),
        base: dir.to_path_buf(),
        modules,
        nested: Vec::new(),
    }))
}

fn plain_candidate(dir: &Path) -> Option<Candidate> {
    let name = dir_name(dir);
    if !is_dotted_identifier(&name) || name.contains('.') {
        return None;
    }
    let base = dir.parent()?.to_path_buf();
    Some(Candidate::Package(PackageSpec {
        name: name.clone(),
        version: None,
        kind: PackageKind::Plain,
        dir: dir.to_path_buf(),
        base,
        modules: vec![ModuleDecl {
            name,
            dir: dir.to_path_buf(),
            entry_file: dir.join(ENTRY_FILE),
        }],
        nested: Vec::new(),
    }))
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Discover packages under `roots`.
///
/// Packages are returned sorted by name, version and directory. Packages on
/// the exclusion list or without an entry point are reported in
/// [`Discovery::skipped`]. Manifests that fail to parse are logged and the
/// directory is skipped. Roots that cannot be walked are reported in
/// [`Discovery::unreadable_roots`].
///
/// Extension directories are found at any depth up to
/// `discovery_depth`. A plain package is recognized only when a root itself
/// contains `__init__.py`; plain packages nested below a root are not
/// discovered on their own.
pub fn discover_packages(roots: &[PathBuf], config: &ScanConfig) -> Discovery {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut discovery = Discovery::default();

    for root in roots {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                warn!("scan root {} is not a directory", root.display());
                discovery.unreadable_roots.push(UnreadableRoot {
                    root: root.clone(),
                    reason: "not a directory".to_string(),
                });
                continue;
            }
            Err(err) => {
                warn!("scan root {}: {}", root.display(), err);
                discovery.unreadable_roots.push(UnreadableRoot {
                    root: root.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        }
        let walker = WalkDir::new(root)
            .max_depth(config.discovery_depth)
            .follow_links(config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(keep_dir);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.loop_ancestor().is_some() {
                        debug!("symlink loop during discovery: {}", err);
                    } else if err.depth() == 0 {
                        warn!("scan root {}: {}", root.display(), err);
                        discovery.unreadable_roots.push(UnreadableRoot {
                            root: root.clone(),
                            reason: err.to_string(),
                        });
                    } else {
                        warn!("discovery error under {}: {}", root.display(), err);
                    }
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            let candidate = if dir.join(EXTENSION_MANIFEST).is_file() {
                match extension_candidate(dir) {
                    Ok(candidate) => Some(candidate),
                    Err(err) => {
                        warn!("skipping {}: {}", dir.display(), err);
                        None
                    }
                }
            } else if entry.depth() == 0 && dir.join(ENTRY_FILE).is_file() {
                plain_candidate(dir)
            } else {
                None
            };
            let Some(candidate) = candidate else {
                continue;
            };
            if !seen.insert(canonical(dir)) {
                debug!("already discovered {}", dir.display());
                continue;
            }
            match candidate {
                Candidate::Package(spec) if config.is_excluded(&spec.name) => {
                    debug!("excluded package {}", spec.name);
                    discovery.skipped.push(SkippedPackage {
                        name: spec.name,
                        dir: spec.dir,
                        reason: SkipReason::Excluded,
                    });
                }
                Candidate::Package(spec) => discovery.packages.push(spec),
                Candidate::Skipped(skipped) => {
                    debug!("package {} has no entry point", skipped.name);
                    discovery.skipped.push(skipped);
                }
            }
        }
    }

    let dirs: Vec<PathBuf> = discovery.packages.iter().map(|p| p.dir.clone()).collect();
    for spec in &mut discovery.packages {
        spec.nested = dirs
            .iter()
            .filter(|other| *other != &spec.dir && other.starts_with(&spec.dir))
            .cloned()
            .collect();
    }

    discovery.packages.sort_by(|a, b| {
        (&a.name, &a.version, &a.dir).cmp(&(&b.name, &b.version, &b.dir))
    });
    discovery
        .skipped
        .sort_by(|a, b| (&a.name, &a.dir).cmp(&(&b.name, &b.dir)));
    discovery
}

// ============================================================================
// File Collection
// ============================================================================

/// One source file of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Package-relative path, forward slashes.
    pub rel_path: String,
    pub abs_path: PathBuf,
    /// Dotted module key.
    pub module_name: String,
    /// True for a declared module's `__init__.py`.
    pub is_entry: bool,
}

/// Files collected for one package, plus the walk errors met on the way.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    pub files: Vec<SourceFile>,
    /// `(package-relative path, message)` of entries that could not be read.
    pub errors: Vec<(String, String)>,
}

/// Build the `file_excludes` matcher.
pub fn build_excludes(patterns: &[String]) -> FileResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Package-relative path with forward slashes.
pub fn relative_path(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Dotted module name for a package-relative `.py` path.
///
/// `omni/ui/__init__.py` maps to `omni.ui`. Returns `None` when a segment is
/// not an identifier, since such a file cannot be imported.
pub fn module_name_for_path(rel_path: &str) -> Option<String> {
    let stem = rel_path.strip_suffix(".py")?;
    let mut parts: Vec<&str> = stem.split('/').collect();
    if parts.last() == Some(&"__init__") {
        parts.pop();
    }
    let name = parts.join(".");
    is_dotted_identifier(&name).then_some(name)
}

/// Collect the `.py` files of one package.
///
/// Files are sorted by package-relative path. With `follow_symlinks`, a file
/// reachable through several paths is kept once, under the first path in
/// sorted order.
pub fn collect_package_files(
    package: &PackageSpec,
    config: &ScanConfig,
    excludes: &GlobSet,
) -> FileResult<FileSet> {
    let mut set = FileSet::default();
    let entries: HashSet<PathBuf> = package.modules.iter().map(|m| m.entry_file.clone()).collect();

    for module in &package.modules {
        if !module.entry_file.is_file() {
            return Err(FileError::MissingEntry {
                path: module.entry_file.clone(),
            });
        }

        let walker = WalkDir::new(&module.dir)
            .follow_links(config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                if is_ignored_dir_name(&entry.file_name().to_string_lossy()) {
                    return false;
                }
                if package.nested.iter().any(|n| n == entry.path()) {
                    return false;
                }
                !(config.exclude_submodules && entry.path().join(ENTRY_FILE).is_file())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.loop_ancestor().is_some() {
                        debug!("{}: symlink loop skipped: {}", package.name, err);
                        continue;
                    }
                    let path = err
                        .path()
                        .and_then(|p| relative_path(&package.base, p))
                        .unwrap_or_else(|| module.name.clone());
                    set.errors.push((path, err.to_string()));
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("py") {
                continue;
            }
            let Some(rel_path) = relative_path(&package.base, path) else {
                continue;
            };
            if excludes.is_match(&rel_path) {
                debug!("{}: excluded {}", package.name, rel_path);
                continue;
            }
            let Some(module_name) = module_name_for_path(&rel_path) else {
                debug!("{}: not importable: {}", package.name, rel_path);
                continue;
            };
            set.files.push(SourceFile {
                is_entry: entries.contains(path),
                rel_path,
                abs_path: path.to_path_buf(),
                module_name,
            });
        }
    }

    set.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    set.files.dedup_by(|a, b| a.rel_path == b.rel_path);

    // Same canonical file under two paths: keep the first.
    let mut canonical_seen: HashSet<PathBuf> = HashSet::new();
    let mut module_seen: HashSet<String> = HashSet::new();
    set.files.retain(|file| {
        canonical_seen.insert(canonical(&file.abs_path)) && module_seen.insert(file.module_name.clone())
    });
    set.errors.sort();
    set.errors.dedup();
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn extension(root: &Path, dir: &str, version: &str, modules: &[&str]) -> PathBuf {
        let ext = root.join(dir);
        let mut manifest = format!("[package]\nversion = \"{}\"\n", version);
        for m in modules {
            manifest.push_str(&format!("\n[[python.module]]\nname = \"{}\"\n", m));
        }
        write(&ext.join(EXTENSION_MANIFEST), &manifest);
        ext
    }

    #[test]
    fn split_dir_version_only_on_digit_suffix() {
        assert_eq!(split_dir_version("omni.ui-1.2.3"), ("omni.ui", Some("1.2.3")));
        assert_eq!(split_dir_version("omni.kit-tools"), ("omni.kit-tools", None));
        assert_eq!(split_dir_version("plain"), ("plain", None));
    }

    #[test]
    fn module_name_mapping() {
        assert_eq!(module_name_for_path("omni/ui/__init__.py").as_deref(), Some("omni.ui"));
        assert_eq!(
            module_name_for_path("omni/ui/_impl/window.py").as_deref(),
            Some("omni.ui._impl.window")
        );
        assert_eq!(module_name_for_path("omni/ui/my-file.py"), None);
        assert_eq!(module_name_for_path("omni/ui/readme.txt"), None);
    }

    #[test]
    fn discovers_extension_and_strips_version() {
        let tmp = TempDir::new().unwrap();
        let ext = extension(tmp.path(), "omni.ui-2.1.0", "2.1.0", &["omni.ui"]);
        write(&ext.join("omni/ui/__init__.py"), "");

        let discovery = discover_packages(&[tmp.path().to_path_buf()], &ScanConfig::default());
        assert_eq!(discovery.packages.len(), 1);
        let spec = &discovery.packages[0];
        assert_eq!(spec.name, "omni.ui");
        assert_eq!(spec.version.as_deref(), Some("2.1.0"));
        assert_eq!(spec.kind, PackageKind::Extension);
        assert_eq!(spec.modules.len(), 1);
        assert_eq!(
            relative_path(&spec.base, &spec.modules[0].entry_file).as_deref(),
            Some("omni/ui/__init__.py")
        );
    }

    #[test]
    fn extension_without_entry_is_skipped() {
        let tmp = TempDir::new().unwrap();
        extension(tmp.path(), "omni.empty", "1.0.0", &["omni.empty"]);
        let discovery = discover_packages(&[tmp.path().to_path_buf()], &ScanConfig::default());
        assert!(discovery.packages.is_empty());
        assert_eq!(discovery.skipped.len(), 1);
        assert_eq!(discovery.skipped[0].reason, SkipReason::NoEntryPoint);
    }

    #[test]
    fn excluded_package_is_counted() {
        let tmp = TempDir::new().unwrap();
        let ext = extension(tmp.path(), "omni.ui", "1.0.0", &["omni.ui"]);
        write(&ext.join("omni/ui/__init__.py"), "");
        let config = ScanConfig {
            exclude_list: vec!["omni.ui".to_string()],
            ..ScanConfig::default()
        };
        let discovery = discover_packages(&[tmp.path().to_path_buf()], &config);
        assert!(discovery.packages.is_empty());
        assert_eq!(discovery.skipped[0].reason, SkipReason::Excluded);
    }

    #[test]
    fn plain_package_root() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("mypkg");
        write(&pkg.join("__init__.py"), "");
        write(&pkg.join("core.py"), "");

        let discovery = discover_packages(&[pkg.clone()], &ScanConfig::default());
        assert_eq!(discovery.packages.len(), 1);
        let spec = &discovery.packages[0];
        assert_eq!(spec.kind, PackageKind::Plain);

        let set = collect_package_files(spec, &ScanConfig::default(), &build_excludes(&[]).unwrap())
            .unwrap();
        let paths: Vec<&str> = set.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["mypkg/__init__.py", "mypkg/core.py"]);
        assert!(set.files[0].is_entry);
        assert_eq!(set.files[1].module_name, "mypkg.core");
    }

    #[test]
    fn plain_package_below_root_is_not_discovered() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("mypkg/__init__.py"), "");

        let discovery = discover_packages(&[tmp.path().to_path_buf()], &ScanConfig::default());
        assert!(discovery.packages.is_empty());
        assert!(discovery.unreadable_roots.is_empty());
    }

    #[test]
    fn unreadable_roots_are_reported() {
        let tmp = TempDir::new().unwrap();
        let file_root = tmp.path().join("setup.py");
        write(&file_root, "");
        let missing = tmp.path().join("gone");

        let discovery = discover_packages(&[missing.clone(), file_root], &ScanConfig::default());
        assert!(discovery.packages.is_empty());
        assert_eq!(discovery.unreadable_roots.len(), 2);
        assert_eq!(discovery.unreadable_roots[0].root, missing);
        assert_eq!(discovery.unreadable_roots[0].display_name(), "gone");
        assert_eq!(discovery.unreadable_roots[1].reason, "not a directory");
    }

    #[test]
    fn nested_extension_is_separate() {
        let tmp = TempDir::new().unwrap();
        let outer = extension(tmp.path(), "outer", "1.0.0", &["outer"]);
        write(&outer.join("outer/__init__.py"), "");
        let inner = extension(&outer.join("outer"), "inner", "1.0.0", &["inner"]);
        write(&inner.join("inner/__init__.py"), "");

        let config = ScanConfig::default();
        let discovery = discover_packages(&[tmp.path().to_path_buf()], &config);
        let names: Vec<&str> = discovery.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["inner", "outer"]);

        let outer_spec = &discovery.packages[1];
        let set = collect_package_files(outer_spec, &config, &build_excludes(&[]).unwrap()).unwrap();
        let paths: Vec<&str> = set.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["outer/__init__.py"]);
    }

    #[test]
    fn file_excludes_and_ignored_dirs() {
        let tmp = TempDir::new().unwrap();
        let ext = extension(tmp.path(), "pkg", "1.0.0", &["pkg"]);
        write(&ext.join("pkg/__init__.py"), "");
        write(&ext.join("pkg/tests/test_a.py"), "");
        write(&ext.join("pkg/__pycache__/cached.py"), "");
        write(&ext.join("pkg/.hidden/h.py"), "");
        write(&ext.join("pkg/a.py"), "");

        let config = ScanConfig::default();
        let discovery = discover_packages(&[tmp.path().to_path_buf()], &config);
        let excludes = build_excludes(&["pkg/tests/**".to_string()]).unwrap();
        let set = collect_package_files(&discovery.packages[0], &config, &excludes).unwrap();
        let paths: Vec<&str> = set.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["pkg/__init__.py", "pkg/a.py"]);
    }

    #[test]
    fn exclude_submodules_stops_at_subpackages() {
        let tmp = TempDir::new().unwrap();
        let ext = extension(tmp.path(), "pkg", "1.0.0", &["pkg"]);
        write(&ext.join("pkg/__init__.py"), "");
        write(&ext.join("pkg/sub/__init__.py"), "");
        write(&ext.join("pkg/sub/deep.py"), "");
        write(&ext.join("pkg/scripts/tool.py"), "");

        let config = ScanConfig {
            exclude_submodules: true,
            ..ScanConfig::default()
        };
        let discovery = discover_packages(&[tmp.path().to_path_buf()], &config);
        let set = collect_package_files(&discovery.packages[0], &config, &build_excludes(&[]).unwrap())
            .unwrap();
        let paths: Vec<&str> = set.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["pkg/__init__.py", "pkg/scripts/tool.py"]);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(matches!(
            build_excludes(&["pkg/[".to_string()]),
            Err(FileError::Glob(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_subtree_is_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let ext = extension(tmp.path(), "pkg", "1.0.0", &["pkg"]);
        write(&ext.join("pkg/__init__.py"), "");
        write(&ext.join("pkg/impl/__init__.py"), "");
        write(&ext.join("pkg/impl/core.py"), "");
        std::os::unix::fs::symlink(ext.join("pkg/impl"), ext.join("pkg/mirror")).unwrap();
        // A loop back to the module root.
        std::os::unix::fs::symlink(ext.join("pkg"), ext.join("pkg/impl/back")).unwrap();

        let config = ScanConfig {
            follow_symlinks: true,
            ..ScanConfig::default()
        };
        let discovery = discover_packages(&[tmp.path().to_path_buf()], &config);
        let set = collect_package_files(&discovery.packages[0], &config, &build_excludes(&[]).unwrap())
            .unwrap();
        let paths: Vec<&str> = set.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["pkg/__init__.py", "pkg/impl/__init__.py", "pkg/impl/core.py"]
        );
    }
}
