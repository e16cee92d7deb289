//! Scan pipeline.
//!
//! For every discovered package:
//! 1. collect files
//! 2. read, parse and extract each file on the worker pool
//! 3. barrier, then resolve and assemble the atlas
//! 4. write the atlas and its diagnostics (or merge into the stored atlas)
//!
//! Files never share mutable state: each worker returns an immutable
//! [`FileRecord`]. Packages are independent and run concurrently on the same
//! pool. Cancellation is checked before each file and before each global
//! pass; a cancelled package writes nothing unless merge mode is on.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use globset::GlobSet;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;
use tracing::{debug, info, warn};

use codeatlas_core::config::ScanConfig;
use codeatlas_core::diagnostics::{Diagnostic, DiagnosticsReport};
use codeatlas_core::error::StoreError;
use codeatlas_core::model::{Atlas, MergeStats};
use codeatlas_core::output::{PackageSummary, ScanResponse};
use codeatlas_core::store::AtlasStore;

use crate::assembler::assemble;
use crate::extractor::extract_file;
use crate::files::{build_excludes, collect_package_files, discover_packages, Discovery, PackageSpec, SourceFile};
use crate::parser::{decode_source, SyntaxParser};
use crate::record::FileRecord;
use crate::resolver::SymbolResolver;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that stop one package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("package {package} failed: {reason}")]
    Fatal { package: String, reason: String },

    #[error("package {package} cancelled")]
    Cancelled { package: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that stop the whole run before any package is scanned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Package Scan
// ============================================================================

/// Result of indexing one package in memory.
#[derive(Debug, Clone)]
pub struct PackageScan {
    pub name: String,
    pub version: Option<String>,
    pub atlas: Atlas,
    pub diagnostics: DiagnosticsReport,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub fallback_count: usize,
    /// Cancellation was observed; the atlas covers only the files done so far.
    pub cancelled: bool,
}

enum FileOutcome {
    Parsed(FileRecord),
    Failed(Diagnostic),
    Cancelled,
}

/// Runs scans on a bounded worker pool.
pub struct Scanner {
    config: ScanConfig,
    pool: ThreadPool,
    excludes: GlobSet,
    cancel: CancellationToken,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let excludes =
            build_excludes(&config.file_excludes).map_err(|e| ScanError::Config(e.to_string()))?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|idx| format!("atlas-worker-{}", idx))
            .build()?;
        Ok(Scanner {
            config,
            pool,
            excludes,
            cancel: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn discover(&self, roots: &[PathBuf]) -> Discovery {
        discover_packages(roots, &self.config)
    }

    /// Index one package without writing anything.
    pub fn scan_package(&self, spec: &PackageSpec) -> Result<PackageScan, PackageError> {
        self.pool.install(|| self.index_package(spec))
    }

    fn index_package(&self, spec: &PackageSpec) -> Result<PackageScan, PackageError> {
        let started = Instant::now();
        info!("scanning package {} ({})", spec.name, spec.dir.display());

        let file_set = collect_package_files(spec, &self.config, &self.excludes).map_err(|e| {
            PackageError::Fatal {
                package: spec.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut diagnostics = DiagnosticsReport::new(spec.name.clone(), spec.version.clone());
        for (path, message) in &file_set.errors {
            warn!("{}: {}: {}", spec.name, path, message);
            diagnostics.push(Diagnostic::io_error(path, message));
        }

        let timeout_ms = self.config.parse_timeout_ms;
        let include_body = self.config.include_source_body;
        let outcomes: Vec<FileOutcome> = file_set
            .files
            .par_iter()
            .map_init(
                || SyntaxParser::new(timeout_ms),
                |parser, file| match parser {
                    Ok(parser) => self.process_file(parser, file, include_body),
                    Err(err) => FileOutcome::Failed(Diagnostic::parse_error(
                        &file.rel_path,
                        format!("python grammar unavailable: {}", err),
                    )),
                },
            )
            .collect();

        let mut records = Vec::new();
        let mut files_skipped = file_set.errors.len();
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Parsed(record) => records.push(record),
                FileOutcome::Failed(diagnostic) => {
                    files_skipped += 1;
                    diagnostics.push(diagnostic);
                }
                FileOutcome::Cancelled => cancelled = true,
            }
        }
        let files_scanned = records.len();
        let fallback_count = records.iter().map(|r| r.fallback_count).sum();

        // Global passes.
        cancelled |= self.cancel.is_cancelled();
        if cancelled && !self.config.merge_mode {
            info!("package {} cancelled", spec.name);
            return Err(PackageError::Cancelled {
                package: spec.name.clone(),
            });
        }
        let resolver = SymbolResolver::build(&records);
        for conflict in resolver.conflicts() {
            warn!("{}: {}: {}", spec.name, conflict.file_path, conflict.message);
        }
        diagnostics.extend(resolver.conflicts().iter().cloned());

        cancelled |= self.cancel.is_cancelled();
        if cancelled && !self.config.merge_mode {
            info!("package {} cancelled", spec.name);
            return Err(PackageError::Cancelled {
                package: spec.name.clone(),
            });
        }
        let atlas = assemble(&spec.name, &records, &resolver);
        diagnostics.normalize();

        info!(
            "package {}: {} files, {} skipped, {} entries in {:?}",
            spec.name,
            files_scanned,
            files_skipped,
            atlas.entry_count(),
            started.elapsed()
        );
        Ok(PackageScan {
            name: spec.name.clone(),
            version: spec.version.clone(),
            atlas,
            diagnostics,
            files_scanned,
            files_skipped,
            fallback_count,
            cancelled,
        })
    }

    fn process_file(&self, parser: &mut SyntaxParser, file: &SourceFile, include_body: bool) -> FileOutcome {
        if self.cancel.is_cancelled() {
            return FileOutcome::Cancelled;
        }
        let bytes = match fs::read(&file.abs_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("{}: {}", file.rel_path, err);
                return FileOutcome::Failed(Diagnostic::io_error(&file.rel_path, err.to_string()));
            }
        };
        let source = decode_source(bytes);
        match parser.parse(&file.rel_path, source) {
            Ok(parsed) => {
                debug!("parsed {}", file.rel_path);
                FileOutcome::Parsed(extract_file(&parsed, file, include_body))
            }
            Err(err) => {
                warn!("{}", err);
                FileOutcome::Failed(Diagnostic::parse_error(
                    &file.rel_path,
                    format!("line {}, column {}: {}", err.line, err.col, err.message),
                ))
            }
        }
    }

    /// Index one package and write its atlas and diagnostics to `store`.
    pub fn scan_and_store(
        &self,
        spec: &PackageSpec,
        store: &mut AtlasStore,
    ) -> Result<(PackageScan, PathBuf, Option<MergeStats>), PackageError> {
        let scan = self.scan_package(spec)?;
        let version = scan.version.as_deref();
        let (path, merged) = if self.config.merge_mode {
            let (path, stats) = store.merge(&scan.name, version, scan.atlas.clone())?;
            info!("merged {} new keys into {}", stats.total(), path.display());
            (path, Some(stats))
        } else {
            (store.save(&scan.name, version, &scan.atlas)?, None)
        };
        store.save_diagnostics(&scan.diagnostics)?;
        if scan.cancelled {
            return Err(PackageError::Cancelled {
                package: scan.name.clone(),
            });
        }
        Ok((scan, path, merged))
    }

    /// Discover and scan every package under `roots`.
    ///
    /// Atlases are written when `output_dir` is configured. A package that
    /// fails is reported in its summary; the other packages still complete.
    /// A root that cannot be walked is reported as a failed package of its
    /// own.
    pub fn run(&self, roots: &[PathBuf]) -> ScanResponse {
        let discovery = self.discover(roots);
        let mut skipped = discovery.skipped.len();

        let mut identities = HashSet::new();
        let mut packages = Vec::new();
        for spec in discovery.packages {
            if identities.insert((spec.name.clone(), spec.version.clone())) {
                packages.push(spec);
            } else {
                warn!(
                    "duplicate package {} at {}, keeping the first",
                    spec.name,
                    spec.dir.display()
                );
                skipped += 1;
            }
        }

        let mut summaries: Vec<PackageSummary> = self.pool.install(|| {
            packages
                .par_iter()
                .map(|spec| self.run_package(spec))
                .collect()
        });
        for unreadable in &discovery.unreadable_roots {
            let mut summary = failed_summary(
                unreadable.display_name(),
                None,
                "failed",
                format!(
                    "root not found: {}: {}",
                    unreadable.root.display(),
                    unreadable.reason
                ),
            );
            summary.diagnostics = 1;
            summaries.push(summary);
        }
        ScanResponse::new(skipped, summaries)
    }

    fn run_package(&self, spec: &PackageSpec) -> PackageSummary {
        let result = match &self.config.output_dir {
            Some(dir) => {
                let mut store = AtlasStore::new(dir.clone());
                self.scan_and_store(spec, &mut store)
                    .map(|(scan, path, merged)| (scan, Some(path), merged))
            }
            None => self.index_package(spec).and_then(|scan| {
                if scan.cancelled {
                    Err(PackageError::Cancelled {
                        package: spec.name.clone(),
                    })
                } else {
                    Ok((scan, None, None))
                }
            }),
        };
        match result {
            Ok((scan, atlas_path, merged)) => summary_for(&scan, atlas_path, merged),
            Err(err) => {
                let status = match err {
                    PackageError::Cancelled { .. } => "cancelled",
                    _ => "failed",
                };
                warn!("{}", err);
                failed_summary(spec.name.clone(), spec.version.clone(), status, err.to_string())
            }
        }
    }
}

fn failed_summary(
    package: String,
    version: Option<String>,
    status: &str,
    error: String,
) -> PackageSummary {
    PackageSummary {
        package,
        version,
        status: status.to_string(),
        files_scanned: 0,
        files_skipped: 0,
        modules: 0,
        classes: 0,
        methods: 0,
        diagnostics: 0,
        fallback_count: 0,
        atlas_path: None,
        merged: None,
        error: Some(error),
    }
}

fn summary_for(scan: &PackageScan, atlas_path: Option<PathBuf>, merged: Option<MergeStats>) -> PackageSummary {
    PackageSummary {
        package: scan.name.clone(),
        version: scan.version.clone(),
        status: "ok".to_string(),
        files_scanned: scan.files_scanned,
        files_skipped: scan.files_skipped,
        modules: scan.atlas.modules.len(),
        classes: scan.atlas.classes.len(),
        methods: scan.atlas.methods.len(),
        diagnostics: scan.diagnostics.len(),
        fallback_count: scan.fallback_count,
        atlas_path,
        merged,
        error: None,
    }
}
