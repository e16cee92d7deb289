//! Python package indexing for codeatlas.
//!
//! This crate turns a directory tree of Python packages into atlas documents:
//! - `files`: package discovery and source collection
//! - `parser`: tree-sitter parsing with per-file timeouts
//! - `extractor`: per-file symbol extraction into [`FileRecord`]s
//! - `resolver`: module namespaces, star exports, root promotion
//! - `usage`: reverse usage index
//! - `assembler`: builds the [`Atlas`](codeatlas_core::model::Atlas)
//! - `scan`: the concurrent pipeline tying it together

pub mod assembler;
pub mod extractor;
pub mod files;
pub mod parser;
pub mod record;
pub mod resolver;
pub mod scan;
pub mod text;
pub mod usage;

pub use files::{discover_packages, Discovery, PackageKind, PackageSpec, UnreadableRoot};
pub use record::FileRecord;
pub use scan::{CancellationToken, PackageError, PackageScan, ScanError, Scanner};
