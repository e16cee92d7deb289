//! JSON output types for the front door.
//!
//! Every response starts with `status`, field order is fixed by struct
//! declaration order, and arrays are emitted in sorted order so the same
//! run produces the same bytes.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, OutputErrorCode};
use crate::model::{AtlasEntry, MergeStats};
use crate::search::SearchHit;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Outcome of one package scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `ok`, `failed` or `cancelled`.
    pub status: String,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub modules: usize,
    pub classes: usize,
    pub methods: usize,
    pub diagnostics: usize,
    pub fallback_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atlas_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<MergeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `atlas scan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    pub schema_version: String,
    /// Packages discovered but skipped (excluded or no entry point).
    pub skipped_packages: usize,
    pub packages: Vec<PackageSummary>,
}

impl ScanResponse {
    pub fn new(skipped_packages: usize, mut packages: Vec<PackageSummary>) -> Self {
        packages.sort_by(|a, b| (&a.package, &a.version).cmp(&(&b.package, &b.version)));
        let status = if packages.iter().all(|p| p.status == "ok") {
            "ok"
        } else {
            "partial"
        };
        ScanResponse {
            status: status.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            skipped_packages,
            packages,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.packages.iter().filter(|p| p.status != "ok").count()
    }
}

/// Response of `atlas search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub status: String,
    pub schema_version: String,
    pub query: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        SearchResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            query: query.into(),
            hits,
        }
    }
}

/// Response of `atlas lookup`.
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse<'a> {
    pub status: String,
    pub schema_version: String,
    pub package: String,
    pub key: String,
    #[serde(flatten)]
    pub entry: AtlasEntry<'a>,
    /// Keys of the symbols that use this one.
    pub used_by: Vec<String>,
}

impl<'a> LookupResponse<'a> {
    pub fn new(package: impl Into<String>, entry: AtlasEntry<'a>, used_by: Vec<String>) -> Self {
        LookupResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            package: package.into(),
            key: entry.key().to_string(),
            entry,
            used_by,
        }
    }
}

/// Error details in an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &AtlasError) -> Self {
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
        }
    }
}

/// Response emitted when a command fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(err: &AtlasError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
