//! Per-package diagnostics.
//!
//! Diagnostics are emitted next to an atlas, never inside it. Only fatal
//! package errors stop a scan; everything recorded here is non-fatal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a non-fatal scan problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The file could not be parsed (or parsing timed out).
    ParseError,
    /// Two equivalent modules define the same name; the first one won.
    ResolutionConflict,
    /// The file vanished or could not be read after discovery.
    #[serde(rename = "IOError")]
    IoError,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseError => "ParseError",
            DiagnosticKind::ResolutionConflict => "ResolutionConflict",
            DiagnosticKind::IoError => "IOError",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Package-relative path of the file concerned.
    pub file_path: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file_path: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            file_path: file_path.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn parse_error(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(file_path, DiagnosticKind::ParseError, message)
    }

    pub fn io_error(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(file_path, DiagnosticKind::IoError, message)
    }

    pub fn conflict(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(file_path, DiagnosticKind::ResolutionConflict, message)
    }
}

/// The diagnostics report written alongside a package atlas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsReport {
    pub fn new(package: impl Into<String>, version: Option<String>) -> Self {
        DiagnosticsReport {
            package: package.into(),
            version,
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Sort and drop exact duplicates so the report is stable across runs.
    pub fn normalize(&mut self) {
        self.diagnostics.sort();
        self.diagnostics.dedup();
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}
