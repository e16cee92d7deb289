//! Error types and exit codes for codeatlas.
//!
//! `AtlasError` is the single error type surfaced by the front door; the
//! subsystem errors ([`StoreError`], [`ConfigError`]) bridge into it with
//! `From` impls.
//!
//! ## Exit codes
//!
//! - `1`: one or more packages failed fatally during a scan
//! - `2`: invalid arguments or configuration
//! - `3`: lookup target (package or symbol) not found
//! - `4`: atlas store failure
//! - `10`: internal errors

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// At least one package failed fatally.
    PackageFailed = 1,
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Package or symbol not found.
    NotFound = 3,
    /// Reading or writing an atlas failed.
    StoreError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Store Errors
// ============================================================================

/// Errors from reading or writing atlas documents.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("atlas not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt atlas {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the front door.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("package not found: {package}")]
    PackageNotFound { package: String },

    #[error("symbol not found: {key}")]
    SymbolNotFound { key: String },

    #[error("{failed} of {total} packages failed")]
    ScanFailed { failed: usize, total: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<&AtlasError> for OutputErrorCode {
    fn from(err: &AtlasError) -> Self {
        match err {
            AtlasError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            AtlasError::PackageNotFound { .. } => OutputErrorCode::NotFound,
            AtlasError::SymbolNotFound { .. } => OutputErrorCode::NotFound,
            AtlasError::ScanFailed { .. } => OutputErrorCode::PackageFailed,
            AtlasError::Store(StoreError::NotFound { .. }) => OutputErrorCode::NotFound,
            AtlasError::Store(_) => OutputErrorCode::StoreError,
            AtlasError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<ConfigError> for AtlasError {
    fn from(err: ConfigError) -> Self {
        AtlasError::InvalidArguments {
            message: err.to_string(),
        }
    }
}

impl AtlasError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        AtlasError::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn symbol_not_found(key: impl Into<String>) -> Self {
        AtlasError::SymbolNotFound { key: key.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AtlasError::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}
