//! codeatlas: static indexer for Python package trees.
//!
//! Scans a forest of packages and produces one deterministic atlas per
//! package version: every module, class, method and argument, plus a reverse
//! index of which symbols use which.

// Core infrastructure - re-exported from codeatlas-core
pub use codeatlas_core::config;
pub use codeatlas_core::diagnostics;
pub use codeatlas_core::error;
pub use codeatlas_core::key;
pub use codeatlas_core::model;
pub use codeatlas_core::output;
pub use codeatlas_core::search;
pub use codeatlas_core::store;

// Language adapter
pub use codeatlas_python as python;

// Front door
pub mod cli;
