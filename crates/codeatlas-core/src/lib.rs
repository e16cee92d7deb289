//! Core infrastructure for codeatlas.
//!
//! This crate holds everything that does not depend on the analyzed language:
//! - Atlas data model and merge semantics
//! - Symbol keys and `package@symbol` references
//! - Diagnostics reports
//! - Scan configuration
//! - Error types and exit codes
//! - Atlas store (persistence, lookup, search)
//! - JSON output types for the front door

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod model;
pub mod output;
pub mod search;
pub mod store;
