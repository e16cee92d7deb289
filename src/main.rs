//! Binary entry point for the atlas CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Index every package under a root and write atlases to ./atlas
//! atlas scan ~/exts --out atlas
//!
//! # Re-scan without overwriting existing entries
//! atlas scan ~/exts --out atlas --merge
//!
//! # Look up a symbol
//! atlas lookup --store atlas --package omni.ui omni.ui@Window.show
//!
//! # Search keys
//! atlas search --store atlas --package omni.ui window --limit 20
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use codeatlas::cli::{run_lookup, run_scan, run_search, ScanOptions};
use codeatlas_core::error::{AtlasError, OutputErrorCode};
use codeatlas_core::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Static indexer for Python package trees.
///
/// All output is JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "atlas", version, about = "Static indexer for Python package trees")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and index packages.
    Scan {
        /// Directories to search for packages.
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// Directory to write atlases and diagnostics into.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Config file (default: atlas.toml in the first root).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Follow symbolic links.
        #[arg(long)]
        follow_symlinks: bool,
        /// Skip subdirectories that are packages of their own.
        #[arg(long)]
        exclude_submodules: bool,
        /// Store function bodies in the atlas.
        #[arg(long)]
        include_source_body: bool,
        /// Add missing keys to existing atlases instead of replacing them.
        #[arg(long)]
        merge: bool,
        /// Package name to skip (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Worker threads (default: available parallelism).
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Print one entry of a stored atlas.
    Lookup {
        /// Atlas store directory.
        #[arg(long)]
        store: PathBuf,
        /// Package whose newest atlas is searched.
        #[arg(long)]
        package: String,
        /// Dotted key or `package@symbol` reference.
        key: String,
    },
    /// Search keys of a stored atlas.
    Search {
        /// Atlas store directory.
        #[arg(long)]
        store: PathBuf,
        /// Package whose newest atlas is searched.
        #[arg(long)]
        package: String,
        /// Search text.
        query: String,
        /// Match key prefixes instead of substrings.
        #[arg(long)]
        prefix: bool,
        /// Maximum number of hits.
        #[arg(long)]
        limit: Option<usize>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            let response = ErrorResponse::new(&err);
            // Errors go to stdout as JSON like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber. `RUST_LOG` overrides `--log-level`.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<ExitCode, AtlasError> {
    match cli.command {
        Command::Scan {
            roots,
            out,
            config,
            follow_symlinks,
            exclude_submodules,
            include_source_body,
            merge,
            exclude,
            jobs,
        } => {
            let options = ScanOptions {
                roots,
                out,
                config,
                follow_symlinks,
                exclude_submodules,
                include_source_body,
                merge,
                exclude,
                jobs,
            };
            let response = run_scan(&options)?;
            emit_response(&response, &mut io::stdout())
                .map_err(|e| AtlasError::internal(format!("failed to write output: {}", e)))?;
            if response.failed_count() > 0 {
                tracing::warn!(
                    "{} of {} packages failed",
                    response.failed_count(),
                    response.packages.len()
                );
                return Ok(ExitCode::from(OutputErrorCode::PackageFailed.code()));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Lookup {
            store,
            package,
            key,
        } => {
            let json = run_lookup(&store, &package, &key)?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Command::Search {
            store,
            package,
            query,
            prefix,
            limit,
        } => {
            let json = run_search(&store, &package, &query, prefix, limit)?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
    }
}
