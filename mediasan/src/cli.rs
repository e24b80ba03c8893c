// mediasan/src/cli.rs
//! This file defines the command-line interface (CLI) for the mediasan application,
//! including all available commands and their arguments.
//! License: MIT OR APACHE 2.0

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "mediasan",
    author = "Relay",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sanitize and verify untrusted images, SVGs and PDFs",
    long_about = "mediasan pushes every file of an upload tree through an ordered chain of sanitization tools, independently re-checks each result for scripts, active content and metadata, and publishes only verified-clean artifacts. Files that no strategy can clean are quarantined with the original preserved; unsupported files are rejected. A JSON security report records every decision.",
    arg_required_else_help = true,
)]
pub struct Cli {
    /// Disable informational messages
    #[arg(long, short = 'q', global = true, help = "Suppress all informational and debug messages.")]
    pub quiet: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, short = 'd', global = true, help = "Enable debug logging.")]
    pub debug: bool,

    /// Specify the path to a custom YAML theme file.
    #[arg(long = "theme", value_name = "FILE", global = true, help = "Specify the path to a custom YAML theme file.")]
    pub theme: Option<PathBuf>,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// All available commands for the `mediasan` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sanitizes every file under an input directory.
    #[command(about = "Sanitize an input tree into verified output, quarantining what cannot be cleaned.")]
    Sanitize(SanitizeCommand),

    /// Re-verifies existing files without modifying them.
    #[command(about = "Run the safety predicates over existing files without modifying anything.")]
    Scan(ScanCommand),

    /// Checks that every configured tool can be found.
    #[command(name = "check-tools", about = "Check that every configured external tool is available.")]
    CheckTools(CheckToolsCommand),
}

/// Arguments for the `sanitize` command.
#[derive(Parser, Debug)]
pub struct SanitizeCommand {
    /// Directory of untrusted files, scanned recursively.
    #[arg(long, short = 'i', value_name = "DIR", help = "Directory of untrusted input files (scanned recursively).")]
    pub input: PathBuf,

    /// Root for sanitized artifacts (`images/`, `svgs/`, `pdfs/`).
    #[arg(long, short = 'o', value_name = "DIR", help = "Output root for verified artifacts.")]
    pub output: PathBuf,

    /// Where originals that could not be cleaned are preserved.
    #[arg(long, short = 'Q', value_name = "DIR", help = "Quarantine directory for files that could not be cleaned.")]
    pub quarantine: PathBuf,

    /// Path to a pipeline configuration file (YAML).
    #[arg(long = "config", value_name = "FILE", env = "MEDIASAN_CONFIG", help = "Path to a pipeline configuration file (YAML).")]
    pub config: Option<PathBuf>,

    /// Where to write the JSON security report.
    #[arg(long = "report", value_name = "FILE", help = "Write the JSON security report here instead of <output>/security-report.json.")]
    pub report: Option<PathBuf>,

    /// Number of files processed concurrently.
    #[arg(long = "workers", value_name = "N", help = "Number of files processed concurrently (defaults to available parallelism).")]
    pub workers: Option<usize>,

    /// Time limit for one strategy attempt.
    #[arg(long = "timeout-secs", value_name = "N", help = "Time limit in seconds for a single strategy attempt.")]
    pub timeout_secs: Option<u64>,

    /// Also print the JSON report to stdout.
    #[arg(long = "json-stdout", help = "Print the JSON security report to stdout.")]
    pub json_stdout: bool,
}

/// Arguments for the `scan` command.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Directory to verify.
    #[arg(value_name = "DIR", help = "Directory to verify (for example a published output tree).")]
    pub dir: PathBuf,

    /// Path to a pipeline configuration file (YAML).
    #[arg(long = "config", value_name = "FILE", env = "MEDIASAN_CONFIG", help = "Path to a pipeline configuration file (YAML).")]
    pub config: Option<PathBuf>,

    /// Print the scan results as JSON to stdout.
    #[arg(long = "json-stdout", help = "Print the scan results as JSON to stdout.")]
    pub json_stdout: bool,
}

/// Arguments for the `check-tools` command.
#[derive(Parser, Debug)]
pub struct CheckToolsCommand {
    /// Path to a pipeline configuration file (YAML).
    #[arg(long = "config", value_name = "FILE", env = "MEDIASAN_CONFIG", help = "Path to a pipeline configuration file (YAML).")]
    pub config: Option<PathBuf>,
}
