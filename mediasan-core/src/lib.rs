//! # mediasan core library
//!
//! `mediasan-core` turns untrusted media (raster images, SVG drawings, PDF
//! documents) into artifacts that are free of known injection vectors before
//! they are published to a zero-script website.
//!
//! Every file is classified by extension, pushed through an ordered chain of
//! sanitization strategies and accepted only once the safety predicate for its
//! kind, run independently over the produced artifact, finds nothing. A tool
//! reporting success is never enough. Files no strategy can clean are
//! quarantined with the original preserved; unsupported files are rejected.
//!
//! ## Modules
//!
//! * `media`: Classification of files into media kinds.
//! * `config`: Safety rules and the YAML pipeline configuration.
//! * `predicates`: Compiled, case-insensitive safety predicates per kind.
//! * `tools`: The `Toolkit` capability and its command-line implementation.
//! * `strategies`: Ordered sanitization strategies per kind.
//! * `verifier`: Runs the predicate for a kind against an artifact on disk.
//! * `pipeline`: The orchestrator driving files to a terminal outcome.
//! * `report`: Per-file records, the run tally and the JSON security report.
//! * `errors`: Run-level and per-invocation error types.
//!
//! ## Usage Example
//!
//! ```no_run
//! use mediasan_core::{Pipeline, PipelineConfig, RunLayout};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = PipelineConfig::discover(None)?;
//! let pipeline = Pipeline::with_command_tools(&config)?;
//! let report = pipeline.run(&RunLayout::new("uploads", "public/media", "quarantine")).await?;
//! if !report.is_clean() {
//!     eprintln!("{} violation(s)", report.tally().security_violations);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Known limitation
//!
//! The predicates are syntactic. Entity-escaped or otherwise encoded payloads
//! (for example `&#106;avascript:`) are not decoded and may evade them.
//! Elements under a declared namespace prefix (for example `<svg:script>`)
//! are not matched by the SVG predicates either, although both SVG
//! strategies remove them.
//!
//! ---
//! License: MIT OR APACHE 2.0

pub mod config;
pub mod errors;
pub mod media;
pub mod pipeline;
pub mod predicates;
pub mod report;
pub mod strategies;
pub mod tools;
pub mod verifier;

pub use config::{
    config_candidate_paths, load_default_rules, merge_rules, ImageConfig, LimitsConfig, PipelineConfig,
    SafetyRule, ToolsConfig, MAX_PATTERN_LENGTH,
};

pub use errors::{MediaSanError, ToolError};

pub use media::{classify, MediaFile, MediaKind};

pub use predicates::{SafetyPredicates, VerificationResult, Violation, UNVERIFIABLE_RULE};

pub use tools::{CommandToolkit, Toolkit};

pub use strategies::{SanitizationStrategy, StrategyChains, StrategyId};

pub use verifier::Verifier;

pub use pipeline::{Pipeline, RunLayout, STAGING_DIR};

pub use report::{
    AttemptRecord, AttemptStatus, EnforcementPolicy, FileRecord, Outcome, RunTally, ScanEntry, ScanReport,
    SecurityReport, REPORT_FILE_NAME,
};
