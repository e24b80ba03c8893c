//! The security report.
//!
//! Workers never share counters. Each file yields a [`FileRecord`]; when the
//! run ends the records are folded into a [`RunTally`] and frozen into a
//! [`SecurityReport`], which has no mutating methods.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::media::MediaKind;
use crate::predicates::{VerificationResult, Violation};
use crate::strategies::StrategyId;

/// Default report file name inside the output root.
pub const REPORT_FILE_NAME: &str = "security-report.json";

/// How a strategy attempt ended before verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The tool ran and left a non-empty artifact.
    Completed,
    ExecutionFailed,
    TimedOut,
}

/// One strategy attempt against one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub strategy: StrategyId,
    pub status: AttemptStatus,
    /// Present only for completed attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AttemptRecord {
    pub fn verified(strategy: StrategyId, verification: VerificationResult) -> Self {
        Self {
            strategy,
            status: AttemptStatus::Completed,
            verification: Some(verification),
            detail: None,
        }
    }

    pub fn failed(strategy: StrategyId, status: AttemptStatus, detail: impl Into<String>) -> Self {
        Self {
            strategy,
            status,
            verification: None,
            detail: Some(detail.into()),
        }
    }

    /// True when the attempt produced an artifact that failed verification.
    pub fn failed_verification(&self) -> bool {
        self.verification.as_ref().is_some_and(|v| !v.safe)
    }
}

/// Terminal outcome of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Quarantined,
    Rejected,
}

/// What is known about a sanitizable file once its attempts are over.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEvidence {
    pub source: String,
    pub kind: MediaKind,
    pub byte_size: u64,
    pub sha256: String,
    pub input_findings: Vec<Violation>,
    pub attempts: Vec<AttemptRecord>,
}

/// Everything the run learned about one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    source: String,
    kind: MediaKind,
    byte_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    input_findings: Vec<Violation>,
    attempts: Vec<AttemptRecord>,
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quarantine: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    violations: u64,
}

impl FileRecord {
    /// A file rejected before any strategy ran. Always one violation.
    pub fn rejected(source: String, kind: MediaKind, byte_size: u64, reason: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            byte_size,
            sha256: None,
            input_findings: Vec::new(),
            attempts: Vec::new(),
            outcome: Outcome::Rejected,
            output: None,
            output_sha256: None,
            quarantine: None,
            detail: Some(reason.into()),
            violations: 1,
        }
    }

    pub fn accepted(evidence: FileEvidence, output: PathBuf, output_sha256: String) -> Self {
        let violations = count_failed_verifications(&evidence.attempts);
        Self {
            source: evidence.source,
            kind: evidence.kind,
            byte_size: evidence.byte_size,
            sha256: Some(evidence.sha256),
            input_findings: evidence.input_findings,
            attempts: evidence.attempts,
            outcome: Outcome::Accepted,
            output: Some(output),
            output_sha256: Some(output_sha256),
            quarantine: None,
            detail: None,
            violations,
        }
    }

    /// A file no strategy could clean. Counts every failed verification, and
    /// at least one violation even when no attempt got as far as verifying.
    pub fn quarantined(evidence: FileEvidence, quarantine: Option<PathBuf>, detail: Option<String>) -> Self {
        let violations = count_failed_verifications(&evidence.attempts).max(1);
        Self {
            source: evidence.source,
            kind: evidence.kind,
            byte_size: evidence.byte_size,
            sha256: Some(evidence.sha256),
            input_findings: evidence.input_findings,
            attempts: evidence.attempts,
            outcome: Outcome::Quarantined,
            output: None,
            output_sha256: None,
            quarantine,
            detail,
            violations,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    pub fn input_findings(&self) -> &[Violation] {
        &self.input_findings
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn output_sha256(&self) -> Option<&str> {
        self.output_sha256.as_deref()
    }

    pub fn quarantine(&self) -> Option<&Path> {
        self.quarantine.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn violations(&self) -> u64 {
        self.violations
    }
}

fn count_failed_verifications(attempts: &[AttemptRecord]) -> u64 {
    attempts.iter().filter(|a| a.failed_verification()).count() as u64
}

/// Per-run accumulator. Counters only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub total_files: u64,
    pub processed_files: u64,
    pub failed_files: u64,
    pub quarantined_files: u64,
    pub rejected_files: u64,
    pub security_violations: u64,
}

impl RunTally {
    pub fn absorb(mut self, record: &FileRecord) -> Self {
        self.total_files += 1;
        self.security_violations += record.violations;
        match record.outcome {
            Outcome::Accepted => self.processed_files += 1,
            Outcome::Quarantined => {
                self.failed_files += 1;
                self.quarantined_files += 1;
            }
            Outcome::Rejected => {
                self.failed_files += 1;
                self.rejected_files += 1;
            }
        }
        self
    }

    pub fn is_clean(&self) -> bool {
        self.security_violations == 0 && self.failed_files == 0
    }
}

/// The fixed policy every run enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcementPolicy {
    pub zero_tolerance: bool,
    pub exif_removal: &'static str,
    pub svg_script_removal: &'static str,
    pub pdf_active_content_removal: &'static str,
}

impl Default for EnforcementPolicy {
    fn default() -> Self {
        Self {
            zero_tolerance: true,
            exif_removal: "mandatory",
            svg_script_removal: "mandatory",
            pdf_active_content_removal: "mandatory",
        }
    }
}

/// Directories and identity of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub quarantine_directory: PathBuf,
}

/// Final, immutable report of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    run_id: String,
    scan_timestamp: DateTime<Utc>,
    input_directory: PathBuf,
    output_directory: PathBuf,
    quarantine_directory: PathBuf,
    #[serde(flatten)]
    tally: RunTally,
    enforcement_policy: EnforcementPolicy,
    files: Vec<FileRecord>,
}

impl SecurityReport {
    /// Folds `records` into the report, ordering them by source path.
    pub fn finalize(context: RunContext, mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.source.cmp(&b.source));
        let tally = records.iter().fold(RunTally::default(), |tally, r| tally.absorb(r));
        Self {
            run_id: context.run_id,
            scan_timestamp: context.started_at,
            input_directory: context.input_directory,
            output_directory: context.output_directory,
            quarantine_directory: context.quarantine_directory,
            tally,
            enforcement_policy: EnforcementPolicy::default(),
            files: records,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn scan_timestamp(&self) -> DateTime<Utc> {
        self.scan_timestamp
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn quarantine_directory(&self) -> &Path {
        &self.quarantine_directory
    }

    pub fn tally(&self) -> RunTally {
        self.tally
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn file(&self, source: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.source == source)
    }

    /// True only with zero violations and zero failed files.
    pub fn is_clean(&self) -> bool {
        self.tally.is_clean()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize security report")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write security report to {}", path.display()))?;
        info!("Security report written to {}", path.display());
        Ok(())
    }
}

/// Predicate verdict for one existing file, produced by a read-only scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub source: String,
    pub kind: MediaKind,
    pub verification: VerificationResult,
}

/// Result of re-verifying a tree without modifying it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    root: PathBuf,
    scan_timestamp: DateTime<Utc>,
    scanned_files: u64,
    unsafe_files: u64,
    entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn new(root: PathBuf, scan_timestamp: DateTime<Utc>, mut entries: Vec<ScanEntry>) -> Self {
        entries.sort_by(|a, b| a.source.cmp(&b.source));
        let unsafe_files = entries.iter().filter(|e| !e.verification.safe).count() as u64;
        Self {
            root,
            scan_timestamp,
            scanned_files: entries.len() as u64,
            unsafe_files,
            entries,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scanned_files(&self) -> u64 {
        self.scanned_files
    }

    pub fn unsafe_files(&self) -> u64 {
        self.unsafe_files
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn is_clean(&self) -> bool {
        self.unsafe_files == 0
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize scan report")
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(ordinal: usize, name: &'static str) -> StrategyId {
        StrategyId { ordinal, name }
    }

    fn unsafe_result() -> VerificationResult {
        VerificationResult::from_violations(vec![Violation {
            rule: "svg_script_element".to_string(),
            excerpt: "<script".to_string(),
        }])
    }

    fn evidence(source: &str, kind: MediaKind, attempts: Vec<AttemptRecord>) -> FileEvidence {
        FileEvidence {
            source: source.to_string(),
            kind,
            byte_size: 10,
            sha256: "h".to_string(),
            input_findings: vec![],
            attempts,
        }
    }

    fn context() -> RunContext {
        RunContext {
            run_id: "run".to_string(),
            started_at: Utc::now(),
            input_directory: PathBuf::from("/in"),
            output_directory: PathBuf::from("/out"),
            quarantine_directory: PathBuf::from("/q"),
        }
    }

    #[test]
    fn accepted_after_one_unsafe_attempt_counts_one_violation() {
        let attempts = vec![
            AttemptRecord::verified(id(1, "structural-removal"), unsafe_result()),
            AttemptRecord::verified(id(2, "text-rewrite"), VerificationResult::from_violations(vec![])),
        ];
        let record = FileRecord::accepted(
            evidence("a.svg", MediaKind::Vector, attempts),
            PathBuf::from("/out/svgs/a.svg"),
            "h2".into(),
        );
        assert_eq!(record.violations(), 1);
        assert_eq!(record.outcome(), Outcome::Accepted);
    }

    #[test]
    fn quarantine_without_verification_still_counts() {
        let attempts = vec![AttemptRecord::failed(id(1, "restricted-flatten"), AttemptStatus::TimedOut, "slow")];
        let record = FileRecord::quarantined(evidence("a.pdf", MediaKind::Document, attempts), None, None);
        assert_eq!(record.violations(), 1);
    }

    #[test]
    fn tally_partitions_every_file() {
        let records = vec![
            FileRecord::rejected("x.exe".into(), MediaKind::Unsupported, 1, "unsupported"),
            FileRecord::accepted(
                evidence("a.png", MediaKind::Image, vec![]),
                PathBuf::from("/out/images/a.png"),
                "h".into(),
            ),
            FileRecord::quarantined(evidence("b.pdf", MediaKind::Document, vec![]), None, None),
        ];
        let report = SecurityReport::finalize(context(), records);
        let tally = report.tally();
        assert_eq!(tally.total_files, 3);
        assert_eq!(tally.processed_files + tally.failed_files, tally.total_files);
        assert_eq!(tally.rejected_files, 1);
        assert_eq!(tally.quarantined_files, 1);
        assert_eq!(tally.security_violations, 2);
        assert!(!report.is_clean());
        assert_eq!(report.files()[0].source(), "a.png");
    }

    #[test]
    fn json_carries_policy_and_flat_counters() {
        let report = SecurityReport::finalize(context(), vec![]);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["total_files"], 0);
        assert_eq!(json["security_violations"], 0);
        assert_eq!(json["enforcement_policy"]["zero_tolerance"], true);
        assert_eq!(json["enforcement_policy"]["exif_removal"], "mandatory");
        assert!(json["scan_timestamp"].is_string());
        assert!(report.is_clean());
    }

    #[test]
    fn digest_is_lowercase_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
