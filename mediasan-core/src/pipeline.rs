//! The pipeline orchestrator.
//!
//! A run resolves and checks the directory layout, verifies every external
//! tool is present, discovers the input tree and then drives each file
//! through its strategy chain on a bounded set of concurrent workers:
//!
//! ```text
//! Discovered -> Classified -> Unsupported ----------------------------> Rejected
//!                          -> Attempting(i) -> Verifying(i) -> safe ----> Accepted
//!                                                           -> unsafe --> Attempting(i+1) | Quarantined
//! ```
//!
//! Every attempt writes into a per-run staging directory under the output
//! root. Only a verified artifact is moved into the output tree; everything
//! else is deleted as soon as it has been judged.
//!
//! License: MIT OR APACHE 2.0

use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{LimitsConfig, PipelineConfig};
use crate::errors::{MediaSanError, ToolError};
use crate::media::{classify, MediaFile, MediaKind};
use crate::predicates::{SafetyPredicates, VerificationResult};
use crate::report::{
    sha256_hex, AttemptRecord, AttemptStatus, FileEvidence, FileRecord, RunContext, ScanEntry, ScanReport,
    SecurityReport, REPORT_FILE_NAME,
};
use crate::strategies::{StrategyChains, StrategyId};
use crate::tools::{CommandToolkit, Toolkit};
use crate::verifier::Verifier;

/// Directory under the output root that holds per-run staging areas.
pub const STAGING_DIR: &str = ".staging";

/// Directories of one sanitization run, as given by the caller.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quarantine: PathBuf,
    /// Where to write the JSON report; defaults to the output root.
    pub report: Option<PathBuf>,
}

impl RunLayout {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, quarantine: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            quarantine: quarantine.into(),
            report: None,
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.report
            .clone()
            .unwrap_or_else(|| self.output.join(REPORT_FILE_NAME))
    }
}

/// Canonical, validated directories.
#[derive(Debug, Clone)]
struct ResolvedLayout {
    input: PathBuf,
    output: PathBuf,
    quarantine: PathBuf,
}

pub struct Pipeline {
    toolkit: Arc<dyn Toolkit>,
    verifier: Verifier,
    chains: Arc<StrategyChains>,
    limits: LimitsConfig,
    attempt_timeout: Duration,
}

impl Pipeline {
    /// Builds a pipeline over an arbitrary toolkit.
    pub fn new(config: &PipelineConfig, toolkit: Arc<dyn Toolkit>) -> Result<Self, MediaSanError> {
        config.validate()?;
        let predicates = SafetyPredicates::new(&config.effective_rules()?)?;
        Ok(Self {
            toolkit,
            verifier: Verifier::new(predicates),
            chains: Arc::new(StrategyChains::new(&config.image)),
            limits: config.limits.clone(),
            attempt_timeout: Duration::from_secs(config.limits.attempt_timeout_secs),
        })
    }

    /// Builds a pipeline that runs the configured command-line tools.
    pub fn with_command_tools(config: &PipelineConfig) -> Result<Self, MediaSanError> {
        let timeout = Duration::from_secs(config.limits.attempt_timeout_secs);
        let toolkit = Arc::new(CommandToolkit::new(config.tools.clone(), timeout));
        Self::new(config, toolkit)
    }

    /// Overrides the per-attempt time limit.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Fails when any required tool is missing.
    pub fn preflight(&self) -> Result<(), MediaSanError> {
        self.toolkit.preflight()
    }

    /// Sanitizes every file under the input root and writes the report.
    ///
    /// Per-file failures end up in the report; only a missing tool, an
    /// unusable layout or a failure to write the report return `Err`.
    pub async fn run(&self, layout: &RunLayout) -> Result<SecurityReport, MediaSanError> {
        self.preflight()?;
        let resolved = resolve_layout(layout)?;
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            "Run {} started: {} -> {} (quarantine {})",
            run_id,
            resolved.input.display(),
            resolved.output.display(),
            resolved.quarantine.display()
        );

        let excluded = vec![resolved.output.clone(), resolved.quarantine.clone()];
        let Discovery { files, skipped } = discover_blocking(resolved.input.clone(), excluded).await?;
        let destinations = destination_names(&files);
        info!("Discovered {} file(s), {} skipped.", files.len(), skipped.len());

        let staging = resolved.output.join(STAGING_DIR).join(&run_id);
        tokio::fs::create_dir_all(&staging).await?;

        let worker = Arc::new(FileWorker {
            toolkit: Arc::clone(&self.toolkit),
            verifier: self.verifier.clone(),
            chains: Arc::clone(&self.chains),
            max_file_bytes: self.limits.max_file_bytes,
            attempt_timeout: self.attempt_timeout,
            input_root: resolved.input.clone(),
            output_root: resolved.output.clone(),
            quarantine_root: resolved.quarantine.clone(),
            staging: staging.clone(),
        });

        let joined = process_all(worker, files, destinations, self.limits.effective_workers()).await;
        remove_staging(&staging).await;
        let mut records = joined?;
        records.extend(skipped.iter().map(|entry| entry.rejected(&resolved.input)));

        let report = SecurityReport::finalize(
            RunContext {
                run_id,
                started_at,
                input_directory: resolved.input,
                output_directory: resolved.output,
                quarantine_directory: resolved.quarantine,
            },
            records,
        );
        let tally = report.tally();
        info!(
            "Run {} finished: {} total, {} accepted, {} quarantined, {} rejected, {} violation(s).",
            report.run_id(),
            tally.total_files,
            tally.processed_files,
            tally.quarantined_files,
            tally.rejected_files,
            tally.security_violations
        );
        report.write_json(&layout.report_path())?;
        Ok(report)
    }

    /// Re-verifies every file under `root` without modifying anything.
    ///
    /// A report file and staging directory left by a previous run at the
    /// root are skipped.
    pub async fn scan(&self, root: &Path) -> Result<ScanReport, MediaSanError> {
        self.preflight()?;
        let root = canonical_dir(root, "scan root")?;
        let started_at = Utc::now();
        let report_file = root.join(REPORT_FILE_NAME);
        let discovery = discover_blocking(root.clone(), vec![root.join(STAGING_DIR)]).await?;
        let files = discovery
            .files
            .into_iter()
            .filter(|f| f.source() != report_file.as_path())
            .collect::<Vec<_>>();
        info!("Scanning {} file(s) under {}", files.len(), root.display());

        let semaphore = Arc::new(Semaphore::new(self.limits.effective_workers()));
        let mut set = JoinSet::new();
        for file in files {
            let semaphore = Arc::clone(&semaphore);
            let toolkit = Arc::clone(&self.toolkit);
            let verifier = self.verifier.clone();
            let source = relative_source(&root, file.source());
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let verification = verifier.verify(file.kind(), file.source(), toolkit.as_ref()).await;
                ScanEntry {
                    source,
                    kind: file.kind(),
                    verification,
                }
            });
        }

        let mut entries: Vec<ScanEntry> = discovery.skipped.iter().map(|s| s.scan_entry(&root)).collect();
        while let Some(joined) = set.join_next().await {
            entries.push(joined.map_err(|e| MediaSanError::Fatal(format!("scan worker failed: {e}")))?);
        }
        Ok(ScanReport::new(root, started_at, entries))
    }
}

/// Everything a spawned task needs to process one file.
struct FileWorker {
    toolkit: Arc<dyn Toolkit>,
    verifier: Verifier,
    chains: Arc<StrategyChains>,
    max_file_bytes: u64,
    attempt_timeout: Duration,
    input_root: PathBuf,
    output_root: PathBuf,
    quarantine_root: PathBuf,
    staging: PathBuf,
}

struct FileJob {
    index: usize,
    file: MediaFile,
    destination: String,
}

impl FileWorker {
    async fn process(&self, job: FileJob) -> FileRecord {
        let source = relative_source(&self.input_root, job.file.source());
        let kind = job.file.kind();
        let byte_size = job.file.byte_size();

        let Some(subdir) = kind.subdirectory() else {
            warn!("Rejected {}: unsupported media kind", source);
            return FileRecord::rejected(source, kind, byte_size, "unsupported media kind");
        };
        if byte_size > self.max_file_bytes {
            warn!("Rejected {}: {} bytes exceeds the limit", source, byte_size);
            return FileRecord::rejected(
                source,
                kind,
                byte_size,
                format!("{} bytes exceeds the {} byte limit", byte_size, self.max_file_bytes),
            );
        }
        let original = match tokio::fs::read(job.file.source()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Rejected {}: unreadable ({})", source, e);
                return FileRecord::rejected(source, kind, byte_size, format!("unreadable input: {e}"));
            }
        };

        let input_findings = self
            .verifier
            .verify(kind, job.file.source(), self.toolkit.as_ref())
            .await
            .violations;
        debug!("{}: {} finding(s) before sanitization", source, input_findings.len());

        let mut evidence = FileEvidence {
            source,
            kind,
            byte_size,
            sha256: sha256_hex(&original),
            input_findings,
            attempts: Vec::new(),
        };

        for (i, strategy) in self.chains.for_kind(kind).iter().enumerate() {
            let id = StrategyId {
                ordinal: i + 1,
                name: strategy.name(),
            };
            let staged = self
                .staging
                .join(format!("{}-{}-{}", job.index, id.ordinal, job.destination));

            let attempt = tokio::time::timeout(
                self.attempt_timeout,
                strategy.attempt(job.file.source(), &staged, self.toolkit.as_ref()),
            )
            .await;
            let failure = match attempt {
                Err(_) => Some((
                    AttemptStatus::TimedOut,
                    format!("attempt exceeded {:?}", self.attempt_timeout),
                )),
                Ok(Err(e)) if e.is_timeout() => Some((AttemptStatus::TimedOut, e.to_string())),
                Ok(Err(e)) => Some((AttemptStatus::ExecutionFailed, e.to_string())),
                Ok(Ok(())) => {
                    if has_content(&staged).await {
                        None
                    } else {
                        let empty = ToolError::EmptyOutput {
                            program: id.name.to_string(),
                        };
                        Some((AttemptStatus::ExecutionFailed, empty.to_string()))
                    }
                }
            };
            if let Some((status, detail)) = failure {
                debug!("{}: attempt {} failed: {}", evidence.source, id, detail);
                discard(&staged).await;
                evidence.attempts.push(AttemptRecord::failed(id, status, detail));
                continue;
            }

            let verification = self.verifier.verify(kind, &staged, self.toolkit.as_ref()).await;
            if !verification.safe {
                warn!(
                    "{}: output of {} failed verification ({} violation(s))",
                    evidence.source,
                    id,
                    verification.violations.len()
                );
                discard(&staged).await;
                evidence.attempts.push(AttemptRecord::verified(id, verification));
                continue;
            }

            let destination = self.output_root.join(subdir).join(&job.destination);
            match emit(&staged, &destination).await {
                Ok(digest) => {
                    info!("{}: accepted via {}", evidence.source, id);
                    evidence.attempts.push(AttemptRecord::verified(id, verification));
                    return FileRecord::accepted(evidence, destination, digest);
                }
                Err(e) => {
                    error!("{}: could not emit {}: {}", evidence.source, destination.display(), e);
                    discard(&staged).await;
                    evidence.attempts.push(AttemptRecord::failed(
                        id,
                        AttemptStatus::ExecutionFailed,
                        format!("failed to emit artifact: {e}"),
                    ));
                }
            }
        }

        let target = self.quarantine_root.join(subdir).join(&job.destination);
        let (quarantine, detail) = match write_file(&target, &original).await {
            Ok(()) => (Some(target), None),
            Err(e) => {
                error!("{}: could not preserve original in quarantine: {}", evidence.source, e);
                (None, Some(format!("failed to preserve original: {e}")))
            }
        };
        warn!("Quarantined {} after {} attempt(s)", evidence.source, evidence.attempts.len());
        FileRecord::quarantined(evidence, quarantine, detail)
    }
}

async fn process_all(
    worker: Arc<FileWorker>,
    files: Vec<MediaFile>,
    destinations: Vec<String>,
    workers: usize,
) -> Result<Vec<FileRecord>, MediaSanError> {
    debug!("Processing with {} worker(s).", workers);
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();
    for (index, (file, destination)) in files.into_iter().zip(destinations).enumerate() {
        let worker = Arc::clone(&worker);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            worker
                .process(FileJob {
                    index,
                    file,
                    destination,
                })
                .await
        });
    }

    let mut records = Vec::new();
    while let Some(joined) = set.join_next().await {
        records.push(joined.map_err(|e| MediaSanError::Fatal(format!("file worker failed: {e}")))?);
    }
    Ok(records)
}

fn resolve_layout(layout: &RunLayout) -> Result<ResolvedLayout, MediaSanError> {
    let input = canonical_dir(&layout.input, "input root")?;
    let output = create_dir(&layout.output, "output root")?;
    let quarantine = create_dir(&layout.quarantine, "quarantine root")?;

    let invalid = |path: &Path, role: &str, reason: &str| MediaSanError::InvalidLayout {
        path: path.to_path_buf(),
        role: role.to_string(),
        reason: reason.to_string(),
    };
    if output == input {
        return Err(invalid(&output, "output root", "it is the input root"));
    }
    if quarantine == input {
        return Err(invalid(&quarantine, "quarantine root", "it is the input root"));
    }
    if quarantine == output {
        return Err(invalid(&quarantine, "quarantine root", "it is the output root"));
    }
    Ok(ResolvedLayout {
        input,
        output,
        quarantine,
    })
}

fn canonical_dir(path: &Path, role: &str) -> Result<PathBuf, MediaSanError> {
    let invalid = |reason: String| MediaSanError::InvalidLayout {
        path: path.to_path_buf(),
        role: role.to_string(),
        reason,
    };
    if !path.is_dir() {
        return Err(invalid("not an existing directory".to_string()));
    }
    path.canonicalize().map_err(|e| invalid(e.to_string()))
}

fn create_dir(path: &Path, role: &str) -> Result<PathBuf, MediaSanError> {
    std::fs::create_dir_all(path).map_err(|e| MediaSanError::InvalidLayout {
        path: path.to_path_buf(),
        role: role.to_string(),
        reason: e.to_string(),
    })?;
    canonical_dir(path, role)
}

async fn discover_blocking(root: PathBuf, excluded: Vec<PathBuf>) -> Result<Discovery, MediaSanError> {
    tokio::task::spawn_blocking(move || discover(&root, &excluded))
        .await
        .map_err(|e| MediaSanError::Fatal(format!("discovery failed: {e}")))
}

/// An entry discovery found but did not admit as a regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedEntry {
    /// The terminal record of a skipped entry: rejected, one violation.
    fn rejected(&self, root: &Path) -> FileRecord {
        let source = relative_source(root, &self.path);
        warn!("Rejected {}: {}", source, self.reason);
        FileRecord::rejected(source, classify(&self.path), 0, self.reason.clone())
    }

    fn scan_entry(&self, root: &Path) -> ScanEntry {
        ScanEntry {
            source: relative_source(root, &self.path),
            kind: classify(&self.path),
            verification: VerificationResult::unverifiable(self.reason.clone()),
        }
    }
}

/// Everything discovery found under a root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Regular files, in file-name order.
    pub files: Vec<MediaFile>,
    /// Symlinks and entries that could not be read.
    pub skipped: Vec<SkippedEntry>,
}

/// Walks `root` in file-name order. Symlinks are not followed but are
/// reported as skipped, like unreadable entries; `excluded` subtrees are
/// never entered.
pub fn discover(root: &Path, excluded: &[PathBuf]) -> Discovery {
    let mut found = Discovery::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !excluded.iter().any(|x| entry.path() == x.as_path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                warn!("Unreadable path during discovery: {}", e);
                found.skipped.push(SkippedEntry {
                    path,
                    reason: format!("unreadable input: {e}"),
                });
                continue;
            }
        };
        if entry.file_type().is_symlink() {
            debug!("Not following symlink {}", entry.path().display());
            found.skipped.push(SkippedEntry {
                path: entry.into_path(),
                reason: "symlink not followed".to_string(),
            });
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => found.files.push(MediaFile::new(entry.into_path(), meta.len())),
            Err(e) => {
                warn!("Unreadable metadata for {}: {}", entry.path().display(), e);
                found.skipped.push(SkippedEntry {
                    path: entry.into_path(),
                    reason: format!("unreadable input: {e}"),
                });
            }
        }
    }
    found
}

/// Output file names, one per file. A name already taken within the same
/// kind gets a `-2`, `-3`, ... suffix before its extension. Names compare
/// case-insensitively so the result is safe on case-folding filesystems.
pub fn destination_names(files: &[MediaFile]) -> Vec<String> {
    let mut taken: HashSet<(MediaKind, String)> = HashSet::new();
    files
        .iter()
        .map(|file| {
            let name = file.file_name();
            if taken.insert((file.kind(), name.to_lowercase())) {
                return name;
            }
            let path = Path::new(&name);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
            let mut n = 2;
            loop {
                let candidate = match &ext {
                    Some(ext) => format!("{stem}-{n}.{ext}"),
                    None => format!("{stem}-{n}"),
                };
                if taken.insert((file.kind(), candidate.to_lowercase())) {
                    break candidate;
                }
                n += 1;
            }
        })
        .collect()
}

fn relative_source(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().into_owned()
}

async fn has_content(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Moves a verified artifact into place and returns its digest.
async fn emit(staged: &Path, destination: &Path) -> std::io::Result<String> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = tokio::fs::read(staged).await?;
    tokio::fs::rename(staged, destination).await?;
    Ok(sha256_hex(&bytes))
}

async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete rejected artifact {}: {}", path.display(), e),
    }
}

async fn remove_staging(staging: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(staging).await {
        warn!("Failed to remove staging directory {}: {}", staging.display(), e);
    }
    if let Some(parent) = staging.parent() {
        // Only succeeds when no other run is using it.
        let _ = tokio::fs::remove_dir(parent).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> MediaFile {
        MediaFile::new(PathBuf::from(path), 1)
    }

    #[test]
    fn duplicate_names_get_numbered_suffixes() {
        let files = [
            file("/in/a/logo.png"),
            file("/in/b/logo.png"),
            file("/in/c/LOGO.png"),
            file("/in/logo.svg"),
            file("/in/d/logo-2.png"),
        ];
        assert_eq!(
            destination_names(&files),
            ["logo.png", "logo-2.png", "LOGO-3.png", "logo.svg", "logo-2-2.png"]
        );
    }

    #[test]
    fn discovery_skips_excluded_subtrees_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("out/images")).unwrap();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("b.png"), b"x").unwrap();
        std::fs::write(root.join("a.svg"), b"<svg/>").unwrap();
        std::fs::write(root.join("nested/c.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("out/images/old.png"), b"x").unwrap();

        let found = discover(root, &[root.join("out")]);
        assert!(found.skipped.is_empty());
        let names: Vec<String> = found.files.iter().map(|f| relative_source(root, f.source())).collect();
        assert_eq!(names, ["a.svg", "b.png", "nested/c.pdf"]);
    }

    #[cfg(unix)]
    #[test]
    fn discovery_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.png"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.png"), dir.path().join("link.png")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linkdir")).unwrap();
        let found = discover(dir.path(), &[]);
        assert!(found.files.is_empty());
        let skipped: Vec<String> = found.skipped.iter().map(|s| relative_source(dir.path(), &s.path)).collect();
        assert_eq!(skipped, ["link.png", "linkdir"]);
        assert!(found.skipped.iter().all(|s| s.reason.contains("symlink")));
    }

    #[test]
    fn layout_rejects_shared_roots() {
        let dir = tempfile::tempdir().unwrap();
        let same = RunLayout::new(dir.path(), dir.path(), dir.path().join("q"));
        assert!(matches!(resolve_layout(&same), Err(MediaSanError::InvalidLayout { .. })));

        let missing = RunLayout::new(dir.path().join("nope"), dir.path().join("o"), dir.path().join("q"));
        let err = resolve_layout(&missing).unwrap_err();
        assert!(err.to_string().contains("input root"));
    }
}
