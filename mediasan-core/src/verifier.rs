//! The verifier turns an artifact on disk into the text its kind's predicate
//! judges, then evaluates it. Anything that cannot be inspected is unsafe.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, warn};
use std::path::Path;

use crate::media::MediaKind;
use crate::predicates::{SafetyPredicates, VerificationResult};
use crate::tools::Toolkit;

#[derive(Debug, Clone)]
pub struct Verifier {
    predicates: SafetyPredicates,
}

impl Verifier {
    pub fn new(predicates: SafetyPredicates) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &SafetyPredicates {
        &self.predicates
    }

    /// Judges the artifact at `path` as a file of `kind`.
    pub async fn verify(&self, kind: MediaKind, path: &Path, tools: &dyn Toolkit) -> VerificationResult {
        let text = match kind {
            MediaKind::Image => tools.extract_metadata(path).await.map_err(|e| e.to_string()),
            MediaKind::Vector => tokio::fs::read(path)
                .await
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .map_err(|e| format!("failed to read {}: {}", path.display(), e)),
            MediaKind::Document => tools.extract_strings(path).await.map_err(|e| e.to_string()),
            MediaKind::Unsupported => Ok(String::new()),
        };

        let result = match text {
            Ok(text) => self.predicates.evaluate(kind, &text),
            Err(reason) => {
                warn!("Could not inspect {}: {}", path.display(), reason);
                VerificationResult::unverifiable(reason)
            }
        };
        debug!(
            "Verified {} as {}: safe={} ({} violation(s))",
            path.display(),
            kind,
            result.safe,
            result.violations.len()
        );
        result
    }
}
