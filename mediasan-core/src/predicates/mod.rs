//! Safety predicates.
//!
//! One predicate per media kind answers "does this text still contain a
//! forbidden construct?". The text is whatever represents the artifact for
//! that kind: extracted metadata tags for images, raw markup for SVGs and
//! extracted strings for PDFs. Matching is syntactic and case-insensitive; it
//! does not parse the format and does not decode entity-escaped or otherwise
//! encoded payloads.
//!
//! License: MIT OR APACHE 2.0

pub mod compiler;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SafetyRule;
use crate::errors::MediaSanError;
use crate::media::MediaKind;
use compiler::{get_or_compile_rules, CompiledRules};

/// Longest excerpt of matched text kept in a violation.
const MAX_EXCERPT_LEN: usize = 64;

/// Rule name used when an artifact cannot be inspected at all.
pub const UNVERIFIABLE_RULE: &str = "unverifiable_artifact";

/// One forbidden construct found in an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub excerpt: String,
}

impl Violation {
    pub fn unverifiable(reason: impl Into<String>) -> Self {
        Self {
            rule: UNVERIFIABLE_RULE.to_string(),
            excerpt: truncate(&reason.into()),
        }
    }
}

/// The judgement of a predicate over one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub safe: bool,
    pub violations: Vec<Violation>,
}

impl VerificationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            safe: violations.is_empty(),
            violations,
        }
    }

    pub fn unverifiable(reason: impl Into<String>) -> Self {
        Self::from_violations(vec![Violation::unverifiable(reason)])
    }
}

/// The compiled predicates for every kind.
#[derive(Debug, Clone)]
pub struct SafetyPredicates {
    compiled: Arc<CompiledRules>,
}

impl SafetyPredicates {
    pub fn new(rules: &[SafetyRule]) -> Result<Self, MediaSanError> {
        Ok(Self {
            compiled: get_or_compile_rules(rules)?,
        })
    }

    /// Predicates built from the embedded rule set only.
    pub fn builtin() -> Result<Self, MediaSanError> {
        let rules = crate::config::load_default_rules()?;
        Self::new(&rules)
    }

    /// Evaluates the predicate for `kind` over `text`.
    ///
    /// Every rule reports at most its first match. The unsupported kind has no
    /// predicate that could ever pass.
    pub fn evaluate(&self, kind: MediaKind, text: &str) -> VerificationResult {
        if kind == MediaKind::Unsupported {
            return VerificationResult::unverifiable("unsupported media kind");
        }
        let violations = self
            .compiled
            .for_kind(kind)
            .filter_map(|rule| {
                rule.regex.find(text).map(|m| Violation {
                    rule: rule.name.clone(),
                    excerpt: truncate(m.as_str()),
                })
            })
            .collect();
        VerificationResult::from_violations(violations)
    }

    pub fn rule_count(&self, kind: MediaKind) -> usize {
        self.compiled.for_kind(kind).count()
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_EXCERPT_LEN {
        return s.to_string();
    }
    let mut end = MAX_EXCERPT_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
