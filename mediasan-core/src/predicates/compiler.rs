//! compiler.rs - Compiles and caches safety rules.
//!
//! Rules are turned into case-insensitive regexes grouped by media kind. The
//! compiled set is cached process-wide, keyed by a hash of the rule list, so a
//! `scan` followed by a `sanitize` in one process compiles once.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::config::{SafetyRule, MAX_PATTERN_LENGTH};
use crate::errors::MediaSanError;
use crate::media::MediaKind;

/// A single compiled safety rule.
#[derive(Debug)]
pub struct CompiledRule {
    pub name: String,
    pub kind: MediaKind,
    pub regex: Regex,
}

/// Every compiled rule, in declaration order.
#[derive(Debug, Default)]
pub struct CompiledRules {
    pub rules: Vec<CompiledRule>,
}

impl CompiledRules {
    pub fn for_kind(&self, kind: MediaKind) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }
}

lazy_static! {
    static ref COMPILED_RULES_CACHE: RwLock<HashMap<u64, Arc<CompiledRules>>> = RwLock::new(HashMap::new());
}

fn hash_rules(rules: &[SafetyRule]) -> u64 {
    let mut hasher = DefaultHasher::new();
    let mut sorted: Vec<&SafetyRule> = rules.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted.hash(&mut hasher);
    hasher.finish()
}

/// Compiles `rules`, collecting every failure before reporting.
pub fn compile_rules(rules: &[SafetyRule]) -> Result<CompiledRules, MediaSanError> {
    debug!("Starting compilation of {} safety rules.", rules.len());

    let mut compiled = Vec::with_capacity(rules.len());
    let mut errors = Vec::new();

    for rule in rules {
        if rule.pattern.len() > MAX_PATTERN_LENGTH {
            errors.push(MediaSanError::PatternLengthExceeded(
                rule.name.clone(),
                rule.pattern.len(),
                MAX_PATTERN_LENGTH,
            ));
            continue;
        }

        let built = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .size_limit(10 * (1 << 20))
            .build();

        match built {
            Ok(regex) => {
                log::debug!(
                    target: "mediasan_core::predicates",
                    "Rule '{}' compiled successfully.",
                    &rule.name
                );
                compiled.push(CompiledRule {
                    name: rule.name.clone(),
                    kind: rule.kind,
                    regex,
                });
            }
            Err(e) => errors.push(MediaSanError::RuleCompilationError(rule.name.clone(), e)),
        }
    }

    if !errors.is_empty() {
        let message = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
        return Err(MediaSanError::Fatal(format!(
            "Failed to compile {} rule(s):\n{}",
            errors.len(),
            message
        )));
    }

    debug!("Finished compiling rules. Total compiled: {}.", compiled.len());
    Ok(CompiledRules { rules: compiled })
}

/// Gets a compiled rule set from the cache or compiles it.
pub fn get_or_compile_rules(rules: &[SafetyRule]) -> Result<Arc<CompiledRules>, MediaSanError> {
    let key = hash_rules(rules);

    {
        let cache = COMPILED_RULES_CACHE
            .read()
            .map_err(|_| MediaSanError::Fatal("compiled rule cache lock poisoned".to_string()))?;
        if let Some(found) = cache.get(&key) {
            debug!("Serving compiled rules from cache for key: {}", key);
            return Ok(Arc::clone(found));
        }
    }

    let compiled = Arc::new(compile_rules(rules)?);
    COMPILED_RULES_CACHE
        .write()
        .map_err(|_| MediaSanError::Fatal("compiled rule cache lock poisoned".to_string()))?
        .insert(key, Arc::clone(&compiled));
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, pattern: &str) -> SafetyRule {
        SafetyRule {
            name: name.to_string(),
            kind: MediaKind::Vector,
            pattern: pattern.to_string(),
            description: None,
            severity: None,
        }
    }

    #[test]
    fn rules_compile_case_insensitively() {
        let compiled = compile_rules(&[rule("script", "<script")]).unwrap();
        assert!(compiled.rules[0].regex.is_match("<SCRIPT>"));
    }

    #[test]
    fn overlong_patterns_are_rejected() {
        let long = "a".repeat(MAX_PATTERN_LENGTH + 1);
        let err = compile_rules(&[rule("long", &long)]).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum allowed"));
    }

    #[test]
    fn cache_returns_shared_instance() {
        let rules = vec![rule("cache_probe", "<cacheprobe")];
        let a = get_or_compile_rules(&rules).unwrap();
        let b = get_or_compile_rules(&rules).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
