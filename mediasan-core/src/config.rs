//! Configuration management for `mediasan-core`.
//!
//! This module defines the safety rules behind the predicates and the pipeline
//! configuration (tool bindings, limits, image quality). Both are YAML: the
//! built-in rules are embedded in the crate, while a user configuration file
//! may rebind tools, tighten limits and append extra rules.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::media::MediaKind;

/// Maximum allowed length for a rule pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// File name looked up in the working directory and the user config directory.
pub const CONFIG_FILE_NAME: &str = "mediasan.yaml";

/// A single forbidden-construct rule used by a safety predicate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SafetyRule {
    /// Unique identifier for the rule (e.g., "svg_script_element").
    pub name: String,
    /// The media kind whose predicate owns this rule.
    pub kind: MediaKind,
    /// Regex pattern, always compiled case-insensitively.
    pub pattern: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

impl Hash for SafetyRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
        self.pattern.hash(state);
    }
}

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    rules: Vec<SafetyRule>,
}

/// Loads the built-in predicate rules from the embedded configuration.
pub fn load_default_rules() -> Result<Vec<SafetyRule>> {
    debug!("Loading default safety rules from embedded string...");
    let default_yaml = include_str!("../config/default_predicates.yaml");
    let file: RuleFile = serde_yml::from_str(default_yaml).context("Failed to parse default safety rules")?;
    debug!("Loaded {} default safety rules.", file.rules.len());
    Ok(file.rules)
}

/// Appends user rules to the built-in set.
///
/// Built-in rules can never be replaced or disabled: a user rule reusing a
/// built-in name is rejected.
pub fn merge_rules(defaults: Vec<SafetyRule>, extra: &[SafetyRule]) -> Result<Vec<SafetyRule>> {
    debug!("merge_rules called. {} default rules, {} extra rules.", defaults.len(), extra.len());
    let builtin: HashSet<&str> = defaults.iter().map(|r| r.name.as_str()).collect();
    if let Some(clash) = extra.iter().find(|r| builtin.contains(r.name.as_str())) {
        return Err(anyhow!(
            "Rule '{}' collides with a built-in rule; built-in rules cannot be overridden.",
            clash.name
        ));
    }
    let mut merged = defaults;
    merged.extend(extra.iter().cloned());
    validate_rules(&merged)?;
    debug!("Final total rules after merge: {}", merged.len());
    Ok(merged)
}

/// Validates rule integrity (names, kinds, regex compilation).
fn validate_rules(rules: &[SafetyRule]) -> Result<()> {
    let mut rule_names = HashSet::new();
    let mut errors = Vec::new();

    for rule in rules {
        if rule.name.is_empty() {
            errors.push("A rule has an empty `name` field.".to_string());
        } else if !rule_names.insert(rule.name.as_str()) {
            errors.push(format!("Duplicate rule name found: '{}'.", rule.name));
        }
        if rule.kind == MediaKind::Unsupported {
            errors.push(format!("Rule '{}' targets the unsupported kind.", rule.name));
        }
        if rule.pattern.is_empty() {
            errors.push(format!("Rule '{}' has an empty `pattern` field.", rule.name));
        } else if rule.pattern.len() > MAX_PATTERN_LENGTH {
            errors.push(format!(
                "Rule '{}': pattern length ({}) exceeds maximum allowed ({}).",
                rule.name,
                rule.pattern.len(),
                MAX_PATTERN_LENGTH
            ));
        } else if let Err(e) = Regex::new(&rule.pattern) {
            errors.push(format!("Rule '{}' has an invalid regex pattern: {}", rule.name, e));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Rule validation failed:\n{}", errors.join("\n")))
    }
}

/// Program names bound to each external tool role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// General-purpose image re-encoder (ImageMagick).
    pub image_encoder: String,
    /// Dedicated metadata-removal tool.
    pub metadata_stripper: String,
    /// Metadata lister used by the image predicate.
    pub metadata_extractor: String,
    /// Structural XML editor used on SVGs.
    pub xml_editor: String,
    /// Restricted document converter used to flatten PDFs.
    pub document_converter: String,
    /// Raw string extractor used by the document predicate.
    pub string_extractor: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            image_encoder: "convert".to_string(),
            metadata_stripper: "exiftool".to_string(),
            metadata_extractor: "exiftool".to_string(),
            xml_editor: "xmlstarlet".to_string(),
            document_converter: "gs".to_string(),
            string_extractor: "strings".to_string(),
        }
    }
}

impl ToolsConfig {
    /// Every (role, program) pair, in a stable order.
    pub fn bindings(&self) -> [(&'static str, &str); 6] {
        [
            ("image re-encoder", self.image_encoder.as_str()),
            ("metadata stripper", self.metadata_stripper.as_str()),
            ("metadata extractor", self.metadata_extractor.as_str()),
            ("xml structural editor", self.xml_editor.as_str()),
            ("restricted document converter", self.document_converter.as_str()),
            ("string extractor", self.string_extractor.as_str()),
        ]
    }

    /// Binds every role to the same program.
    pub fn uniform(program: &str) -> Self {
        Self {
            image_encoder: program.to_string(),
            metadata_stripper: program.to_string(),
            metadata_extractor: program.to_string(),
            xml_editor: program.to_string(),
            document_converter: program.to_string(),
            string_extractor: program.to_string(),
        }
    }
}

/// Resource limits for a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Wall-clock budget for a single strategy attempt.
    pub attempt_timeout_secs: u64,
    /// Concurrent files; 0 means available parallelism.
    pub workers: usize,
    /// Larger inputs are rejected before any strategy runs.
    pub max_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: 120,
            workers: 0,
            max_file_bytes: 100 * 1024 * 1024,
        }
    }
}

impl LimitsConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Fixed quality target for the re-encode strategy.
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tools: ToolsConfig,
    pub limits: LimitsConfig,
    pub image: ImageConfig,
    /// Extra predicate rules appended to the built-in set.
    pub rules: Vec<SafetyRule>,
}

impl PipelineConfig {
    /// Loads a pipeline configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading pipeline configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: PipelineConfig = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Uses `explicit` when given, else the first existing candidate file,
    /// else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        for candidate in config_candidate_paths() {
            if candidate.is_file() {
                return Self::load_from_file(&candidate);
            }
        }
        debug!("No configuration file found; using defaults.");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.limits.attempt_timeout_secs == 0 {
            errors.push("limits.attempt_timeout_secs must be greater than 0".to_string());
        }
        if self.limits.max_file_bytes == 0 {
            errors.push("limits.max_file_bytes must be greater than 0".to_string());
        }
        if !(1..=100).contains(&self.image.quality) {
            errors.push(format!("image.quality must be within 1..=100, got {}", self.image.quality));
        }
        for (role, program) in self.tools.bindings() {
            if program.trim().is_empty() {
                errors.push(format!("tool binding for {role} is empty"));
            }
        }
        if !errors.is_empty() {
            return Err(anyhow!("Configuration validation failed:\n{}", errors.join("\n")));
        }
        merge_rules(load_default_rules()?, &self.rules).map(|_| ())
    }

    /// Built-in rules followed by the configured extras.
    pub fn effective_rules(&self) -> Result<Vec<SafetyRule>> {
        merge_rules(load_default_rules()?, &self.rules)
    }
}

/// Locations searched for a configuration file, in priority order.
pub fn config_candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("mediasan").join("config.yaml"));
    }
    paths
}
