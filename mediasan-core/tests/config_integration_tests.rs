// mediasan-core/tests/config_integration_tests.rs
use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

use mediasan_core::{MediaKind, PipelineConfig, SafetyPredicates};

#[test]
fn test_load_from_file_with_extra_rule() -> Result<()> {
    let yaml_content = r#"
tools:
  image_encoder: "magick"
limits:
  workers: 4
  max_file_bytes: 1048576
rules:
  - name: svg_external_use
    kind: vector
    pattern: "<use[^>]+href\\s*=\\s*.https?:"
    description: "External <use> reference"
    severity: "medium"
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;

    let config = PipelineConfig::load_from_file(file.path())?;
    assert_eq!(config.tools.image_encoder, "magick");
    assert_eq!(config.tools.metadata_stripper, "exiftool");
    assert_eq!(config.limits.effective_workers(), 4);
    assert_eq!(config.rules.len(), 1);

    let predicates = SafetyPredicates::new(&config.effective_rules()?)?;
    let result = predicates.evaluate(
        MediaKind::Vector,
        r#"<svg><use href="https://evil.example/x.svg#a"/></svg>"#,
    );
    assert!(!result.safe);
    assert_eq!(result.violations[0].rule, "svg_external_use");
    Ok(())
}

#[test]
fn test_explicit_path_wins_discovery() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(b"image:\n  quality: 60\n")?;
    let config = PipelineConfig::discover(Some(file.path()))?;
    assert_eq!(config.image.quality, 60);
    Ok(())
}

#[test]
fn test_overriding_builtin_rule_is_rejected() -> Result<()> {
    let yaml_content = r#"
rules:
  - name: svg_script_element
    kind: vector
    pattern: "never-matches"
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;
    let err = PipelineConfig::load_from_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("built-in rules cannot be overridden"));
    Ok(())
}

#[test]
fn test_missing_file_reports_path() {
    let err = PipelineConfig::load_from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.yaml"));
}
