//! Human-readable run and scan summaries, rendered as tables on stderr.
//!
//! License: MIT OR APACHE 2.0

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::io::{self, Write};

use mediasan_core::{FileRecord, Outcome, ScanReport, SecurityReport};

use crate::ui::output_format::paint;
use crate::ui::theme::{ThemeEntry, ThemeMap};

fn new_table(enable_colors: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    if !enable_colors {
        table.force_no_tty();
    }
    table
}

fn violation_rules(record: &FileRecord) -> Vec<String> {
    let mut rules: Vec<String> = record
        .attempts()
        .iter()
        .filter_map(|a| a.verification.as_ref())
        .flat_map(|v| v.violations.iter().map(|v| v.rule.clone()))
        .collect();
    rules.sort();
    rules.dedup();
    rules
}

/// One line per file that did not end Accepted, then the run totals.
pub fn print_run_summary<W: Write>(
    report: &SecurityReport,
    writer: &mut W,
    theme: &ThemeMap,
    enable_colors: bool,
) -> io::Result<()> {
    let header = format!(
        "Run {} at {}",
        report.run_id(),
        report.scan_timestamp().format("%Y-%m-%d %H:%M:%S UTC")
    );
    writeln!(writer, "{}", paint(&header, ThemeEntry::Header, theme, enable_colors))?;

    let unresolved: Vec<&FileRecord> = report
        .files()
        .iter()
        .filter(|r| r.outcome() != Outcome::Accepted || r.violations() > 0)
        .collect();
    if !unresolved.is_empty() {
        let mut table = new_table(enable_colors);
        table.set_header(vec!["File", "Kind", "Outcome", "Violations", "Rules / detail"]);
        for record in unresolved {
            let outcome = format!("{:?}", record.outcome()).to_lowercase();
            let rules = violation_rules(record);
            let detail = if rules.is_empty() {
                record.detail().unwrap_or_default().to_string()
            } else {
                paint(&rules.join(", "), ThemeEntry::ViolationRule, theme, enable_colors)
            };
            table.add_row(vec![
                record.source().to_string(),
                record.kind().to_string(),
                paint(&outcome, ThemeEntry::for_outcome(record.outcome()), theme, enable_colors),
                record.violations().to_string(),
                detail,
            ]);
        }
        writeln!(writer, "{table}")?;
    }

    let tally = report.tally();
    let mut totals = new_table(enable_colors);
    for (label, count) in [
        ("Total files", tally.total_files),
        ("Accepted", tally.processed_files),
        ("Quarantined", tally.quarantined_files),
        ("Rejected", tally.rejected_files),
        ("Security violations", tally.security_violations),
    ] {
        totals.add_row(vec![
            paint(label, ThemeEntry::SummaryLabel, theme, enable_colors),
            paint(&count.to_string(), ThemeEntry::SummaryCount, theme, enable_colors),
        ]);
    }
    writeln!(writer, "{totals}")
}

/// Lists every unsafe file of a scan with the rules it matched.
pub fn print_scan_summary<W: Write>(
    scan: &ScanReport,
    writer: &mut W,
    theme: &ThemeMap,
    enable_colors: bool,
) -> io::Result<()> {
    let header = format!("Scanned {} file(s) under {}", scan.scanned_files(), scan.root().display());
    writeln!(writer, "{}", paint(&header, ThemeEntry::Header, theme, enable_colors))?;

    let mut table = new_table(enable_colors);
    table.set_header(vec!["File", "Kind", "Rule", "Excerpt"]);
    for entry in scan.entries().iter().filter(|e| !e.verification.safe) {
        for violation in &entry.verification.violations {
            table.add_row(vec![
                entry.source.clone(),
                entry.kind.to_string(),
                paint(&violation.rule, ThemeEntry::ViolationRule, theme, enable_colors),
                violation.excerpt.clone(),
            ]);
        }
    }
    if scan.unsafe_files() > 0 {
        writeln!(writer, "{table}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::theme::ThemeStyle;
    use chrono::Utc;
    use mediasan_core::{MediaKind, ScanEntry, VerificationResult, Violation};
    use std::path::PathBuf;

    #[test]
    fn scan_summary_lists_matched_rules() {
        let scan = ScanReport::new(
            PathBuf::from("/srv/public"),
            Utc::now(),
            vec![
                ScanEntry {
                    source: "svgs/a.svg".to_string(),
                    kind: MediaKind::Vector,
                    verification: VerificationResult::from_violations(vec![Violation {
                        rule: "svg_script_element".to_string(),
                        excerpt: "<script".to_string(),
                    }]),
                },
                ScanEntry {
                    source: "svgs/b.svg".to_string(),
                    kind: MediaKind::Vector,
                    verification: VerificationResult::from_violations(Vec::new()),
                },
            ],
        );
        let mut buf = Vec::new();
        print_scan_summary(&scan, &mut buf, &ThemeStyle::default_theme_map(), false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Scanned 2 file(s)"));
        assert!(text.contains("svg_script_element"));
        assert!(!text.contains("svgs/b.svg"));
    }
}
