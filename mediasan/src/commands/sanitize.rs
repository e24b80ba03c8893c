//! `mediasan sanitize`: the full classify, sanitize, verify and report run.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{debug, info};
use std::io::{self, Write};

use mediasan_core::{Pipeline, PipelineConfig, RunLayout, SecurityReport};

use crate::cli::SanitizeCommand;
use crate::commands::{load_config, success_msg, warn_msg, Verdict};
use crate::ui::summary;
use crate::ui::theme::ThemeMap;

/// Command-line values take precedence over the configuration file.
pub fn apply_overrides(config: &mut PipelineConfig, cmd: &SanitizeCommand) {
    if let Some(workers) = cmd.workers {
        config.limits.workers = workers;
    }
    if let Some(timeout) = cmd.timeout_secs {
        config.limits.attempt_timeout_secs = timeout;
    }
}

pub async fn run_sanitize(cmd: &SanitizeCommand, theme: &ThemeMap, quiet: bool) -> Result<Verdict> {
    info!("Starting mediasan sanitize.");
    let mut config = load_config(cmd.config.as_deref())?;
    apply_overrides(&mut config, cmd);
    debug!("Effective configuration: {:?}", config);

    let pipeline = Pipeline::with_command_tools(&config).context("Failed to build the sanitization pipeline")?;
    let mut layout = RunLayout::new(&cmd.input, &cmd.output, &cmd.quarantine);
    layout.report = cmd.report.clone();

    let report = pipeline.run(&layout).await?;

    if cmd.json_stdout {
        let json = report.to_json()?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}").context("Failed to write report to stdout")?;
    }
    if !quiet {
        print_outcome(&report, &layout, theme)?;
    }
    Ok(Verdict::from_clean(report.is_clean()))
}

fn print_outcome(report: &SecurityReport, layout: &RunLayout, theme: &ThemeMap) -> Result<()> {
    let stderr_supports_color = io::stderr().is_terminal();
    summary::print_run_summary(report, &mut io::stderr(), theme, stderr_supports_color)
        .context("Failed to print run summary")?;

    let tally = report.tally();
    if report.is_clean() {
        success_msg(
            format!("All {} file(s) sanitized and verified.", tally.processed_files),
            theme,
        );
    } else {
        warn_msg(
            format!(
                "{} violation(s), {} file(s) not published. See {}",
                tally.security_violations,
                tally.failed_files,
                layout.report_path().display()
            ),
            theme,
        );
    }
    Ok(())
}
