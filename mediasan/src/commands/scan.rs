//! `mediasan scan`: re-verify an existing tree without changing it.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::info;
use std::io::{self, Write};

use mediasan_core::Pipeline;

use crate::cli::ScanCommand;
use crate::commands::{load_config, success_msg, warn_msg, Verdict};
use crate::ui::summary;
use crate::ui::theme::ThemeMap;

pub async fn run_scan(cmd: &ScanCommand, theme: &ThemeMap, quiet: bool) -> Result<Verdict> {
    info!("Starting mediasan scan of {}", cmd.dir.display());
    let config = load_config(cmd.config.as_deref())?;
    let pipeline = Pipeline::with_command_tools(&config).context("Failed to build the verification pipeline")?;

    let scan = pipeline.scan(&cmd.dir).await?;

    if cmd.json_stdout {
        let json = scan.to_json()?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}").context("Failed to write scan results to stdout")?;
    }
    if !quiet {
        let stderr_supports_color = io::stderr().is_terminal();
        summary::print_scan_summary(&scan, &mut io::stderr(), theme, stderr_supports_color)
            .context("Failed to print scan summary")?;
        if scan.is_clean() {
            success_msg(format!("All {} file(s) passed verification.", scan.scanned_files()), theme);
        } else {
            warn_msg(
                format!("{} of {} file(s) failed verification.", scan.unsafe_files(), scan.scanned_files()),
                theme,
            );
        }
    }
    Ok(Verdict::from_clean(scan.is_clean()))
}
