// mediasan/src/main.rs
//! mediasan entry point.
//!
//! Exit status: 0 when the run is clean, 1 when it found violations or
//! unresolved files, 2 on a fatal error (missing tool, unusable directory,
//! bad configuration).

use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use std::process::ExitCode;

use mediasan::cli::{Cli, Commands};
use mediasan::commands::{check_tools, error_msg, sanitize, scan};
use mediasan::logger;
use mediasan::ui::theme::{build_theme_map, ThemeMap, ThemeStyle};
use mediasan::{Verdict, EXIT_FATAL};

async fn run(cli: &Cli, theme: &ThemeMap) -> Result<Verdict> {
    match &cli.command {
        Commands::Sanitize(cmd) => sanitize::run_sanitize(cmd, theme, cli.quiet).await,
        Commands::Scan(cmd) => scan::run_scan(cmd, theme, cli.quiet).await,
        Commands::CheckTools(cmd) => check_tools::run_check_tools(cmd, theme, cli.quiet),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_logger(logger::level_for(cli.quiet, cli.debug));

    let theme = match build_theme_map(cli.theme.as_ref()).context("Theme error") {
        Ok(theme) => theme,
        Err(e) => {
            let fallback = ThemeStyle::default_theme_map();
            error_msg(format!("{e:#}"), &fallback);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match run(&cli, &theme).await {
        Ok(verdict) => ExitCode::from(verdict.exit_code()),
        Err(e) => {
            error!("Fatal: {e:?}");
            error_msg(format!("{e:#}"), &theme);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
