//! `mediasan check-tools`: the startup precondition check on its own.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use is_terminal::IsTerminal;
use std::io::{self, Write};

use mediasan_core::tools::command::resolve_program;
use mediasan_core::{Pipeline, ToolsConfig};

use crate::cli::CheckToolsCommand;
use crate::commands::{load_config, success_msg, Verdict};
use crate::ui::output_format::paint;
use crate::ui::theme::{ThemeEntry, ThemeMap};

/// Role, program and where it resolved, for every tool binding.
pub fn tool_table(tools: &ToolsConfig, theme: &ThemeMap, enable_colors: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    if !enable_colors {
        table.force_no_tty();
    }
    table.set_header(vec!["Role", "Program", "Resolved"]);
    for (role, program) in tools.bindings() {
        let resolved = match resolve_program(program) {
            Some(path) => paint(&path.display().to_string(), ThemeEntry::Success, theme, enable_colors),
            None => paint("not found", ThemeEntry::Error, theme, enable_colors),
        };
        table.add_row(vec![role.to_string(), program.to_string(), resolved]);
    }
    table
}

/// Missing tools surface as an error, the same one a sanitize run would hit.
pub fn run_check_tools(cmd: &CheckToolsCommand, theme: &ThemeMap, quiet: bool) -> Result<Verdict> {
    let config = load_config(cmd.config.as_deref())?;
    if !quiet {
        let stderr_supports_color = io::stderr().is_terminal();
        let table = tool_table(&config.tools, theme, stderr_supports_color);
        writeln!(io::stderr(), "{table}").context("Failed to print tool table")?;
    }

    Pipeline::with_command_tools(&config)?.preflight()?;
    if !quiet {
        success_msg("All required tools are available.", theme);
    }
    Ok(Verdict::Clean)
}
