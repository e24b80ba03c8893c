//! Subcommand implementations and the shared message helpers they use.
//!
//! License: MIT OR APACHE 2.0

pub mod check_tools;
pub mod sanitize;
pub mod scan;

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use std::io;
use std::path::Path;

use mediasan_core::PipelineConfig;

use crate::ui::output_format;
use crate::ui::theme::ThemeMap;

/// Process exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No violations and no failed files.
    Clean,
    /// The command completed but found something unsafe or unresolved.
    Unsafe,
}

impl Verdict {
    pub fn from_clean(clean: bool) -> Self {
        if clean {
            Verdict::Clean
        } else {
            Verdict::Unsafe
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Clean => 0,
            Verdict::Unsafe => 1,
        }
    }
}

/// Exit status for errors that stop a command before it produces a verdict.
pub const EXIT_FATAL: u8 = 2;

/// Helper for printing info messages to stderr.
pub fn info_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_info_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Helper for printing success messages to stderr.
pub fn success_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_success_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Helper for printing warning messages to stderr.
pub fn warn_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_warn_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Helper for printing error messages to stderr.
pub fn error_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_error_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Loads the pipeline configuration from `--config` or the usual locations.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::discover(explicit).context("Failed to load pipeline configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_map_to_exit_codes() {
        assert_eq!(Verdict::from_clean(true).exit_code(), 0);
        assert_eq!(Verdict::from_clean(false).exit_code(), 1);
        assert_ne!(EXIT_FATAL, Verdict::Unsafe.exit_code());
    }
}
