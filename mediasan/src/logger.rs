// mediasan/src/logger.rs
//! Logger setup for the mediasan binary.
//!
//! Logs always go to stderr so that `--json-stdout` output stays parseable.
//! `RUST_LOG` is honored unless an explicit level is passed.
//!
//! License: MIT OR APACHE 2.0

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Initializes the global logger. Safe to call more than once; later calls
/// are ignored.
pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder
        .target(Target::Stderr)
        .format_timestamp_millis()
        .format_module_path(false);

    // A second initialization (tests, embedding) is not an error.
    let _ = builder.try_init();
}

/// The level implied by the global `--quiet` / `--debug` flags.
pub fn level_for(quiet: bool, debug: bool) -> Option<LevelFilter> {
    match (quiet, debug) {
        (true, _) => Some(LevelFilter::Off),
        (false, true) => Some(LevelFilter::Debug),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(level_for(true, true), Some(LevelFilter::Off));
        assert_eq!(level_for(false, true), Some(LevelFilter::Debug));
        assert_eq!(level_for(false, false), None);
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        init_logger(Some(LevelFilter::Debug));
        init_logger(None);
    }
}
