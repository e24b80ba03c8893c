// mediasan/src/lib.rs
//! # mediasan CLI Application
//!
//! This crate provides the command-line interface for the `mediasan-core`
//! sanitization pipeline: argument parsing, logging setup, the themed
//! terminal summary and the `sanitize`, `scan` and `check-tools` commands.
//!
//! License: MIT OR APACHE 2.0

pub mod cli;
pub mod commands;
pub mod logger;
pub mod ui;

pub use commands::{Verdict, EXIT_FATAL};
