//! Terminal presentation: theme, status messages and summary tables.
//!
//! License: MIT OR APACHE 2.0

pub mod output_format;
pub mod summary;
pub mod theme;
