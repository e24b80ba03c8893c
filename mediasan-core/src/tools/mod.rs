//! The external-tool capability.
//!
//! Every transformation and extraction the pipeline needs from third-party
//! binaries goes through [`Toolkit`]. The production implementation,
//! [`CommandToolkit`], shells out; tests inject deterministic fakes so every
//! fallback path can be exercised without the real tools installed.
//!
//! License: MIT OR APACHE 2.0

pub mod command;

use async_trait::async_trait;
use std::path::Path;

use crate::errors::{MediaSanError, ToolError};

pub use command::CommandToolkit;

#[async_trait]
pub trait Toolkit: Send + Sync {
    /// Fails with `ToolUnavailable` when any required program is missing.
    /// Called once before any file is processed.
    fn preflight(&self) -> Result<(), MediaSanError>;

    /// Re-encodes `input` into `output` with all metadata stripped at the
    /// given quality.
    async fn re_encode(&self, input: &Path, output: &Path, quality: u8) -> Result<(), ToolError>;

    /// Removes all metadata from `path` in place.
    async fn strip_metadata(&self, path: &Path) -> Result<(), ToolError>;

    /// Deletes active-content elements and `on*` attributes from the SVG at
    /// `input`, writing the edited document to `output`.
    async fn structural_edit(&self, input: &Path, output: &Path) -> Result<(), ToolError>;

    /// Rewrites the PDF at `input` through the restricted converter.
    async fn flatten(&self, input: &Path, output: &Path) -> Result<(), ToolError>;

    /// Lists the metadata tags of an image, one `Tag : value` per line.
    async fn extract_metadata(&self, path: &Path) -> Result<String, ToolError>;

    /// Extracts printable strings from a binary document.
    async fn extract_strings(&self, path: &Path) -> Result<String, ToolError>;
}
