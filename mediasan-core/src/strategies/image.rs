//! Raster image strategies.
//!
//! License: MIT OR APACHE 2.0

use async_trait::async_trait;
use std::path::Path;

use super::{io_failure, SanitizationStrategy};
use crate::errors::ToolError;
use crate::tools::Toolkit;

/// Re-encodes the pixels through the image tool, dropping every metadata
/// block on the way.
#[derive(Debug, Clone, Copy)]
pub struct StripOnReEncode {
    quality: u8,
}

impl StripOnReEncode {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }
}

#[async_trait]
impl SanitizationStrategy for StripOnReEncode {
    fn name(&self) -> &'static str {
        "strip-on-re-encode"
    }

    async fn attempt(&self, input: &Path, output: &Path, tools: &dyn Toolkit) -> Result<(), ToolError> {
        tools.re_encode(input, output, self.quality).await
    }
}

/// Copies the raw input and strips the copy with the dedicated metadata tool.
#[derive(Debug, Clone, Copy)]
pub struct MetadataTool;

#[async_trait]
impl SanitizationStrategy for MetadataTool {
    fn name(&self) -> &'static str {
        "metadata-tool"
    }

    async fn attempt(&self, input: &Path, output: &Path, tools: &dyn Toolkit) -> Result<(), ToolError> {
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| io_failure("copy", e))?;
        tools.strip_metadata(output).await
    }
}
