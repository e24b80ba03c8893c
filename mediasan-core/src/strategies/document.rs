//! PDF strategy. There is only one: a document the restricted converter cannot
//! clean is not retried with anything blunter.
//!
//! License: MIT OR APACHE 2.0

use async_trait::async_trait;
use std::path::Path;

use super::SanitizationStrategy;
use crate::errors::ToolError;
use crate::tools::Toolkit;

#[derive(Debug, Clone, Copy)]
pub struct RestrictedFlatten;

#[async_trait]
impl SanitizationStrategy for RestrictedFlatten {
    fn name(&self) -> &'static str {
        "restricted-flatten"
    }

    async fn attempt(&self, input: &Path, output: &Path, tools: &dyn Toolkit) -> Result<(), ToolError> {
        tools.flatten(input, output).await
    }
}
