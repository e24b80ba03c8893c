//! Sanitization strategies.
//!
//! Each media kind has an ordered chain of strategies: structural tools first,
//! blunt pattern removal last. A strategy only produces a candidate artifact;
//! whether that candidate is acceptable is decided by the verifier, never by
//! the strategy's own success.
//!
//! To add a strategy, implement [`SanitizationStrategy`] in the module for its
//! kind and append it to that kind's chain in [`StrategyChains::new`].
//!
//! License: MIT OR APACHE 2.0

pub mod document;
pub mod image;
pub mod vector;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::config::ImageConfig;
use crate::errors::ToolError;
use crate::media::MediaKind;
use crate::tools::Toolkit;

/// Position (1-based) and name of a strategy within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyId {
    pub ordinal: usize,
    pub name: &'static str,
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.ordinal, self.name)
    }
}

/// A single way of turning an untrusted input into a candidate artifact.
#[async_trait]
pub trait SanitizationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Writes a candidate for `input` to `output`. `output` does not exist
    /// beforehand and `input` must never be modified.
    async fn attempt(&self, input: &Path, output: &Path, tools: &dyn Toolkit) -> Result<(), ToolError>;
}

/// The ordered chains for every sanitizable kind.
pub struct StrategyChains {
    image: Vec<Box<dyn SanitizationStrategy>>,
    vector: Vec<Box<dyn SanitizationStrategy>>,
    document: Vec<Box<dyn SanitizationStrategy>>,
}

impl StrategyChains {
    pub fn new(image_config: &ImageConfig) -> Self {
        Self {
            image: vec![
                Box::new(image::StripOnReEncode::new(image_config.quality)),
                Box::new(image::MetadataTool),
            ],
            vector: vec![Box::new(vector::StructuralRemoval), Box::new(vector::TextRewrite)],
            document: vec![Box::new(document::RestrictedFlatten)],
        }
    }

    /// The chain for `kind`; empty for unsupported files.
    pub fn for_kind(&self, kind: MediaKind) -> &[Box<dyn SanitizationStrategy>] {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Vector => &self.vector,
            MediaKind::Document => &self.document,
            MediaKind::Unsupported => &[],
        }
    }

    /// Ids of the chain for `kind`, in order.
    pub fn ids(&self, kind: MediaKind) -> Vec<StrategyId> {
        self.for_kind(kind)
            .iter()
            .enumerate()
            .map(|(i, s)| StrategyId {
                ordinal: i + 1,
                name: s.name(),
            })
            .collect()
    }
}

impl fmt::Debug for StrategyChains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |chain: &[Box<dyn SanitizationStrategy>]| chain.iter().map(|s| s.name()).collect::<Vec<_>>();
        f.debug_struct("StrategyChains")
            .field("image", &names(&self.image))
            .field("vector", &names(&self.vector))
            .field("document", &names(&self.document))
            .finish()
    }
}

/// Maps a local filesystem failure inside a strategy to a tool error.
pub(crate) fn io_failure(step: &str, source: std::io::Error) -> ToolError {
    ToolError::Io {
        program: step.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_ordered_structural_first() {
        let chains = StrategyChains::new(&ImageConfig::default());
        let names = |kind| chains.ids(kind).iter().map(|id| id.name).collect::<Vec<_>>();
        assert_eq!(names(MediaKind::Image), ["strip-on-re-encode", "metadata-tool"]);
        assert_eq!(names(MediaKind::Vector), ["structural-removal", "text-rewrite"]);
        assert_eq!(names(MediaKind::Document), ["restricted-flatten"]);
        assert!(chains.for_kind(MediaKind::Unsupported).is_empty());
    }

    #[test]
    fn ordinals_start_at_one() {
        let chains = StrategyChains::new(&ImageConfig::default());
        let ids = chains.ids(MediaKind::Vector);
        assert_eq!(ids[0].ordinal, 1);
        assert_eq!(ids[1].to_string(), "#2 text-rewrite");
    }
}
