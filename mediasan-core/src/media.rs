//! Media classification.
//!
//! A file's kind is decided purely from its lowercased extension. No content
//! sniffing is done, so a PNG renamed to `.svg` is classified as a vector and
//! will be judged by the vector predicate.
//!
//! License: MIT OR APACHE 2.0

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The declared kind of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Vector,
    Document,
    Unsupported,
}

impl MediaKind {
    /// Every kind that has a sanitization chain.
    pub const SANITIZABLE: [MediaKind; 3] = [MediaKind::Image, MediaKind::Vector, MediaKind::Document];

    /// Output subdirectory for accepted (and quarantined) files of this kind.
    pub fn subdirectory(self) -> Option<&'static str> {
        match self {
            MediaKind::Image => Some("images"),
            MediaKind::Vector => Some("svgs"),
            MediaKind::Document => Some("pdfs"),
            MediaKind::Unsupported => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Vector => "vector",
            MediaKind::Document => "document",
            MediaKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a path to its declared kind.
pub fn classify(path: &Path) -> MediaKind {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return MediaKind::Unsupported;
    };
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" => MediaKind::Image,
        "svg" => MediaKind::Vector,
        "pdf" => MediaKind::Document,
        _ => MediaKind::Unsupported,
    }
}

/// A discovered and classified input file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFile {
    source: PathBuf,
    kind: MediaKind,
    byte_size: u64,
}

impl MediaFile {
    pub fn new(source: PathBuf, byte_size: u64) -> Self {
        let kind = classify(&source);
        Self { source, kind, byte_size }
    }

    /// Classifies the file at `path`, reading its size from the filesystem.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self::new(path.to_path_buf(), meta.len()))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// The file name used for the emitted artifact.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string())
    }
}
