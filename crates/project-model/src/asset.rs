//! Input files and the media assets resolved from them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Declared kind of an input file, when the caller already knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindHint {
    Image,
    Video,
}

/// One entry of the ordered input list handed to the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,

    /// Overrides extension-based classification.
    #[serde(default)]
    pub kind: Option<KindHint>,

    /// Probed intrinsic duration (videos only).
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

impl SourceFile {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: Some(KindHint::Image),
            duration_secs: None,
        }
    }

    pub fn video(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            kind: Some(KindHint::Video),
            duration_secs: Some(duration_secs),
        }
    }
}

/// Closed set of asset kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MediaKind {
    Image,
    Video { intrinsic_secs: f64 },
}

impl MediaKind {
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video { .. })
    }
}

/// A classified input asset with its provisional duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Position in the resolved sequence.
    pub index: usize,

    pub path: PathBuf,

    pub kind: MediaKind,

    /// Image display duration or video intrinsic duration (seconds).
    pub duration_secs: f64,
}
