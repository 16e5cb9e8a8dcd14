//! Error types shared across VideoStove crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for VideoStove operations.
///
/// The first group of variants is fatal to a single project: the batch
/// coordinator records them against that project and moves on.
#[derive(Debug, thiserror::Error)]
pub enum StoveError {
    #[error("Project contains no renderable assets")]
    EmptyProject,

    #[error("Unsupported asset {path}: {reason}")]
    UnsupportedAsset { path: PathBuf, reason: String },

    #[error("Audio reconciliation requires an audio track with a positive duration")]
    ZeroAudioDuration,

    #[error("Caption segment {index} has invalid timing ({start} -> {end})")]
    CaptionTiming { index: usize, start: f64, end: f64 },

    #[error("Configuration error: {message}")]
    InvalidConfig { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoveError.
pub type StoveResult<T> = Result<T, StoveError>;

/// Stable, serializable classification of a [`StoveError`] for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyProject,
    UnsupportedAsset,
    ZeroAudioDuration,
    CaptionTiming,
    InvalidConfig,
    Render,
    Io,
    Other,
}

impl StoveError {
    pub fn unsupported_asset(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedAsset {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    /// Classification used in batch reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoveError::EmptyProject => ErrorKind::EmptyProject,
            StoveError::UnsupportedAsset { .. } => ErrorKind::UnsupportedAsset,
            StoveError::ZeroAudioDuration => ErrorKind::ZeroAudioDuration,
            StoveError::CaptionTiming { .. } => ErrorKind::CaptionTiming,
            StoveError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            StoveError::Render { .. } => ErrorKind::Render,
            StoveError::FileNotFound { .. } | StoveError::Io(_) => ErrorKind::Io,
            StoveError::Json(_) | StoveError::Other(_) => ErrorKind::Other,
        }
    }
}
