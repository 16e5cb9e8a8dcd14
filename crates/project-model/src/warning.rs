//! Recoverable conditions recorded alongside a render plan.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hardware::EncodeBackend;

/// A policy adjustment the pipeline made instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PipelineWarning {
    /// A crossfade was at least as long as one of its assets and was shortened.
    ClampedTransition {
        /// Boundary between placement `boundary` and `boundary + 1`.
        boundary: usize,
        requested_secs: f64,
        effective_secs: f64,
    },

    /// The requested hardware encoder is unavailable; software encoding is used.
    BackendFallback {
        requested: String,
        fallback: EncodeBackend,
        reason: String,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::ClampedTransition {
                boundary,
                requested_secs,
                effective_secs,
            } => write!(
                f,
                "crossfade at boundary {boundary} clamped from {requested_secs:.3}s to {effective_secs:.3}s"
            ),
            PipelineWarning::BackendFallback {
                requested,
                fallback,
                reason,
            } => write!(f, "backend '{requested}' unavailable ({reason}); using {fallback}"),
        }
    }
}
