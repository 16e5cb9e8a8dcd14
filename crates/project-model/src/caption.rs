//! Transcription input and aligned caption output.

use serde::{Deserialize, Serialize};

/// A word with its own timing, as reported by the transcriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A transcribed phrase on the original (unscaled) audio clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,

    /// Word-level timing, when the transcriber produced it.
    #[serde(default)]
    pub words: Vec<RawWord>,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }
}

/// A caption placed on the final timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,

    /// Word timing on the final clock, used for karaoke output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<RawWord>,
}

impl CaptionSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
