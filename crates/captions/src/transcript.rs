//! Transcripts produced by an external speech-to-text run.
//!
//! The engine never runs inference itself. A transcript is a JSON file,
//! either a bare segment array or a full [`TranscriptionResult`] object as
//! written by Whisper-style tools.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stove_common::error::{StoveError, StoveResult};
use stove_project_model::caption::RawSegment;

/// A complete transcription job result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Detected language (ISO 639-1 code, e.g., "en").
    #[serde(default)]
    pub language: Option<String>,
    /// Transcribed segments.
    pub segments: Vec<RawSegment>,
    /// Duration of the transcribed audio.
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Result(TranscriptionResult),
    Segments(Vec<RawSegment>),
}

/// Parse transcript JSON in either accepted shape.
pub fn parse_transcript(json: &str) -> StoveResult<Vec<RawSegment>> {
    let file: TranscriptFile = serde_json::from_str(json)?;
    Ok(match file {
        TranscriptFile::Result(result) => result.segments,
        TranscriptFile::Segments(segments) => segments,
    })
}

/// Load a transcript from disk.
pub fn load_transcript(path: &Path) -> StoveResult<Vec<RawSegment>> {
    if !path.exists() {
        return Err(StoveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let segments = parse_transcript(&content)?;
    tracing::info!(
        path = %path.display(),
        segments = segments.len(),
        "Loaded transcript"
    );
    Ok(segments)
}
