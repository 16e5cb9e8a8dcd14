//! Audio tracks and the reconciled timeline produced by the synchronizer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::AudioSyncPolicy;
use crate::timeline::Timeline;
use crate::warning::PipelineWarning;

/// An audio file with its probed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration_secs: f64,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }

    /// Usable for reconciliation: positive and finite.
    pub fn has_duration(&self) -> bool {
        self.duration_secs.is_finite() && self.duration_secs > 0.0
    }
}

/// The audio inputs of one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTracks {
    #[serde(default)]
    pub narration: Option<AudioTrack>,
    #[serde(default)]
    pub background: Option<AudioTrack>,
}

impl AudioTracks {
    /// Track whose clock drives reconciliation: narration, else background.
    pub fn reference(&self) -> Option<&AudioTrack> {
        self.narration
            .as_ref()
            .filter(|t| t.has_duration())
            .or_else(|| self.background.as_ref().filter(|t| t.has_duration()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRole {
    Narration,
    Background,
}

/// How an audio track is fitted to the final duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TrackFit {
    /// Already matches the final duration.
    AsIs,
    /// Cut at `to_secs`.
    Trim { to_secs: f64 },
    /// Played `loops` times back to back, then cut at `to_secs`.
    Loop { loops: u32, to_secs: f64 },
    /// Followed by silence until `to_secs`.
    PadSilence { to_secs: f64 },
}

/// An audio track together with its fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTrack {
    pub role: AudioRole,
    pub track: AudioTrack,
    pub fit: TrackFit,
}

/// Outcome of audio/visual reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub policy: AudioSyncPolicy,

    /// Uniform factor applied to asset durations (1.0 when untouched).
    pub scale_factor: f64,

    /// Duration the encoder produces.
    pub final_duration: f64,

    /// Duration of the reference audio track, if any.
    pub reference_audio_secs: Option<f64>,

    /// Black frames appended after the last asset.
    pub visual_padding_secs: f64,

    /// Times the narration plays back to back (1 unless looped).
    pub narration_loops: u32,

    pub tracks: Vec<FittedTrack>,

    /// Crossfades clamped at boundaries created while reconciling.
    #[serde(default)]
    pub warnings: Vec<PipelineWarning>,
}

/// A timeline whose length has been reconciled with its audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTimeline {
    pub timeline: Timeline,
    pub reconciliation: Reconciliation,
}

impl ReconciledTimeline {
    pub fn final_duration(&self) -> f64 {
        self.reconciliation.final_duration
    }
}
